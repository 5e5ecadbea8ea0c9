use std::sync::mpsc::{self, Receiver, Sender};

use crate::error::{HeatError, HeatResult};

/// Everything that travels between ranks.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Params(Vec<usize>),
    Temperatures(Vec<f64>),
    Mask(Vec<bool>),
    Flag(bool),
}

impl Payload {
    fn kind(&self) -> &'static str {
        match self {
            Payload::Params(_) => "params",
            Payload::Temperatures(_) => "temperatures",
            Payload::Mask(_) => "mask",
            Payload::Flag(_) => "flag",
        }
    }

    pub fn into_params(self, operation: &'static str, rank: usize) -> HeatResult<Vec<usize>> {
        match self {
            Payload::Params(v) => Ok(v),
            other => Err(unexpected(operation, rank, "params", &other)),
        }
    }

    pub fn into_temperatures(self, operation: &'static str, rank: usize) -> HeatResult<Vec<f64>> {
        match self {
            Payload::Temperatures(v) => Ok(v),
            other => Err(unexpected(operation, rank, "temperatures", &other)),
        }
    }

    pub fn into_mask(self, operation: &'static str, rank: usize) -> HeatResult<Vec<bool>> {
        match self {
            Payload::Mask(v) => Ok(v),
            other => Err(unexpected(operation, rank, "mask", &other)),
        }
    }

    pub fn into_flag(self, operation: &'static str, rank: usize) -> HeatResult<bool> {
        match self {
            Payload::Flag(f) => Ok(f),
            other => Err(unexpected(operation, rank, "flag", &other)),
        }
    }
}

fn unexpected(operation: &'static str, rank: usize, wanted: &str, got: &Payload) -> HeatError {
    HeatError::communication(operation, rank, format!("expected {} payload, got {}", wanted, got.kind()))
}

/// Blocking point-to-point messaging between a fixed set of ranks.
///
/// Collectives are provided on top of `send`/`recv` and must be entered by
/// every rank in the same order. Per-pair delivery is FIFO, so matching
/// call sequences pair messages up without tags.
pub trait Communicator {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn send(&self, dest: usize, operation: &'static str, payload: Payload) -> HeatResult<()>;
    fn recv(&self, source: usize, operation: &'static str) -> HeatResult<Payload>;

    fn is_root(&self, root: usize) -> bool {
        self.rank() == root
    }

    /// `value` must be `Some` on `root`; every rank returns the root's value.
    fn broadcast(&self, root: usize, value: Option<Payload>) -> HeatResult<Payload> {
        const OP: &str = "broadcast";
        if !self.is_root(root) {
            return self.recv(root, OP);
        }
        let value = value.ok_or_else(|| HeatError::communication(OP, self.rank(), "root has nothing to send"))?;
        for dest in (0..self.size()).filter(|&r| r != root) {
            self.send(dest, OP, value.clone())?;
        }
        Ok(value)
    }

    /// Root passes one chunk per rank, in rank order.
    fn scatter(&self, root: usize, chunks: Option<Vec<Payload>>) -> HeatResult<Payload> {
        const OP: &str = "scatter";
        if !self.is_root(root) {
            return self.recv(root, OP);
        }
        let chunks = chunks.ok_or_else(|| HeatError::communication(OP, self.rank(), "root has nothing to send"))?;
        if chunks.len() != self.size() {
            return Err(HeatError::communication(
                OP,
                self.rank(),
                format!("{} chunks for {} ranks", chunks.len(), self.size()),
            ));
        }
        let mut own = None;
        for (dest, chunk) in chunks.into_iter().enumerate() {
            if dest == root {
                own = Some(chunk);
            } else {
                self.send(dest, OP, chunk)?;
            }
        }
        own.ok_or_else(|| HeatError::communication(OP, self.rank(), "no chunk for root"))
    }

    /// Root receives every rank's value in rank order; others get `None`.
    fn gather(&self, root: usize, value: Payload) -> HeatResult<Option<Vec<Payload>>> {
        const OP: &str = "gather";
        if !self.is_root(root) {
            self.send(root, OP, value)?;
            return Ok(None);
        }
        let mut own = Some(value);
        let mut all = Vec::with_capacity(self.size());
        for source in 0..self.size() {
            if source == root {
                all.push(own.take().ok_or_else(|| HeatError::communication(OP, root, "root value consumed twice"))?);
            } else {
                all.push(self.recv(source, OP)?);
            }
        }
        Ok(Some(all))
    }

    /// True on every rank iff `flag` was true on every rank.
    fn all_reduce_and(&self, flag: bool) -> HeatResult<bool> {
        const OP: &str = "all-reduce";
        let rank = self.rank();
        let reduced = match self.gather(0, Payload::Flag(flag))? {
            Some(flags) => {
                let mut all = true;
                for f in flags {
                    all &= f.into_flag(OP, rank)?;
                }
                Some(Payload::Flag(all))
            }
            None => None,
        };
        self.broadcast(0, reduced)?.into_flag(OP, rank)
    }

    /// Sends `first_row` to the rank above and `last_row` to the rank below,
    /// then returns the rows received from them (above, below).
    fn exchange_halos(&self, first_row: &[f64], last_row: &[f64]) -> HeatResult<(Option<Vec<f64>>, Option<Vec<f64>>)> {
        const OP: &str = "halo exchange";
        let rank = self.rank();
        let above = rank.checked_sub(1);
        let below = Some(rank + 1).filter(|&r| r < self.size());

        if let Some(up) = above {
            self.send(up, OP, Payload::Temperatures(first_row.to_vec()))?;
        }
        if let Some(down) = below {
            self.send(down, OP, Payload::Temperatures(last_row.to_vec()))?;
        }

        let halo_above = match above {
            Some(up) => Some(self.recv(up, OP)?.into_temperatures(OP, rank)?),
            None => None,
        };
        let halo_below = match below {
            Some(down) => Some(self.recv(down, OP)?.into_temperatures(OP, rank)?),
            None => None,
        };
        Ok((halo_above, halo_below))
    }
}

/// In-process rank backed by unbounded channels, one per ordered pair.
pub struct LocalComm {
    rank: usize,
    size: usize,
    outboxes: Vec<Sender<Payload>>,
    inboxes: Vec<Receiver<Payload>>,
}

/// Builds `size` fully connected ranks for use on separate threads.
pub fn local_world(size: usize) -> Vec<LocalComm> {
    let mut outboxes: Vec<Vec<Sender<Payload>>> = (0..size).map(|_| Vec::with_capacity(size)).collect();
    let mut inboxes: Vec<Vec<Receiver<Payload>>> = (0..size).map(|_| Vec::with_capacity(size)).collect();

    // outboxes[src][dest] pairs with inboxes[dest][src]
    for src_outboxes in outboxes.iter_mut() {
        for dest_inboxes in inboxes.iter_mut() {
            let (tx, rx) = mpsc::channel();
            src_outboxes.push(tx);
            dest_inboxes.push(rx);
        }
    }

    outboxes
        .into_iter()
        .zip(inboxes)
        .enumerate()
        .map(|(rank, (outboxes, inboxes))| LocalComm { rank, size, outboxes, inboxes })
        .collect()
}

impl LocalComm {
    fn check_peer(&self, peer: usize, operation: &'static str) -> HeatResult<()> {
        if peer >= self.size {
            return Err(HeatError::communication(
                operation,
                self.rank,
                format!("peer {} out of range for {} ranks", peer, self.size),
            ));
        }
        Ok(())
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&self, dest: usize, operation: &'static str, payload: Payload) -> HeatResult<()> {
        self.check_peer(dest, operation)?;
        self.outboxes[dest]
            .send(payload)
            .map_err(|_| HeatError::communication(operation, self.rank, format!("rank {} is gone", dest)))
    }

    fn recv(&self, source: usize, operation: &'static str) -> HeatResult<Payload> {
        self.check_peer(source, operation)?;
        self.inboxes[source]
            .recv()
            .map_err(|_| HeatError::communication(operation, self.rank, format!("rank {} hung up", source)))
    }
}
