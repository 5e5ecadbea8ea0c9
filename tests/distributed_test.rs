use std::cell::Cell;
use std::thread;

use heat_relax::error::{HeatError, HeatResult};
use heat_relax::grid::Grid;
use heat_relax::implementations::distributed::{self, local_world, Communicator, LocalComm, Payload};

/// Wraps a rank and makes its n-th send fail, like a dropped link.
struct FlakyComm {
    inner: LocalComm,
    sends_left: Cell<usize>,
}

impl Communicator for FlakyComm {
    fn rank(&self) -> usize {
        self.inner.rank()
    }

    fn size(&self) -> usize {
        self.inner.size()
    }

    fn send(&self, dest: usize, operation: &'static str, payload: Payload) -> HeatResult<()> {
        if self.sends_left.get() == 0 {
            return Err(HeatError::communication(operation, self.rank(), "link down"));
        }
        self.sends_left.set(self.sends_left.get() - 1);
        self.inner.send(dest, operation, payload)
    }

    fn recv(&self, source: usize, operation: &'static str) -> HeatResult<Payload> {
        self.inner.recv(source, operation)
    }
}

#[test]
fn test_link_failure_aborts_every_rank() {
    let grid = Grid::initialize(10, 12, 3, 5).unwrap();
    let world = local_world(3);

    let results: Vec<HeatResult<distributed::WorkerReport>> = thread::scope(|scope| {
        let handles: Vec<_> = world
            .into_iter()
            .map(|comm| {
                let grid = &grid;
                scope.spawn(move || {
                    let initial = (comm.rank() == 0).then_some(grid);
                    if comm.rank() == 1 {
                        // bootstrap needs no sends from rank 1; the first halo exchange does
                        let flaky = FlakyComm { inner: comm, sends_left: Cell::new(0) };
                        distributed::run_worker(&flaky, initial, 0.25, 1000)
                    } else {
                        distributed::run_worker(&comm, initial, 0.25, 1000)
                    }
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.len(), 3);
    for (rank, result) in results.into_iter().enumerate() {
        match result {
            Err(HeatError::Communication { .. }) => {}
            other => panic!("rank {} should have aborted, got {:?}", rank, other.map(|r| r.iterations)),
        }
    }

    println!("✓ Link failure: every rank aborted!");
}

#[test]
fn test_global_stability_needs_every_rank() {
    // source in the last partition only: rank 0 is locally stable at first
    let grid = Grid::with_sources(8, 16, &[(4, 15, 100.0)]).unwrap();

    let reports = distributed::run_local(&grid, 4, 0.25, 1).unwrap();
    assert!(reports.iter().all(|r| r.iterations == 1 && !r.converged));

    let reports = distributed::run_local(&grid, 4, 0.25, 100_000).unwrap();
    let iterations = reports[0].iterations;
    assert!(iterations > 1);
    assert!(reports.iter().all(|r| r.iterations == iterations && r.converged));

    println!("✓ Global stability: run continued until every rank agreed!");
}

#[test]
fn test_gathered_grid_matches_partitions() {
    let grid = Grid::initialize(9, 10, 4, 77).unwrap();
    let reports = distributed::run_local(&grid, 3, 0.25, 100_000).unwrap();

    let full = reports[0].grid.clone().unwrap();
    for report in &reports {
        let part = &report.partition;
        let start = part.rows.start * part.width;
        assert_eq!(&full.data()[start..start + part.data.len()], &part.data[..]);
    }

    println!("✓ Gather: root grid matches every partition!");
}
