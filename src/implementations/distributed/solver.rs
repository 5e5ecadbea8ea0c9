use std::thread;

use crate::convergence::ConvergenceDetector;
use crate::error::{HeatError, HeatResult};
use crate::grid::Grid;

use super::comm::{local_world, Communicator, Payload};
use super::partition::{row_ranges, LocalPartition};

/*
  Row-partitioned relaxation, single program on every rank.

  Rank 0 broadcasts (width, height, heat points) and scatters the initial
  row slices. Each iteration then goes through:

    Exchanging  -> first/last owned rows travel to the neighbouring ranks
    Computing   -> double-buffered sweep of the owned rows
    Reducing    -> logical AND of every rank's local stability flag

  and stops once the reduced flag is true or the iteration cap is reached.
  Every collective blocks until all ranks take part, so no rank can start
  sweep n+1 before all ranks finished sweep n. Finally rank 0 gathers the
  partitions back into a full grid.
*/

const ROOT: usize = 0;

/// Per-rank lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Bootstrapped,
    Exchanging,
    Computing,
    ReducingStability,
    Terminated,
}

/// What one rank ends up with.
#[derive(Clone, Debug)]
pub struct WorkerReport {
    pub partition: LocalPartition,
    pub iterations: usize,
    /// True if the run ended on global agreement rather than the cap.
    pub converged: bool,
    /// Assembled result, only on rank 0.
    pub grid: Option<Grid>,
}

/// Runs one rank to termination. Only rank 0 passes the initial grid.
pub fn run_worker<C: Communicator>(
    comm: &C,
    initial: Option<&Grid>,
    threshold: f64,
    max_iterations: usize,
) -> HeatResult<WorkerReport> {
    let rank = comm.rank();
    let detector = ConvergenceDetector::new(threshold)?;

    // bootstrap: every rank rebuilds the layout from the broadcast params
    let params = match (comm.is_root(ROOT), initial) {
        (true, Some(grid)) => Some(Payload::Params(vec![grid.width(), grid.height(), grid.fixed_count()])),
        (true, None) => return Err(HeatError::configuration("rank 0 needs the initial grid")),
        (false, _) => None,
    };
    let params = comm.broadcast(ROOT, params)?.into_params("broadcast", rank)?;
    let &[width, height, heat_points] = params.as_slice() else {
        return Err(HeatError::communication("broadcast", rank, format!("expected 3 params, got {}", params.len())));
    };
    let ranges = row_ranges(height, comm.size())?;
    log::debug!("rank {} bootstrapped: {}x{} grid, {} heat points, rows {:?}", rank, width, height, heat_points, ranges[rank]);

    let (temperature_chunks, mask_chunks) = match initial.filter(|_| comm.is_root(ROOT)) {
        Some(grid) => {
            let temps: Vec<Payload> = ranges.iter().map(|r| Payload::Temperatures(grid.data()[r.cells(width)].to_vec())).collect();
            let masks: Vec<Payload> = ranges.iter().map(|r| Payload::Mask(grid.fixed_mask()[r.cells(width)].to_vec())).collect();
            (Some(temps), Some(masks))
        }
        None => (None, None),
    };
    let data = comm.scatter(ROOT, temperature_chunks)?.into_temperatures("scatter", rank)?;
    let fixed = comm.scatter(ROOT, mask_chunks)?.into_mask("scatter", rank)?;
    let mut partition = LocalPartition::new(rank, width, height, ranges[rank], data, fixed)?;

    let mut next = partition.data.clone();
    let mut halos: (Option<Vec<f64>>, Option<Vec<f64>>) = (None, None);
    let mut local_stable = false;
    let mut iterations = 0;
    let mut converged = false;
    let mut state = WorkerState::Bootstrapped;

    loop {
        state = match state {
            WorkerState::Bootstrapped if max_iterations == 0 => WorkerState::Terminated,
            WorkerState::Bootstrapped => WorkerState::Exchanging,
            WorkerState::Exchanging => {
                halos = comm.exchange_halos(partition.first_row(), partition.last_row())?;
                WorkerState::Computing
            }
            WorkerState::Computing => {
                local_stable = partition.sweep(halos.0.as_deref(), halos.1.as_deref(), &mut next, &detector)?;
                std::mem::swap(&mut partition.data, &mut next);
                iterations += 1;
                WorkerState::ReducingStability
            }
            WorkerState::ReducingStability => {
                let global_stable = comm.all_reduce_and(local_stable)?;
                log::info!("worker {} completed iteration {}", rank, iterations);
                if global_stable {
                    converged = true;
                    WorkerState::Terminated
                } else if iterations >= max_iterations {
                    log::warn!("worker {} stopped at iteration cap {}", rank, max_iterations);
                    WorkerState::Terminated
                } else {
                    WorkerState::Exchanging
                }
            }
            WorkerState::Terminated => break,
        };
    }

    let gathered = comm.gather(ROOT, Payload::Temperatures(partition.data.clone()))?;
    let grid = match (gathered, initial) {
        (Some(parts), Some(initial)) => {
            let mut data = Vec::with_capacity(width * height);
            for part in parts {
                data.extend(part.into_temperatures("gather", rank)?);
            }
            log::info!("computation finished in {} iterations", iterations);
            Some(Grid::from_parts(width, height, data, initial.fixed_mask().to_vec())?)
        }
        _ => None,
    };

    Ok(WorkerReport {
        partition,
        iterations,
        converged,
        grid,
    })
}

/// Spawns `workers` in-process ranks, one thread each, and runs them to
/// completion. Reports come back in rank order. If any rank fails the
/// whole run fails with the first error by rank.
pub fn run_local(grid: &Grid, workers: usize, threshold: f64, max_iterations: usize) -> HeatResult<Vec<WorkerReport>> {
    row_ranges(grid.height(), workers)?;
    ConvergenceDetector::new(threshold)?;

    let world = local_world(workers);
    let results: Vec<HeatResult<WorkerReport>> = thread::scope(|scope| {
        let handles: Vec<_> = world
            .into_iter()
            .map(|comm| {
                scope.spawn(move || {
                    let initial = comm.is_root(ROOT).then_some(grid);
                    run_worker(&comm, initial, threshold, max_iterations)
                })
            })
            .collect();

        handles
            .into_iter()
            .enumerate()
            .map(|(rank, handle)| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(HeatError::communication("join", rank, "worker thread panicked")))
            })
            .collect()
    });

    results.into_iter().collect()
}

/// Convenience wrapper returning rank 0's assembled grid and sweep count.
pub fn run(grid: &Grid, workers: usize, threshold: f64, max_iterations: usize) -> HeatResult<(Grid, usize)> {
    let reports = run_local(grid, workers, threshold, max_iterations)?;
    let root = reports
        .into_iter()
        .next()
        .ok_or_else(|| HeatError::configuration("no workers"))?;
    let iterations = root.iterations;
    let grid = root
        .grid
        .ok_or_else(|| HeatError::communication("gather", ROOT, "root did not assemble a grid"))?;
    Ok((grid, iterations))
}
