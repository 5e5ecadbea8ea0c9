pub mod single;
pub mod fork_join;
pub mod distributed;

use crate::convergence::ConvergenceDetector;
use crate::grid::{neighbor_mean, Grid, Snapshot};

/// One double-buffered relaxation pass.
///
/// Implementations read only `prev` and write every cell of `next`; the
/// return value is the AND of all per-cell stability checks.
pub trait Sweep {
    fn sweep(&self, prev: &Grid, next: &mut [f64], detector: &ConvergenceDetector) -> bool;
}

/// Final grid of a shared-memory run.
#[derive(Clone, Debug)]
pub struct SolveReport {
    pub grid: Grid,
    pub iterations: usize,
    /// False only when the iteration cap cut the run short.
    pub converged: bool,
}

impl SolveReport {
    pub fn into_parts(self) -> (Grid, usize) {
        (self.grid, self.iterations)
    }
}

/// Drives `sweeper` until a sweep reports stability or `max_iterations`
/// sweeps have run. `observer` sees every completed iteration.
pub fn relax<S, F>(
    sweeper: &S,
    mut grid: Grid,
    detector: ConvergenceDetector,
    max_iterations: Option<usize>,
    mut observer: F,
) -> SolveReport
where
    S: Sweep + ?Sized,
    F: FnMut(usize, Snapshot<'_>),
{
    // fixed cells are rewritten every sweep, so any starting content works
    let mut next = grid.data.clone();
    let mut iterations = 0;
    let mut converged = false;

    while max_iterations.map_or(true, |cap| iterations < cap) {
        let stable = sweeper.sweep(&grid, &mut next, &detector);
        grid.swap_data(&mut next);
        iterations += 1;
        log::info!("worker 0 completed iteration {}", iterations);
        observer(iterations, grid.snapshot());

        if stable {
            converged = true;
            break;
        }
    }

    SolveReport {
        grid,
        iterations,
        converged,
    }
}

/// New value of one cell plus whether it moved by at most the threshold.
#[inline]
pub(crate) fn relax_cell(prev: &Grid, x: usize, y: usize, detector: &ConvergenceDetector) -> (f64, bool) {
    let idx = prev.index(x, y);
    let old = prev.data[idx];
    if prev.fixed[idx] {
        return (old, true);
    }

    let width = prev.width();
    let data = &prev.data;
    let new = neighbor_mean(x, y, width, prev.height(), |nx, ny| data[ny * width + nx]);
    (new, detector.is_cell_stable(old, new))
}
