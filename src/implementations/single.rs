use crate::convergence::ConvergenceDetector;
use crate::error::HeatResult;
use crate::grid::{Grid, Snapshot};
use crate::implementations::{relax, relax_cell, SolveReport, Sweep};

/// Baseline: one thread, row by row.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sequential;

impl Sweep for Sequential {
    fn sweep(&self, prev: &Grid, next: &mut [f64], detector: &ConvergenceDetector) -> bool {
        let width = prev.width();
        let mut stable = true;

        for (y, row) in next.chunks_mut(width).enumerate() {
            for (x, cell) in row.iter_mut().enumerate() {
                let (value, cell_stable) = relax_cell(prev, x, y, detector);
                *cell = value;
                stable &= cell_stable;
            }
        }

        stable
    }
}

/// Relaxes `grid` until stable. Returns the final grid and sweep count.
pub fn run(grid: Grid, threshold: f64) -> HeatResult<(Grid, usize)> {
    Ok(run_with_observer(grid, threshold, None, |_, _| {})?.into_parts())
}

pub fn run_with_observer<F>(
    grid: Grid,
    threshold: f64,
    max_iterations: Option<usize>,
    observer: F,
) -> HeatResult<SolveReport>
where
    F: FnMut(usize, Snapshot<'_>),
{
    let detector = ConvergenceDetector::new(threshold)?;
    Ok(relax(&Sequential, grid, detector, max_iterations, observer))
}

/// Exactly `steps` sweeps, ignoring stability.
pub fn sweeps(grid: Grid, threshold: f64, steps: usize) -> HeatResult<SolveReport> {
    let detector = ConvergenceDetector::new(threshold)?;
    let mut report = SolveReport {
        grid,
        iterations: 0,
        converged: false,
    };
    let mut next = report.grid.data.clone();
    for _ in 0..steps {
        report.converged = Sequential.sweep(&report.grid, &mut next, &detector);
        report.grid.swap_data(&mut next);
        report.iterations += 1;
    }
    Ok(report)
}
