use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::SimulationConfig;
use crate::error::{HeatError, HeatResult};
use crate::grid::{Grid, Snapshot};
use crate::implementations::fork_join::{self, ForkJoin, Scheduler};
use crate::implementations::{distributed, single};
use crate::util::Timed;

/// Outcome of one completed run.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub iterations: usize,
    pub converged: bool,
    pub elapsed: Duration,
}

/// Owned simulation state: the configuration plus the current grid.
///
/// Only one run may be active at a time. Starting another while one is in
/// progress does nothing and returns `Ok(None)`.
pub struct Simulation {
    config: SimulationConfig,
    grid: Mutex<Grid>,
    running: AtomicBool,
}

struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> HeatResult<Self> {
        config.validate()?;
        let grid = Grid::initialize(config.width, config.height, config.heat_points, config.seed)?;
        Ok(Simulation::with_grid(config, grid))
    }

    /// Uses `grid` as the starting state; its dimensions override the config.
    pub fn from_grid(config: SimulationConfig, grid: Grid) -> HeatResult<Self> {
        let config = SimulationConfig {
            width: grid.width(),
            height: grid.height(),
            ..config
        };
        config.validate()?;
        Ok(Simulation::with_grid(config, grid))
    }

    fn with_grid(config: SimulationConfig, grid: Grid) -> Self {
        Simulation {
            config,
            grid: Mutex::new(grid),
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Copy of the current grid.
    pub fn grid(&self) -> Grid {
        self.grid.lock().clone()
    }

    fn try_begin(&self) -> Option<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(&self.running))
    }

    pub fn run(&self) -> HeatResult<Option<RunSummary>> {
        self.run_with_observer(|_, _| {})
    }

    /// Runs the sequential or fork/join solver, as configured, reporting
    /// every iteration's grid to `observer`.
    pub fn run_with_observer<F>(&self, observer: F) -> HeatResult<Option<RunSummary>>
    where
        F: FnMut(usize, Snapshot<'_>),
    {
        let Some(_guard) = self.try_begin() else {
            log::debug!("run requested while another is in progress, ignoring");
            return Ok(None);
        };

        let start = self.grid();
        let config = &self.config;
        let timer = Timed::info(if config.parallel { "fork/join relaxation" } else { "sequential relaxation" });
        let report = if config.parallel {
            let solver = ForkJoin::new(config.leaf_size, Scheduler::Rayon)?;
            fork_join::run_with_observer(start, config.stability_threshold, solver, config.max_iterations, observer)?
        } else {
            single::run_with_observer(start, config.stability_threshold, config.max_iterations, observer)?
        };
        let elapsed = timer.elapsed();

        *self.grid.lock() = report.grid;
        Ok(Some(RunSummary {
            iterations: report.iterations,
            converged: report.converged,
            elapsed,
        }))
    }

    /// Runs the row-partitioned solver on `config.workers` in-process ranks.
    pub fn run_distributed(&self) -> HeatResult<Option<RunSummary>> {
        let Some(_guard) = self.try_begin() else {
            log::debug!("run requested while another is in progress, ignoring");
            return Ok(None);
        };

        let start = self.grid();
        let config = &self.config;
        let timer = Timed::info("distributed relaxation");
        let reports = distributed::run_local(&start, config.workers, config.stability_threshold, config.distributed_cap())?;
        let elapsed = timer.elapsed();

        let root = reports.into_iter().next();
        let Some(distributed::WorkerReport {
            iterations,
            converged,
            grid: Some(grid),
            ..
        }) = root
        else {
            return Err(HeatError::communication("gather", 0, "root did not assemble a grid"));
        };

        *self.grid.lock() = grid;
        Ok(Some(RunSummary {
            iterations,
            converged,
            elapsed,
        }))
    }
}
