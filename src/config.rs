use crate::error::{HeatError, HeatResult};

pub const DEFAULT_WIDTH: usize = 80;
pub const DEFAULT_HEIGHT: usize = 60;
pub const DEFAULT_HEAT_POINTS: usize = 10;
pub const DEFAULT_SEED: u64 = 89211208;
pub const DEFAULT_THRESHOLD: f64 = 0.25;
/// Quadrants at or below this many cells are computed directly.
pub const DEFAULT_LEAF_SIZE: usize = 20;
pub const DEFAULT_MAX_ITERATIONS: usize = 100_000;

/// Everything the core needs to build a grid and drive one solver.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationConfig {
    pub width: usize,
    pub height: usize,
    pub heat_points: usize,
    pub seed: u64,
    pub stability_threshold: f64,
    /// Fork/join solver instead of the sequential one.
    pub parallel: bool,
    /// Hard cap on sweeps. `None` runs until stable.
    pub max_iterations: Option<usize>,
    pub leaf_size: usize,
    /// Number of ranks for the distributed solver.
    pub workers: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            heat_points: DEFAULT_HEAT_POINTS,
            seed: DEFAULT_SEED,
            stability_threshold: DEFAULT_THRESHOLD,
            parallel: false,
            max_iterations: None,
            leaf_size: DEFAULT_LEAF_SIZE,
            workers: 1,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> HeatResult<()> {
        validate_dimensions(self.width, self.height)?;
        validate_threshold(self.stability_threshold)?;
        if self.leaf_size == 0 {
            return Err(HeatError::configuration("leaf size must be at least 1 cell"));
        }
        if self.workers == 0 {
            return Err(HeatError::configuration("at least one worker is required"));
        }
        if self.workers > self.height {
            return Err(HeatError::configuration(format!(
                "cannot split {} rows across {} workers",
                self.height, self.workers
            )));
        }
        Ok(())
    }

    /// Iteration cap for the distributed solver, which always has one.
    pub fn distributed_cap(&self) -> usize {
        self.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS)
    }
}

pub fn validate_dimensions(width: usize, height: usize) -> HeatResult<()> {
    // a single row or column leaves corner cells without neighbors
    if width < 2 || height < 2 {
        return Err(HeatError::configuration(format!(
            "grid must be at least 2x2, got {}x{}",
            width, height
        )));
    }
    Ok(())
}

pub fn validate_threshold(threshold: f64) -> HeatResult<()> {
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(HeatError::configuration(format!(
            "stability threshold must be a positive finite number, got {}",
            threshold
        )));
    }
    Ok(())
}
