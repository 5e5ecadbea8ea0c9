pub mod config;
pub mod convergence;
pub mod error;
pub mod grid;
pub mod implementations;
pub mod simulation;
pub mod util;

pub use config::SimulationConfig;
pub use convergence::ConvergenceDetector;
pub use error::{HeatError, HeatResult};
pub use grid::{Grid, Snapshot};
pub use simulation::{RunSummary, Simulation};
