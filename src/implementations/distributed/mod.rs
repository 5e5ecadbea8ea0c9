pub mod comm;
pub mod partition;
pub mod solver;

pub use comm::{local_world, Communicator, LocalComm, Payload};
pub use partition::{row_ranges, LocalPartition, RowRange};
pub use solver::{run, run_local, run_worker, WorkerReport, WorkerState};
