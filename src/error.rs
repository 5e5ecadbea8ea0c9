use thiserror::Error;

pub type HeatResult<T> = Result<T, HeatError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HeatError {
    /// Rejected before any solver starts.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("cell ({x}, {y}) has no in-bounds neighbors")]
    NeighborCount { x: usize, y: usize },

    /// Any failed collective; fatal to the whole distributed run.
    #[error("communication error: {operation} failed on rank {rank}: {details}")]
    Communication {
        operation: &'static str,
        rank: usize,
        details: String,
    },
}

impl HeatError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        HeatError::Configuration(msg.into())
    }

    pub fn communication(operation: &'static str, rank: usize, details: impl Into<String>) -> Self {
        HeatError::Communication {
            operation,
            rank,
            details: details.into(),
        }
    }
}
