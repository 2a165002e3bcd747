//! Error types for critsim-sweep.

use critsim_core::ErrorKind;
use thiserror::Error;

/// Result type for sweep operations.
pub type Result<T> = std::result::Result<T, SweepError>;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error(transparent)]
    Core(#[from] critsim_core::Error),

    /// Empty or inconsistent input to the cross-file statistics processor.
    #[error("aggregation error: {0}")]
    Aggregation(String),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("job {index} panicked: {message}")]
    JobPanicked { index: usize, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SweepError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SweepError::Core(e) => e.kind(),
            SweepError::Aggregation(_) => ErrorKind::Aggregation,
            SweepError::ThreadPool(_) => ErrorKind::Setup,
            SweepError::JobPanicked { .. } => ErrorKind::Simulator,
            SweepError::Io(_) => ErrorKind::Io,
        }
    }

    pub fn aggregation(reason: impl Into<String>) -> Self {
        SweepError::Aggregation(reason.into())
    }
}
