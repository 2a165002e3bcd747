//! Error types for critsim-core.

use std::path::PathBuf;

use thiserror::Error;

/// Coarse classification of failures, used to decide how far an error
/// propagates (whole run, one job, or one aggregation step).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Fatal before any job is launched.
    Setup,
    /// The external simulator exited with a failure status.
    Simulator,
    /// Malformed waveform data, missing signal or interpolation failure.
    Parse,
    /// Inconsistent input to a cross-file aggregation.
    Aggregation,
    /// Filesystem or serialization failure.
    Io,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("setup error: {0}")]
    Setup(String),

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("parameter not found: {0}")]
    ParameterNotFound(String),

    #[error("simulator failed for job {job} in {}: {reason}", workdir.display())]
    Simulator {
        job: String,
        workdir: PathBuf,
        reason: String,
    },

    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("signal not found in results: {0}")]
    SignalNotFound(String),

    #[error("cannot interpolate at {target} between x1={x1} and x2={x2}")]
    Interpolation { x1: f64, x2: f64, target: f64 },

    #[error(
        "time base mismatch for {signal}: reference spans [{ref_start}, {ref_end}], candidate spans [{cand_start}, {cand_end}]"
    )]
    TimeBaseMismatch {
        signal: String,
        ref_start: f64,
        ref_end: f64,
        cand_start: f64,
        cand_end: f64,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Map this error onto the failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Setup(_) | Error::InvalidParameter { .. } | Error::ParameterNotFound(_) => {
                ErrorKind::Setup
            }
            Error::Simulator { .. } | Error::TimeBaseMismatch { .. } => ErrorKind::Simulator,
            Error::Parse { .. } | Error::SignalNotFound(_) | Error::Interpolation { .. } => {
                ErrorKind::Parse
            }
            Error::Io(_) | Error::Json(_) => ErrorKind::Io,
        }
    }

    pub fn setup(reason: impl Into<String>) -> Self {
        Error::Setup(reason.into())
    }

    pub fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
