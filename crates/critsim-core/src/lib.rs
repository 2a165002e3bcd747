//! Core data model for critsim.
//!
//! This crate provides the types shared by the comparator, the simulator
//! runner and the sweep engines: parameters and their sweep steps, signals,
//! per-signal error policies, job results, and the run context through which
//! errors are logged.

pub mod context;
pub mod error;
pub mod job;
pub mod parameter;
pub mod policy;
pub mod result;
pub mod signal;
pub mod units;

pub use context::{ErrorLog, RunContext};
pub use error::{Error, ErrorKind, Result};
pub use job::{FnRunner, JobRunner, SimulationJob};
pub use parameter::{ChangeMode, Parameter, ParameterConfig, ParameterSet};
pub use policy::{ComparisonMode, ErrorPolicy, Regime, Tolerance, TrackedSignal};
pub use result::{
    Classification, CriticalValueResult, ErrorRecord, ExitStatus, JobResult, NOT_FOUND,
    Verdict,
};
pub use signal::Signal;
