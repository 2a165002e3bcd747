//! Simulation jobs and the capability that runs them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::context::RunContext;
use crate::error::Result;
use crate::parameter::ParameterSet;
use crate::result::JobResult;

/// One simulator run: a parameter assignment in its own working directory.
#[derive(Debug, Clone)]
pub struct SimulationJob {
    pub label: String,
    pub workdir: PathBuf,
    pub parameters: ParameterSet,
    /// Per-iteration seed for randomized circuit generation.
    pub seed: Option<u64>,
}

impl SimulationJob {
    pub fn new(label: impl Into<String>, workdir: impl Into<PathBuf>, parameters: ParameterSet) -> Self {
        Self {
            label: label.into(),
            workdir: workdir.into(),
            parameters,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Same job with one parameter changed, in a different directory.
    pub fn probe(&self, label: impl Into<String>, workdir: &Path, name: &str, value: f64) -> Result<Self> {
        Ok(Self {
            label: label.into(),
            workdir: workdir.to_path_buf(),
            parameters: self.parameters.with_value(name, value)?,
            seed: self.seed,
        })
    }
}

/// Runs a job to completion.
///
/// A simulator that exits with a failure status is reported through
/// [`JobResult::exit_status`]; an `Err` means the job's output could not be
/// evaluated at all (parse failure, IO).
pub trait JobRunner: Send + Sync {
    fn run(&self, job: &SimulationJob, ctx: &RunContext) -> Result<JobResult>;
}

impl<T: JobRunner + ?Sized> JobRunner for &T {
    fn run(&self, job: &SimulationJob, ctx: &RunContext) -> Result<JobResult> {
        (**self).run(job, ctx)
    }
}

impl<T: JobRunner + ?Sized> JobRunner for Arc<T> {
    fn run(&self, job: &SimulationJob, ctx: &RunContext) -> Result<JobResult> {
        (**self).run(job, ctx)
    }
}

/// Adapts a closure into a [`JobRunner`], for synthetic sensitivity models.
pub struct FnRunner<F>(pub F);

impl<F> JobRunner for FnRunner<F>
where
    F: Fn(&SimulationJob) -> Result<JobResult> + Send + Sync,
{
    fn run(&self, job: &SimulationJob, _ctx: &RunContext) -> Result<JobResult> {
        (self.0)(job)
    }
}
