//! Per-job and per-search results.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Written in result files in place of a value that does not exist.
pub const NOT_FOUND: &str = "notFound";

/// Outcome of the external simulator process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitStatus {
    Success,
    /// Nonzero exit code.
    Code(i32),
    /// Terminated without an exit code (signal or timeout).
    Killed,
    /// Exited cleanly but produced a waveform that stops short of the
    /// reference run.
    Truncated,
}

impl ExitStatus {
    pub fn is_success(self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    pub fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => ExitStatus::Success,
            Some(c) => ExitStatus::Code(c),
            None => ExitStatus::Killed,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Success => write!(f, "success"),
            ExitStatus::Code(c) => write!(f, "exit code {c}"),
            ExitStatus::Killed => write!(f, "killed"),
            ExitStatus::Truncated => write!(f, "truncated waveform"),
        }
    }
}

/// Whether the perturbation produced an observable error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verdict {
    #[default]
    NotEvaluated,
    Sensitive,
    NotSensitive,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::NotEvaluated => "not_evaluated",
            Verdict::Sensitive => "sensitive",
            Verdict::NotSensitive => "not_sensitive",
        };
        f.write_str(s)
    }
}

/// Divergence of one signal against its golden reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub signal: String,
    /// Max |deviation| over samples classified by the signal's policy.
    pub metric_error: f64,
    /// Max |deviation| over every aligned sample.
    pub global_error: f64,
    /// `(start, end)` times where the deviation exceeded the margin.
    pub intervals: Vec<(f64, f64)>,
}

impl ErrorRecord {
    pub fn new(signal: impl Into<String>) -> Self {
        Self {
            signal: signal.into(),
            ..Default::default()
        }
    }

    pub fn has_divergence(&self) -> bool {
        !self.intervals.is_empty()
    }
}

/// Result of a single simulator job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub exit_status: ExitStatus,
    pub verdict: Verdict,
    pub errors: Vec<ErrorRecord>,
    /// Raw simulator waveform. `None` once discarded.
    pub raw_path: Option<PathBuf>,
    /// Processed data file. `None` once discarded.
    pub processed_path: Option<PathBuf>,
}

impl JobResult {
    /// A job whose simulation did not produce comparable data.
    pub fn failed(exit_status: ExitStatus) -> Self {
        Self {
            exit_status,
            verdict: Verdict::NotEvaluated,
            errors: Vec::new(),
            raw_path: None,
            processed_path: None,
        }
    }

    /// A completed job; the verdict follows from the error records.
    pub fn completed(errors: Vec<ErrorRecord>) -> Self {
        let verdict = if errors.iter().any(ErrorRecord::has_divergence) {
            Verdict::Sensitive
        } else {
            Verdict::NotSensitive
        };
        Self {
            exit_status: ExitStatus::Success,
            verdict,
            errors,
            raw_path: None,
            processed_path: None,
        }
    }

    pub fn simulator_ok(&self) -> bool {
        self.exit_status.is_success()
    }

    pub fn is_sensitive(&self) -> bool {
        self.verdict == Verdict::Sensitive
    }

    pub fn error_for(&self, signal: &str) -> Option<&ErrorRecord> {
        self.errors.iter().find(|e| e.signal == signal)
    }

    /// Delete the waveform files of this job and forget their paths.
    pub fn discard_files(&mut self) -> std::io::Result<()> {
        for path in [self.raw_path.take(), self.processed_path.take()]
            .into_iter()
            .flatten()
        {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// How a critical value search concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    /// Not sensitive even at the maximum; the critical value is above range.
    BoundedByMax,
    /// Already sensitive at the minimum; the critical value is below range.
    BoundedByMin,
    FoundByBisection,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Classification::BoundedByMax => "bounded_by_max",
            Classification::BoundedByMin => "bounded_by_min",
            Classification::FoundByBisection => "found",
        };
        f.write_str(s)
    }
}

/// Result of one critical value search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalValueResult {
    pub value: f64,
    pub classification: Classification,
    /// Probed values in order.
    pub evolution: Vec<f64>,
    /// One entry per probe, aligned with `evolution`.
    pub probes: Vec<JobResult>,
    /// Set when a failed probe ended the search early.
    pub reverted: bool,
}

impl CriticalValueResult {
    /// Result of the probe whose value was reported.
    pub fn final_probe(&self) -> Option<&JobResult> {
        self.evolution
            .iter()
            .rposition(|v| *v == self.value)
            .and_then(|i| self.probes.get(i))
    }
}
