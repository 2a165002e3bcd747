//! Run context handed to every component.
//!
//! There is no process-wide logger state in the library: each orchestrator
//! receives a [`RunContext`] and derives child contexts for the jobs it
//! dispatches. Messages go to the `log` facade and errors are additionally
//! appended to the shared [`ErrorLog`].

use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

enum Sink {
    File { file: File, path: PathBuf },
    Memory(Vec<String>),
}

/// Append-only error log shared by all jobs of a run.
pub struct ErrorLog {
    sink: Mutex<Sink>,
}

impl ErrorLog {
    /// Open (or create) a log file in append mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            sink: Mutex::new(Sink::File { file, path }),
        })
    }

    /// Keep entries in memory, for tests and dry runs.
    pub fn in_memory() -> Self {
        Self {
            sink: Mutex::new(Sink::Memory(Vec::new())),
        }
    }

    pub fn append(&self, line: &str) {
        let mut sink = match self.sink.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match &mut *sink {
            Sink::File { file, path } => {
                if let Err(e) = writeln!(file, "{line}") {
                    log::warn!("cannot write error log {}: {e}", path.display());
                }
            }
            Sink::Memory(lines) => lines.push(line.to_string()),
        }
    }

    /// Entries kept by an in-memory log (empty for file logs).
    pub fn entries(&self) -> Vec<String> {
        let sink = match self.sink.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match &*sink {
            Sink::Memory(lines) => lines.clone(),
            Sink::File { .. } => Vec::new(),
        }
    }
}

impl std::fmt::Debug for ErrorLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorLog").finish_non_exhaustive()
    }
}

/// Label plus logging handle for one unit of work.
#[derive(Debug, Clone)]
pub struct RunContext {
    label: String,
    errors: Arc<ErrorLog>,
}

impl RunContext {
    pub fn new(label: impl Into<String>, errors: Arc<ErrorLog>) -> Self {
        Self {
            label: label.into(),
            errors,
        }
    }

    /// Context backed by an in-memory error log.
    pub fn detached(label: impl Into<String>) -> Self {
        Self::new(label, Arc::new(ErrorLog::in_memory()))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn error_log(&self) -> &ErrorLog {
        &self.errors
    }

    /// Context for a nested unit of work (`grid/point_3/mc_1`).
    pub fn child(&self, name: impl Display) -> Self {
        Self {
            label: format!("{}/{}", self.label, name),
            errors: Arc::clone(&self.errors),
        }
    }

    pub fn error(&self, msg: impl Display) {
        log::error!("[{}] {}", self.label, msg);
        self.errors.append(&format!("[{}] {}", self.label, msg));
    }

    /// Log an [`Error`] together with its taxonomy kind.
    pub fn record(&self, err: &Error) {
        self.error(format_args!("{:?}: {}", err.kind(), err));
    }

    pub fn warn(&self, msg: impl Display) {
        log::warn!("[{}] {}", self.label, msg);
    }

    pub fn info(&self, msg: impl Display) {
        log::info!("[{}] {}", self.label, msg);
    }

    pub fn debug(&self, msg: impl Display) {
        log::debug!("[{}] {}", self.label, msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_labels_share_log() {
        let ctx = RunContext::detached("grid");
        let child = ctx.child("point_2").child("mc_0");
        assert_eq!(child.label(), "grid/point_2/mc_0");

        child.error("simulator exited with code 1");
        assert_eq!(
            ctx.error_log().entries(),
            vec!["[grid/point_2/mc_0] simulator exited with code 1".to_string()]
        );
    }

    #[test]
    fn test_file_log_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.log");
        {
            let ctx = RunContext::new("run", Arc::new(ErrorLog::open(&path).unwrap()));
            ctx.record(&Error::setup("golden reference not configured"));
        }
        {
            let ctx = RunContext::new("run", Arc::new(ErrorLog::open(&path).unwrap()));
            ctx.error("second");
        }
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.starts_with("[run] Setup: setup error: golden reference"));
    }
}
