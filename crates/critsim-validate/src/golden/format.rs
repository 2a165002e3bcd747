//! Golden reference file format.

use serde::{Deserialize, Serialize};

use critsim_core::Signal;

/// A stored golden run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenFile {
    /// Simulator that produced the run (e.g., "spectre 21.1").
    #[serde(default)]
    pub generator: String,
    #[serde(default)]
    pub description: String,
    pub signals: Vec<Signal>,
}
