//! Golden reference management.
//!
//! The golden reference is the unperturbed run every candidate is compared
//! against. It is loaded once, from a stored JSON file or from the simulator's
//! own PSF output, and shared read-only by all jobs.

pub mod format;

use std::path::Path;

use critsim_core::{Error, Result, Signal, TrackedSignal};

use crate::simulator::{PsfLayout, Waveform, read_psf};

pub use format::GoldenFile;

/// Reference signals of the unperturbed run.
#[derive(Debug, Clone, Default)]
pub struct GoldenReference {
    signals: Vec<Signal>,
}

impl GoldenReference {
    pub fn new(signals: Vec<Signal>) -> Self {
        Self { signals }
    }

    pub fn from_waveform(waveform: &Waveform) -> Self {
        Self::new(waveform.signals())
    }

    /// Load from a PSF-ASCII file written by a nominal simulator run.
    pub fn from_psf(path: &Path, tracked: &[TrackedSignal], layout: PsfLayout) -> Result<Self> {
        let waveform = read_psf(path, tracked, layout)?;
        Ok(Self::from_waveform(&waveform))
    }

    pub fn get(&self, name: &str) -> Option<&Signal> {
        self.signals.iter().find(|s| s.name == name)
    }

    pub fn require(&self, name: &str) -> Result<&Signal> {
        self.get(name)
            .ok_or_else(|| Error::setup(format!("golden reference has no signal {name}")))
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Every analyzable tracked signal must be present and well formed.
    pub fn validate(&self, tracked: &[TrackedSignal]) -> Result<()> {
        for t in tracked.iter().filter(|t| t.analyzable) {
            let signal = self.require(&t.name)?;
            if signal.is_empty() {
                return Err(Error::setup(format!("golden signal {} is empty", t.name)));
            }
            signal.validate()?;
        }
        Ok(())
    }

    pub fn to_file(&self, description: &str) -> GoldenFile {
        GoldenFile {
            generator: format!("critsim {}", env!("CARGO_PKG_VERSION")),
            description: description.to_string(),
            signals: self.signals.clone(),
        }
    }
}

/// Load a golden file from disk.
pub fn load_golden_file(path: &Path) -> Result<GoldenReference> {
    if !path.exists() {
        return Err(Error::setup(format!(
            "golden reference not found: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let file: GoldenFile = serde_json::from_str(&content)
        .map_err(|e| Error::setup(format!("invalid golden file {}: {e}", path.display())))?;

    log::info!(
        "loaded golden reference {} ({} signals)",
        path.display(),
        file.signals.len()
    );
    Ok(GoldenReference::new(file.signals))
}

/// Write a golden file as pretty-printed JSON.
pub fn save_golden_file(path: &Path, golden: &GoldenReference, description: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(&golden.to_file(description))?;
    std::fs::write(path, json)?;
    Ok(())
}
