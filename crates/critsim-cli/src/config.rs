//! Scenario configuration files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use critsim::{
    DataFormat, Parameter, ParameterConfig, ParameterSet, PsfLayout, SimulationMode,
    SimulatorConfig, TrackedSignal,
};

/// Where the golden waveforms come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum GoldenSource {
    /// A golden JSON file written by an earlier run.
    File { path: PathBuf },
    /// Simulate the circuit at its configured values first.
    Simulate,
}

/// One scenario: circuit, signals, parameters and what to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Circuit template, relative to the scenario file.
    pub template: PathBuf,
    pub parameters: Vec<ParameterConfig>,
    pub signals: Vec<TrackedSignal>,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    pub golden: GoldenSource,
    #[serde(default)]
    pub layout: PsfLayout,
    #[serde(default)]
    pub format: DataFormat,
    pub run: SimulationMode,
    /// Output root, relative to the scenario file.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

fn default_name() -> String {
    "scenario".into()
}

impl ScenarioConfig {
    /// Load a scenario, resolving relative paths against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario: {}", path.display()))?;
        let mut config: ScenarioConfig = serde_json::from_str(&content)
            .with_context(|| format!("Invalid scenario: {}", path.display()))?;

        let base = path.parent().unwrap_or(Path::new("."));
        config.template = base.join(&config.template);
        if let GoldenSource::File { path } = &mut config.golden {
            *path = base.join(&*path);
        }
        config.root = config.root.map(|root| base.join(root));
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.signals.is_empty() {
            bail!("scenario {} tracks no signals", self.name);
        }
        if !self.signals.iter().any(|s| s.analyzable) {
            bail!("scenario {} has no analyzable signal", self.name);
        }
        self.parameter_set()?;
        Ok(())
    }

    pub fn parameter_set(&self) -> Result<ParameterSet> {
        let params = self
            .parameters
            .iter()
            .cloned()
            .map(Parameter::try_from)
            .collect::<critsim::core::Result<Vec<_>>>()?;
        Ok(ParameterSet::new(params)?)
    }

    /// Override the in-flight width of whichever level the mode schedules.
    pub fn set_jobs(&mut self, jobs: usize) {
        match &mut self.run {
            SimulationMode::NdSweep { sweep } => sweep.jobs = jobs,
            SimulationMode::MonteCarlo { monte_carlo, .. } => monte_carlo.jobs = jobs,
            SimulationMode::Standard | SimulationMode::CriticalValue { .. } => {
                log::warn!("--jobs has no effect in this mode");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"{
        "name": "seu_latch",
        "template": "latch.scs",
        "parameters": [
            {"name": "charge", "value": "10f", "min": "1f", "max": "1p", "mode": "log_ascending"},
            {"name": "vdd", "value": 1.2, "sweepable": true, "min": 1.0, "max": 1.2, "steps": 3}
        ],
        "signals": [
            {"name": "q", "policy": {"high": {"margin": 0.2}, "high_threshold": 0.9, "low_threshold": 0.3}},
            {"name": "clk", "analyzable": false}
        ],
        "simulator": {"binary": "spectre", "timeout_secs": 600},
        "golden": {"source": "file", "path": "golden.json"},
        "layout": "unordered",
        "run": {"mode": "nd_sweep", "sweep": {"jobs": 4, "search": {"parameter": "charge"}}}
    }"#;

    #[test]
    fn test_load_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.json");
        std::fs::write(&path, SCENARIO).unwrap();

        let mut config = ScenarioConfig::load(&path).unwrap();
        assert_eq!(config.name, "seu_latch");
        assert_eq!(config.template, dir.path().join("latch.scs"));
        assert_eq!(
            config.golden,
            GoldenSource::File {
                path: dir.path().join("golden.json")
            }
        );
        assert_eq!(config.layout, PsfLayout::Unordered);
        assert_eq!(config.simulator.timeout_secs, Some(600));
        assert!(!config.signals[1].analyzable);

        let params = config.parameter_set().unwrap();
        assert!((params.require("charge").unwrap().value - 1e-14).abs() < 1e-20);
        assert_eq!(params.sweepable_indices(), vec![1]);

        config.set_jobs(8);
        assert!(matches!(&config.run, SimulationMode::NdSweep { sweep } if sweep.jobs == 8));
    }

    #[test]
    fn test_rejects_scenario_without_analyzable_signal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.json");
        let text = SCENARIO.replace(r#"{"name": "q", "policy""#, r#"{"analyzable": false, "name": "q", "policy""#);
        std::fs::write(&path, text).unwrap();
        assert!(ScenarioConfig::load(&path).is_err());
    }
}
