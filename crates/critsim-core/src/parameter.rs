//! Sweepable scalar parameters.
//!
//! A [`Parameter`] is either fixed (it always contributes its current value)
//! or sweepable between `min` and `max` in `steps` points. Step values follow
//! a linear or logarithmic progression:
//!
//! - `Linear`: evenly spaced.
//! - `LogAscending`: geometric, fine steps near `min` growing toward `max`.
//! - `LogDescending`: the mirror image, fine steps near `max`.
//!
//! Logarithmic modes need both bounds nonzero and of the same sign; otherwise
//! the parameter silently degrades to linear stepping (with a warning at
//! [`Parameter::init_sweep`]).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::units::{deserialize_si, deserialize_si_opt};

/// How successive sweep values are spaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChangeMode {
    #[default]
    Linear,
    LogAscending,
    LogDescending,
}

impl ChangeMode {
    /// Parse a mode name. Unknown names fall back to `Linear`.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().replace(['_', '-', ' '], "").as_str() {
            "linear" | "lin" => ChangeMode::Linear,
            "logascending" | "logasc" | "log" => ChangeMode::LogAscending,
            "logdescending" | "logdesc" => ChangeMode::LogDescending,
            other => {
                log::warn!("unknown change mode {other:?}, using linear");
                ChangeMode::Linear
            }
        }
    }

    pub fn is_logarithmic(self) -> bool {
        !matches!(self, ChangeMode::Linear)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChangeMode::Linear => "linear",
            ChangeMode::LogAscending => "log_ascending",
            ChangeMode::LogDescending => "log_descending",
        }
    }
}

impl From<String> for ChangeMode {
    fn from(s: String) -> Self {
        ChangeMode::parse(&s)
    }
}

impl From<ChangeMode> for String {
    fn from(mode: ChangeMode) -> Self {
        mode.as_str().to_string()
    }
}

impl fmt::Display for ChangeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Increments computed once per parameter definition.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct SweepIncrements {
    linear: f64,
    /// Present only when the bounds permit a logarithmic progression.
    log: Option<f64>,
}

/// A named, bounded scalar.
///
/// The sweep definition (bounds, steps, mode) is fixed at construction so
/// the cached increments always match it; only the current value changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ParameterConfig", into = "ParameterConfig")]
pub struct Parameter {
    /// Name, matched against `{{name}}` placeholders in circuit templates.
    pub name: String,
    /// Current value. Overwritten per job before dispatch.
    pub value: f64,
    sweepable: bool,
    min: f64,
    max: f64,
    mode: ChangeMode,
    /// Number of sweep points (N).
    steps: usize,
    /// Bisection stops once the bracket ratio is below `1 + margin/100`.
    pub stop_margin_percent: f64,
    increments: SweepIncrements,
}

impl Parameter {
    /// A parameter that always takes `value`.
    pub fn fixed(name: impl Into<String>, value: f64) -> Self {
        let mut p = Self {
            name: name.into(),
            value,
            sweepable: false,
            min: value,
            max: value,
            mode: ChangeMode::Linear,
            steps: 1,
            stop_margin_percent: 1.0,
            increments: SweepIncrements::default(),
        };
        p.refresh();
        p
    }

    /// A sweepable parameter spanning `[min, max]` in `steps` points.
    pub fn sweepable(name: impl Into<String>, min: f64, max: f64, steps: usize) -> Self {
        let mut p = Self {
            name: name.into(),
            value: min,
            sweepable: true,
            min,
            max,
            mode: ChangeMode::Linear,
            steps,
            stop_margin_percent: 1.0,
            increments: SweepIncrements::default(),
        };
        p.refresh();
        p
    }

    /// A bounded, non-sweepable parameter, as used for the critical
    /// parameter of a bisection search.
    pub fn bounded(name: impl Into<String>, min: f64, max: f64) -> Self {
        let mut p = Self::sweepable(name, min, max, 2);
        p.sweepable = false;
        p
    }

    pub fn with_mode(mut self, mode: ChangeMode) -> Self {
        self.mode = mode;
        self.refresh();
        self
    }

    pub fn with_stop_margin(mut self, percent: f64) -> Self {
        self.stop_margin_percent = percent;
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    /// Whether the parameter spans a grid axis.
    pub fn is_sweepable(&self) -> bool {
        self.sweepable
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn mode(&self) -> ChangeMode {
        self.mode
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Validate the definition and compute the sweep increments.
    pub fn init_sweep(&mut self) -> Result<()> {
        self.validate()?;
        self.refresh();
        if self.mode.is_logarithmic() && self.increments.log.is_none() {
            log::warn!(
                "parameter {}: logarithmic mode needs nonzero bounds of equal sign ([{}, {}]), using linear",
                self.name,
                self.min,
                self.max
            );
        }
        Ok(())
    }

    /// Check the structural invariants.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Error::InvalidParameter {
            name: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("empty name".into()));
        }
        if !self.value.is_finite() || !self.min.is_finite() || !self.max.is_finite() {
            return Err(invalid("non-finite value or bound".into()));
        }
        if self.steps == 0 {
            return Err(invalid("step count must be at least 1".into()));
        }
        if self.sweepable {
            if self.steps < 2 {
                return Err(invalid(format!(
                    "sweepable parameter needs at least 2 steps, got {}",
                    self.steps
                )));
            }
            if self.min >= self.max {
                return Err(invalid(format!(
                    "min ({}) must be below max ({})",
                    self.min, self.max
                )));
            }
        }
        if self.stop_margin_percent <= 0.0 {
            return Err(invalid("stop margin must be positive".into()));
        }
        Ok(())
    }

    fn refresh(&mut self) {
        let intervals = self.steps.saturating_sub(1).max(1) as f64;
        let linear = (self.max - self.min) / intervals;
        let log = if self.log_permitted() {
            Some((self.max / self.min).ln() / intervals)
        } else {
            None
        };
        self.increments = SweepIncrements { linear, log };
    }

    /// Logarithmic stepping needs nonzero bounds on the same side of zero.
    pub fn log_permitted(&self) -> bool {
        self.min != 0.0 && self.max != 0.0 && self.min.signum() == self.max.signum()
    }

    /// The mode actually applied after the log-permission check.
    pub fn effective_mode(&self) -> ChangeMode {
        if self.mode.is_logarithmic() && self.increments.log.is_none() {
            ChangeMode::Linear
        } else {
            self.mode
        }
    }

    /// Number of grid points this parameter contributes.
    pub fn grid_steps(&self) -> usize {
        if self.sweepable { self.steps } else { 1 }
    }

    /// Value of sweep step `index` (clamped to the last step).
    pub fn sweep_value(&self, index: usize) -> f64 {
        if !self.sweepable {
            return self.value;
        }
        let last = self.steps.saturating_sub(1);
        let i = index.min(last);

        match (self.effective_mode(), self.increments.log) {
            (ChangeMode::LogAscending, Some(k)) => {
                if self.min > 0.0 {
                    self.geometric(i, k)
                } else {
                    self.mirrored(i, last, k)
                }
            }
            (ChangeMode::LogDescending, Some(k)) => {
                if self.min > 0.0 {
                    self.mirrored(i, last, k)
                } else {
                    self.geometric(i, k)
                }
            }
            _ => self.min + i as f64 * self.increments.linear,
        }
    }

    /// All step values in order.
    pub fn values(&self) -> Vec<f64> {
        (0..self.grid_steps()).map(|i| self.sweep_value(i)).collect()
    }

    /// Midpoint of a bracket, arithmetic or geometric depending on the mode.
    pub fn midpoint(&self, a: f64, b: f64) -> f64 {
        let same_side = a != 0.0 && b != 0.0 && a.signum() == b.signum();
        if self.effective_mode().is_logarithmic() && same_side {
            a.signum() * (a * b).sqrt()
        } else {
            0.5 * (a + b)
        }
    }

    fn geometric(&self, j: usize, k: f64) -> f64 {
        self.min * (j as f64 * k).exp()
    }

    fn mirrored(&self, i: usize, last: usize, k: f64) -> f64 {
        self.min + self.max - self.geometric(last - i, k)
    }
}

/// Serialized form of a [`Parameter`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterConfig {
    pub name: String,
    #[serde(deserialize_with = "deserialize_si")]
    pub value: f64,
    #[serde(default)]
    pub sweepable: bool,
    #[serde(default, deserialize_with = "deserialize_si_opt")]
    pub min: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_si_opt")]
    pub max: Option<f64>,
    #[serde(default)]
    pub mode: ChangeMode,
    #[serde(default = "default_steps")]
    pub steps: usize,
    #[serde(default = "default_stop_margin")]
    pub stop_margin_percent: f64,
}

fn default_steps() -> usize {
    1
}

fn default_stop_margin() -> f64 {
    1.0
}

impl TryFrom<ParameterConfig> for Parameter {
    type Error = Error;

    fn try_from(cfg: ParameterConfig) -> Result<Self> {
        let mut p = Parameter {
            name: cfg.name,
            value: cfg.value,
            sweepable: cfg.sweepable,
            min: cfg.min.unwrap_or(cfg.value),
            max: cfg.max.unwrap_or(cfg.value),
            mode: cfg.mode,
            steps: cfg.steps,
            stop_margin_percent: cfg.stop_margin_percent,
            increments: SweepIncrements::default(),
        };
        p.init_sweep()?;
        Ok(p)
    }
}

impl From<Parameter> for ParameterConfig {
    fn from(p: Parameter) -> Self {
        Self {
            name: p.name,
            value: p.value,
            sweepable: p.sweepable,
            min: Some(p.min),
            max: Some(p.max),
            mode: p.mode,
            steps: p.steps,
            stop_margin_percent: p.stop_margin_percent,
        }
    }
}

/// Ordered set of parameters for one job. Cloning is a plain value copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    params: Vec<Parameter>,
}

impl ParameterSet {
    /// Build a set, validating every parameter and rejecting duplicate names.
    pub fn new(mut params: Vec<Parameter>) -> Result<Self> {
        for p in params.iter_mut() {
            p.init_sweep()?;
        }
        for (i, p) in params.iter().enumerate() {
            if params[..i].iter().any(|q| q.name == p.name) {
                return Err(Error::InvalidParameter {
                    name: p.name.clone(),
                    reason: "duplicate parameter name".into(),
                });
            }
        }
        Ok(Self { params })
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn require(&self, name: &str) -> Result<&Parameter> {
        self.get(name)
            .ok_or_else(|| Error::ParameterNotFound(name.to_string()))
    }

    /// Indices of the sweepable parameters, in definition order.
    pub fn sweepable_indices(&self) -> Vec<usize> {
        self.params
            .iter()
            .enumerate()
            .filter(|(_, p)| p.sweepable)
            .map(|(i, _)| i)
            .collect()
    }

    /// Sweepable parameters excluding `skip` (the critical parameter).
    pub fn sweep_axes(&self, skip: Option<&str>) -> Vec<&Parameter> {
        self.params
            .iter()
            .filter(|p| p.sweepable && Some(p.name.as_str()) != skip)
            .collect()
    }

    /// Set the current value of a parameter in place.
    pub fn set_value(&mut self, name: &str, value: f64) -> Result<()> {
        let p = self
            .params
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::ParameterNotFound(name.to_string()))?;
        p.value = value;
        Ok(())
    }

    /// Copy of this set with one value substituted.
    pub fn with_value(&self, name: &str, value: f64) -> Result<Self> {
        let mut copy = self.clone();
        copy.set_value(name, value)?;
        Ok(copy)
    }
}

impl std::ops::Index<usize> for ParameterSet {
    type Output = Parameter;

    fn index(&self, index: usize) -> &Parameter {
        &self.params[index]
    }
}
