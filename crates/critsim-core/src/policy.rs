//! Per-signal error policies.
//!
//! A policy decides, sample by sample, whether a candidate deviates "enough"
//! from the golden reference. The reference value selects one of three
//! regimes (logic high, logic low, everything else), each with its own
//! absolute margin and minimum duration.

use serde::{Deserialize, Serialize};

use crate::units::{deserialize_si, deserialize_si_opt};

/// How excursions beyond the margin are turned into error intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMode {
    /// Every offending sample is an interval `(t, t)`.
    #[default]
    Punctual,
    /// An excursion counts only once it outlasts the regime's span.
    Sustained,
}

/// Regime of one sample, selected by the reference value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    High,
    Low,
    Default,
}

/// Margin and minimum duration for one regime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    #[serde(deserialize_with = "deserialize_si")]
    pub margin: f64,
    #[serde(default, deserialize_with = "deserialize_si")]
    pub span: f64,
}

impl Tolerance {
    pub fn new(margin: f64, span: f64) -> Self {
        Self { margin, span }
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            margin: 0.1,
            span: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorPolicy {
    pub mode: ComparisonMode,
    pub high: Tolerance,
    pub low: Tolerance,
    pub default: Tolerance,
    /// Reference values at or above this are in the high regime.
    #[serde(deserialize_with = "deserialize_si_opt")]
    pub high_threshold: Option<f64>,
    /// Reference values at or below this are in the low regime.
    #[serde(deserialize_with = "deserialize_si_opt")]
    pub low_threshold: Option<f64>,
    #[serde(deserialize_with = "deserialize_si_opt")]
    pub t_start: Option<f64>,
    #[serde(deserialize_with = "deserialize_si_opt")]
    pub t_stop: Option<f64>,
    pub ignore_above_high: bool,
    pub ignore_below_low: bool,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self {
            mode: ComparisonMode::Punctual,
            high: Tolerance::default(),
            low: Tolerance::default(),
            default: Tolerance::default(),
            high_threshold: None,
            low_threshold: None,
            t_start: None,
            t_stop: None,
            ignore_above_high: false,
            ignore_below_low: false,
        }
    }
}

impl ErrorPolicy {
    /// Same tolerance in every regime.
    pub fn uniform(margin: f64, span: f64) -> Self {
        let tol = Tolerance::new(margin, span);
        Self {
            high: tol,
            low: tol,
            default: tol,
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: ComparisonMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_thresholds(mut self, low: f64, high: f64) -> Self {
        self.low_threshold = Some(low);
        self.high_threshold = Some(high);
        self
    }

    pub fn with_high(mut self, tol: Tolerance) -> Self {
        self.high = tol;
        self
    }

    pub fn with_low(mut self, tol: Tolerance) -> Self {
        self.low = tol;
        self
    }

    pub fn with_window(mut self, t_start: f64, t_stop: f64) -> Self {
        self.t_start = Some(t_start);
        self.t_stop = Some(t_stop);
        self
    }

    pub fn ignoring_rails(mut self, above_high: bool, below_low: bool) -> Self {
        self.ignore_above_high = above_high;
        self.ignore_below_low = below_low;
        self
    }

    /// Regime for a reference value, or `None` when the sample is exempt.
    pub fn regime(&self, reference: f64) -> Option<Regime> {
        if self.high_threshold.is_some_and(|h| reference >= h) {
            (!self.ignore_above_high).then_some(Regime::High)
        } else if self.low_threshold.is_some_and(|l| reference <= l) {
            (!self.ignore_below_low).then_some(Regime::Low)
        } else {
            Some(Regime::Default)
        }
    }

    pub fn tolerance(&self, regime: Regime) -> Tolerance {
        match regime {
            Regime::High => self.high,
            Regime::Low => self.low,
            Regime::Default => self.default,
        }
    }

    /// Before the window start: not yet classified.
    pub fn before_window(&self, t: f64) -> bool {
        self.t_start.is_some_and(|t0| t < t0)
    }

    /// Past the window end: classification has stopped.
    pub fn after_window(&self, t: f64) -> bool {
        self.t_stop.is_some_and(|tf| t > tf)
    }
}

/// A signal tracked in the simulator output, with its policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedSignal {
    pub name: String,
    #[serde(default)]
    pub policy: ErrorPolicy,
    /// Compared against the golden run. Non-analyzable signals are still
    /// exported to the processed data file.
    #[serde(default = "default_true")]
    pub analyzable: bool,
}

fn default_true() -> bool {
    true
}

impl TrackedSignal {
    pub fn new(name: impl Into<String>, policy: ErrorPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            analyzable: true,
        }
    }

    /// Exported but never compared.
    pub fn passive(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            policy: ErrorPolicy::default(),
            analyzable: false,
        }
    }
}
