//! Named time series.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A named waveform sampled at strictly increasing times.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub name: String,
    pub times: Vec<f64>,
    pub values: Vec<f64>,
}

impl Signal {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            times: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Build from `(time, value)` pairs.
    pub fn from_samples(name: impl Into<String>, samples: &[(f64, f64)]) -> Self {
        let mut signal = Self::new(name);
        for &(t, v) in samples {
            signal.push(t, v);
        }
        signal
    }

    pub fn push(&mut self, time: f64, value: f64) {
        self.times.push(time);
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn first_time(&self) -> Option<f64> {
        self.times.first().copied()
    }

    pub fn last_time(&self) -> Option<f64> {
        self.times.last().copied()
    }

    pub fn samples(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.times.iter().copied().zip(self.values.iter().copied())
    }

    /// Check that times are strictly increasing and lengths agree.
    pub fn validate(&self) -> Result<()> {
        if self.times.len() != self.values.len() {
            return Err(Error::setup(format!(
                "signal {}: {} times but {} values",
                self.name,
                self.times.len(),
                self.values.len()
            )));
        }
        if let Some(i) = self.times.windows(2).position(|w| w[1] <= w[0]) {
            return Err(Error::setup(format!(
                "signal {}: time not strictly increasing at sample {} ({} -> {})",
                self.name,
                i + 1,
                self.times[i],
                self.times[i + 1]
            )));
        }
        Ok(())
    }
}
