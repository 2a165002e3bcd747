//! Statistics over Monte Carlo iterations.
//!
//! - Running reductions (count, min, max, mean) that can be merged
//! - Order statistics (median and quartiles) over sorted samples

use serde::{Deserialize, Serialize};

/// Count, min, max and mean of a set of values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl Default for ValueSummary {
    fn default() -> Self {
        Self {
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            mean: 0.0,
        }
    }
}

/// Accumulator for incremental statistics computation.
///
/// Accumulators from independent batches can be merged.
#[derive(Debug, Clone, Copy)]
pub struct StatisticsAccumulator {
    count: usize,
    sum: f64,
    min: f64,
    max: f64,
}

impl StatisticsAccumulator {
    pub fn new() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    #[inline]
    pub fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    #[inline]
    pub fn merge(&mut self, other: &Self) {
        self.count += other.count;
        self.sum += other.sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// `None` when nothing was added.
    pub fn finalize(&self) -> Option<ValueSummary> {
        (self.count > 0).then(|| ValueSummary {
            count: self.count,
            min: self.min,
            max: self.max,
            mean: self.sum / self.count as f64,
        })
    }
}

impl Default for StatisticsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<f64> for StatisticsAccumulator {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut acc = Self::new();
        for v in iter {
            acc.add(v);
        }
        acc
    }
}

/// Mean, extremes and quartiles of a sample.
///
/// Quartiles use truncated indices into the sorted sample:
/// median `[len/2]`, p25 `[len/4]`, p75 `[3*len/4]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub p25: f64,
    pub p75: f64,
}

impl Percentiles {
    /// `None` for an empty sample. NaN values are ignored.
    pub fn from_values(mut values: Vec<f64>) -> Option<Self> {
        values.retain(|v| !v.is_nan());
        if values.is_empty() {
            return None;
        }
        values.sort_by(f64::total_cmp);

        let len = values.len();
        let mean = values.iter().sum::<f64>() / len as f64;
        Some(Self {
            count: len,
            mean,
            min: values[0],
            max: values[len - 1],
            median: values[len / 2],
            p25: values[len / 4],
            p75: values[3 * len / 4],
        })
    }
}
