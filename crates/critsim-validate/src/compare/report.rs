//! Comparison report generation.

use serde::{Deserialize, Serialize};

use critsim_core::ErrorRecord;

/// Comparison result for a single signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalComparison {
    pub name: String,
    /// No interval exceeded the policy's margin.
    pub passed: bool,
    pub metric_error: f64,
    pub global_error: f64,
    /// Number of error intervals.
    pub intervals: usize,
    /// Why the signal could not be compared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub worst_point: Option<WorstPointInfo>,
}

impl SignalComparison {
    pub fn from_record(record: &ErrorRecord, worst_point: Option<WorstPointInfo>) -> Self {
        Self {
            name: record.signal.clone(),
            passed: !record.has_divergence(),
            metric_error: record.metric_error,
            global_error: record.global_error,
            intervals: record.intervals.len(),
            failure: None,
            worst_point,
        }
    }

    pub fn failed(name: &str, reason: String) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            metric_error: f64::NAN,
            global_error: f64::NAN,
            intervals: 0,
            failure: Some(reason),
            worst_point: None,
        }
    }
}

/// Information about the worst deviation point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorstPointInfo {
    /// Time of the sample.
    pub at: f64,
    /// Reference value at this point.
    pub expected: f64,
    /// Candidate value at this point.
    pub actual: f64,
    pub error: f64,
}

/// Summary statistics for a comparison.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub total_signals: usize,
    pub passed_signals: usize,
    pub failed_signals: usize,
    /// Largest metric error over the compared signals.
    pub max_error: f64,
}

/// Complete comparison report for one candidate run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub passed: bool,
    pub comparisons: Vec<SignalComparison>,
    pub summary: ComparisonSummary,
}

impl Default for ComparisonReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ComparisonReport {
    pub fn new() -> Self {
        Self {
            passed: true,
            comparisons: Vec::new(),
            summary: ComparisonSummary::default(),
        }
    }

    pub fn add_comparison(&mut self, comp: SignalComparison) {
        if comp.passed {
            self.summary.passed_signals += 1;
        } else {
            self.passed = false;
            self.summary.failed_signals += 1;
        }
        self.summary.total_signals += 1;
        self.comparisons.push(comp);
    }

    pub fn finalize(&mut self) {
        self.summary.max_error = self
            .comparisons
            .iter()
            .map(|c| c.metric_error)
            .filter(|e| e.is_finite())
            .fold(0.0, f64::max);
    }

    /// Format as human-readable text.
    pub fn to_text(&self) -> String {
        let mut out = String::new();

        out.push_str(&format!("Status: {}\n", if self.passed { "PASS" } else { "FAIL" }));
        out.push_str(&format!(
            "Signals: {}/{} passed\n\n",
            self.summary.passed_signals, self.summary.total_signals
        ));

        for comp in &self.comparisons {
            let status = if comp.passed { "PASS" } else { "FAIL" };
            out.push_str(&format!("  {}: {}\n", comp.name, status));
            match &comp.failure {
                Some(reason) => out.push_str(&format!("    Error:    {reason}\n")),
                None => out.push_str(&format!(
                    "    Metric:   {:.6e}\n    Global:   {:.6e}\n    Intervals: {}\n",
                    comp.metric_error, comp.global_error, comp.intervals
                )),
            }

            if let Some(ref worst) = comp.worst_point {
                out.push_str(&format!(
                    "    Worst at: {:.6e} (expected={:.6e}, actual={:.6e}, error={:.6e})\n",
                    worst.at, worst.expected, worst.actual, worst.error
                ));
            }
        }

        out
    }
}
