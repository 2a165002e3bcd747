//! Comparison of candidate waveforms against the golden run.
//!
//! Signals are time-aligned with a two-pointer merge and each aligned sample
//! is classified by the signal's [`ErrorPolicy`](critsim_core::ErrorPolicy).

pub mod interpolate;
pub mod report;
pub mod waveform;

pub use interpolate::{AlignedSample, align, check_time_base, interpolate};
pub use report::{ComparisonReport, ComparisonSummary, SignalComparison, WorstPointInfo};
pub use waveform::{compare_report, compare_signal, compare_signals};
