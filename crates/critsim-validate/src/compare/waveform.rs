//! Waveform comparison against the golden reference.

use critsim_core::{ComparisonMode, ErrorPolicy, ErrorRecord, Result, Signal, TrackedSignal};

use crate::compare::interpolate::{AlignedSample, align, check_time_base};
use crate::compare::report::{ComparisonReport, SignalComparison, WorstPointInfo};
use crate::golden::GoldenReference;

/// An excursion beyond the margin that has not returned yet.
#[derive(Debug, Clone, Copy)]
struct Excursion {
    start: f64,
    span: f64,
}

/// Compare one candidate signal against its reference.
///
/// Fails on a time-base mismatch (the simulator stopped early) or when the
/// candidate's time axis cannot be interpolated.
pub fn compare_signal(
    reference: &Signal,
    candidate: &Signal,
    policy: &ErrorPolicy,
) -> Result<ErrorRecord> {
    compare_with_worst(reference, candidate, policy).map(|(record, _)| record)
}

fn compare_with_worst(
    reference: &Signal,
    candidate: &Signal,
    policy: &ErrorPolicy,
) -> Result<(ErrorRecord, Option<WorstPointInfo>)> {
    check_time_base(reference, candidate)?;
    let samples = align(reference, candidate)?;

    let mut record = ErrorRecord::new(candidate.name.clone());
    let mut worst: Option<WorstPointInfo> = None;
    let mut open: Option<Excursion> = None;
    let mut last_classified: Option<f64> = None;

    for sample in &samples {
        let deviation = sample.deviation().abs();
        record.global_error = record.global_error.max(deviation);

        if policy.before_window(sample.time) || policy.after_window(sample.time) {
            continue;
        }
        let Some(regime) = policy.regime(sample.reference) else {
            close_excursion(&mut open, sample.time, &mut record);
            continue;
        };
        last_classified = Some(sample.time);

        let tolerance = policy.tolerance(regime);
        if deviation > record.metric_error || worst.is_none() {
            worst = Some(worst_point(sample));
        }
        record.metric_error = record.metric_error.max(deviation);

        let exceeded = deviation > tolerance.margin;
        match policy.mode {
            ComparisonMode::Punctual => {
                if exceeded {
                    record.intervals.push((sample.time, sample.time));
                }
            }
            ComparisonMode::Sustained => {
                if exceeded {
                    open.get_or_insert(Excursion {
                        start: sample.time,
                        span: tolerance.span,
                    });
                } else {
                    close_excursion(&mut open, sample.time, &mut record);
                }
            }
        }
    }

    if let Some(end) = last_classified {
        close_excursion(&mut open, end, &mut record);
    }

    Ok((record, worst))
}

/// Report an excursion ending at `end` if it outlasted its span.
fn close_excursion(open: &mut Option<Excursion>, end: f64, record: &mut ErrorRecord) {
    if let Some(excursion) = open.take() {
        if end - excursion.start > excursion.span {
            record.intervals.push((excursion.start, end));
        }
    }
}

fn worst_point(sample: &AlignedSample) -> WorstPointInfo {
    WorstPointInfo {
        at: sample.time,
        expected: sample.reference,
        actual: sample.candidate,
        error: sample.deviation().abs(),
    }
}

/// Compare every analyzable tracked signal. One record per signal.
pub fn compare_signals(
    golden: &GoldenReference,
    candidates: &[Signal],
    tracked: &[TrackedSignal],
) -> Result<Vec<ErrorRecord>> {
    tracked
        .iter()
        .filter(|t| t.analyzable)
        .map(|t| {
            let reference = golden.require(&t.name)?;
            let candidate = find(candidates, &t.name)?;
            compare_signal(reference, candidate, &t.policy)
        })
        .collect()
}

/// Like [`compare_signals`], but collects a printable report instead of
/// stopping at the first failing signal.
pub fn compare_report(
    golden: &GoldenReference,
    candidates: &[Signal],
    tracked: &[TrackedSignal],
) -> ComparisonReport {
    let mut report = ComparisonReport::new();

    for t in tracked.iter().filter(|t| t.analyzable) {
        let outcome = golden.require(&t.name).and_then(|reference| {
            let candidate = find(candidates, &t.name)?;
            compare_with_worst(reference, candidate, &t.policy)
        });
        let comparison = match outcome {
            Ok((record, worst_point)) => SignalComparison::from_record(&record, worst_point),
            Err(e) => SignalComparison::failed(&t.name, e.to_string()),
        };
        report.add_comparison(comparison);
    }

    report.finalize();
    report
}

fn find<'a>(signals: &'a [Signal], name: &str) -> Result<&'a Signal> {
    signals
        .iter()
        .find(|s| s.name == name)
        .ok_or_else(|| critsim_core::Error::SignalNotFound(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use critsim_core::Tolerance;

    fn step(name: &str, values: &[f64]) -> Signal {
        let samples: Vec<(f64, f64)> = values
            .iter()
            .enumerate()
            .map(|(i, v)| (i as f64, *v))
            .collect();
        Signal::from_samples(name, &samples)
    }

    #[test]
    fn test_identical_signals() {
        let s = step("out", &[0.0, 1.0, 1.0, 0.0]);
        let record = compare_signal(&s, &s, &ErrorPolicy::uniform(0.1, 0.0)).unwrap();
        assert_eq!(record.metric_error, 0.0);
        assert_eq!(record.global_error, 0.0);
        assert!(!record.has_divergence());
    }

    #[test]
    fn test_punctual_intervals() {
        let reference = step("out", &[0.0, 0.0, 0.0, 0.0, 0.0]);
        let candidate = step("out", &[0.0, 0.5, 0.05, 0.5, 0.0]);
        let record =
            compare_signal(&reference, &candidate, &ErrorPolicy::uniform(0.1, 0.0)).unwrap();
        assert_eq!(record.intervals, vec![(1.0, 1.0), (3.0, 3.0)]);
        assert_eq!(record.metric_error, 0.5);
    }

    #[test]
    fn test_sustained_discards_short_glitch() {
        let reference = step("out", &[0.0; 10]);
        // Glitch over [1, 2), sustained excursion over [4, 8).
        let candidate = step("out", &[0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0]);
        let policy = ErrorPolicy::uniform(0.5, 2.0).with_mode(ComparisonMode::Sustained);
        let record = compare_signal(&reference, &candidate, &policy).unwrap();
        assert_eq!(record.intervals, vec![(4.0, 8.0)]);
        assert_eq!(record.metric_error, 1.0);
    }

    #[test]
    fn test_sustained_open_at_end() {
        let reference = step("out", &[0.0; 6]);
        let candidate = step("out", &[0.0, 0.0, 1.0, 1.0, 1.0, 1.0]);
        let policy = ErrorPolicy::uniform(0.5, 1.0).with_mode(ComparisonMode::Sustained);
        let record = compare_signal(&reference, &candidate, &policy).unwrap();
        assert_eq!(record.intervals, vec![(2.0, 5.0)]);
    }

    #[test]
    fn test_sustained_span_per_regime() {
        // High rail over [0, 8), low rail over [8, 16).
        let mut levels = vec![1.2; 8];
        levels.extend([0.0; 8]);
        let reference = step("out", &levels);
        // Equal excursions of length 3: [1, 4) on the high rail, [9, 12) on the low one.
        let mut shifted = levels.clone();
        for t in [1, 2, 3] {
            shifted[t] = 0.2;
        }
        for t in [9, 10, 11] {
            shifted[t] = 1.0;
        }
        let candidate = step("out", &shifted);
        let policy = |high_span: f64, low_span: f64| {
            ErrorPolicy::uniform(0.5, 10.0)
                .with_mode(ComparisonMode::Sustained)
                .with_thresholds(0.1, 1.0)
                .with_high(Tolerance::new(0.5, high_span))
                .with_low(Tolerance::new(0.5, low_span))
        };

        let record = compare_signal(&reference, &candidate, &policy(5.0, 1.0)).unwrap();
        assert_eq!(record.intervals, vec![(9.0, 12.0)]);

        let record = compare_signal(&reference, &candidate, &policy(1.0, 5.0)).unwrap();
        assert_eq!(record.intervals, vec![(1.0, 4.0)]);
    }

    #[test]
    fn test_exempt_sample_closes_sustained_excursion() {
        let reference = step("out", &[0.5, 0.5, 0.5, 0.5, 0.0, 0.5, 0.5, 0.5]);
        let candidate = step("out", &[0.5, 1.5, 1.5, 1.5, 1.5, 1.5, 1.5, 0.5]);
        let policy = ErrorPolicy::uniform(0.5, 2.0)
            .with_mode(ComparisonMode::Sustained)
            .with_thresholds(0.1, 1.0);

        let record = compare_signal(&reference, &candidate, &policy).unwrap();
        assert_eq!(record.intervals, vec![(1.0, 7.0)]);

        // The exempt low-rail sample at t = 4 ends the excursion; the
        // remainder over [5, 7) does not outlast the span.
        let record =
            compare_signal(&reference, &candidate, &policy.clone().ignoring_rails(false, true))
                .unwrap();
        assert_eq!(record.intervals, vec![(1.0, 4.0)]);

        // The window end closes it at the last classified sample.
        let record =
            compare_signal(&reference, &candidate, &policy.with_window(0.0, 5.0)).unwrap();
        assert_eq!(record.intervals, vec![(1.0, 5.0)]);
    }

    #[test]
    fn test_regimes_and_exemptions() {
        let reference = step("out", &[1.2, 1.2, 0.6, 0.0, 0.0]);
        let candidate = step("out", &[1.0, 1.2, 0.6, 0.15, 0.0]);
        let policy = ErrorPolicy::uniform(0.1, 0.0)
            .with_thresholds(0.1, 1.0)
            .with_high(Tolerance::new(0.3, 0.0));

        // High regime tolerates 0.2; the low regime flags 0.15.
        let record = compare_signal(&reference, &candidate, &policy).unwrap();
        assert_eq!(record.intervals, vec![(3.0, 3.0)]);

        // Exempting the low rail removes it from the metric but not the
        // global error.
        let record =
            compare_signal(&reference, &candidate, &policy.ignoring_rails(false, true)).unwrap();
        assert!(record.intervals.is_empty());
        assert!((record.metric_error - 0.2).abs() < 1e-12);
        assert!((record.global_error - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_window() {
        let reference = step("out", &[0.0; 6]);
        let candidate = step("out", &[1.0, 0.0, 0.0, 0.0, 0.0, 2.0]);
        let policy = ErrorPolicy::uniform(0.5, 0.0).with_window(1.0, 4.0);
        let record = compare_signal(&reference, &candidate, &policy).unwrap();
        assert!(record.intervals.is_empty());
        assert_eq!(record.metric_error, 0.0);
        assert_eq!(record.global_error, 2.0);
    }

    #[test]
    fn test_truncated_candidate() {
        let reference = step("out", &[0.0; 10]);
        let candidate = step("out", &[0.0; 4]);
        let err = compare_signal(&reference, &candidate, &ErrorPolicy::default()).unwrap_err();
        assert!(matches!(err, critsim_core::Error::TimeBaseMismatch { .. }));
    }

    #[test]
    fn test_compare_signals_and_report() {
        let golden = GoldenReference::new(vec![step("a", &[0.0, 1.0]), step("b", &[0.0, 1.0])]);
        let candidates = vec![step("a", &[0.0, 1.0]), step("b", &[0.0, 0.0])];
        let tracked = vec![
            TrackedSignal::new("a", ErrorPolicy::uniform(0.1, 0.0)),
            TrackedSignal::new("b", ErrorPolicy::uniform(0.1, 0.0)),
            TrackedSignal::passive("clk"),
        ];

        let records = compare_signals(&golden, &candidates, &tracked).unwrap();
        assert_eq!(records.len(), 2);
        assert!(!records[0].has_divergence());
        assert!(records[1].has_divergence());

        let report = compare_report(&golden, &candidates, &tracked);
        assert!(!report.passed);
        assert_eq!(report.summary.failed_signals, 1);
        assert!(report.to_text().contains("b: FAIL"));
    }
}
