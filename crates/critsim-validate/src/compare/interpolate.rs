//! Time alignment of irregularly sampled signals.

use critsim_core::{Error, Result, Signal};

/// Relative tolerance under which two timestamps are the same instant.
const SAME_INSTANT: f64 = 1e-12;

/// Relative tolerance of the time-base pre-check.
const TIME_BASE_TOLERANCE: f64 = 1e-3;

/// Linear interpolation of `(x1, y1)`-`(x2, y2)` at `a`.
///
/// Fails when `x2 <= x1` or `a` lies outside `[x1, x2]`.
pub fn interpolate(x1: f64, x2: f64, y1: f64, y2: f64, a: f64) -> Result<f64> {
    if x2 <= x1 || a < x1 || a > x2 {
        return Err(Error::Interpolation { x1, x2, target: a });
    }
    Ok(y1 + (a - x1) * (y2 - y1) / (x2 - x1))
}

/// One aligned pair of values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignedSample {
    pub time: f64,
    pub reference: f64,
    pub candidate: f64,
}

impl AlignedSample {
    pub fn deviation(&self) -> f64 {
        self.candidate - self.reference
    }
}

/// Check that both signals cover the same time span.
pub fn check_time_base(reference: &Signal, candidate: &Signal) -> Result<()> {
    let mismatch = || Error::TimeBaseMismatch {
        signal: candidate.name.clone(),
        ref_start: reference.first_time().unwrap_or(f64::NAN),
        ref_end: reference.last_time().unwrap_or(f64::NAN),
        cand_start: candidate.first_time().unwrap_or(f64::NAN),
        cand_end: candidate.last_time().unwrap_or(f64::NAN),
    };

    let (Some(r0), Some(r1), Some(c0), Some(c1)) = (
        reference.first_time(),
        reference.last_time(),
        candidate.first_time(),
        candidate.last_time(),
    ) else {
        return Err(mismatch());
    };

    let tolerance = TIME_BASE_TOLERANCE * r1.abs();
    if (r0 - c0).abs() > tolerance || (r1 - c1).abs() > tolerance {
        return Err(mismatch());
    }
    Ok(())
}

fn same_instant(a: f64, b: f64) -> bool {
    a == b || (a - b).abs() <= SAME_INSTANT * a.abs().max(b.abs())
}

/// Merge the two time axes, interpolating whichever signal has no sample at
/// a given instant.
///
/// Samples of one signal lying before the other's first sample (or after its
/// last) are skipped.
pub fn align(reference: &Signal, candidate: &Signal) -> Result<Vec<AlignedSample>> {
    let (rt, rv) = (&reference.times, &reference.values);
    let (ct, cv) = (&candidate.times, &candidate.values);
    let mut out = Vec::with_capacity(rt.len().max(ct.len()));

    let (mut i, mut j) = (0, 0);
    while i < rt.len() && j < ct.len() {
        let (tr, tc) = (rt[i], ct[j]);
        if same_instant(tr, tc) {
            out.push(AlignedSample {
                time: tr,
                reference: rv[i],
                candidate: cv[j],
            });
            i += 1;
            j += 1;
        } else if tr < tc {
            if j > 0 {
                let c = interpolate(ct[j - 1], tc, cv[j - 1], cv[j], tr)?;
                out.push(AlignedSample {
                    time: tr,
                    reference: rv[i],
                    candidate: c,
                });
            }
            i += 1;
        } else {
            if i > 0 {
                let r = interpolate(rt[i - 1], tr, rv[i - 1], rv[i], tc)?;
                out.push(AlignedSample {
                    time: tc,
                    reference: r,
                    candidate: cv[j],
                });
            }
            j += 1;
        }
    }
    Ok(out)
}
