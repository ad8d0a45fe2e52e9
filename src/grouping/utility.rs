//! Numeric primitives for the grouping pass: RT interval overlap and
//! resampled Pearson correlation.

use thiserror::Error;

use crate::grouping::curve::Curve;

/// Invalid input to the correlation primitive. Degenerate-but-valid input
/// (no overlap, zero variance) is not an error; it yields NaN.
#[derive(Debug, Error)]
pub enum CorrelationError {
    #[error("non-finite intensity sample in curve {0}")]
    NonFiniteSample(usize),
    #[error("resampling rate must be positive, got {0}")]
    InvalidRate(f32),
}

/// True if two closed RT intervals overlap at all.
#[inline]
pub fn spans_overlap(a: (f32, f32), b: (f32, f32)) -> bool {
    a.1 >= b.0 && b.1 >= a.0
}

/// Overlap fraction of `candidate` against `precursor`.
///
/// Four mutually exclusive cases; the partial cases are normalized by the
/// precursor's own span length, full containment in either direction counts
/// as complete overlap. 0 when the spans are disjoint or the precursor span
/// is degenerate.
pub fn rt_overlap_fraction(precursor: (f32, f32), candidate: (f32, f32)) -> f32 {
    let (p0, p1) = precursor;
    let (c0, c1) = candidate;
    let len = p1 - p0;
    if len <= 0.0 {
        return 0.0;
    }
    // candidate covers the precursor entirely
    if c0 <= p0 && c1 >= p1 {
        return 1.0;
    }
    // candidate entirely inside the precursor
    if c0 >= p0 && c1 <= p1 {
        return 1.0;
    }
    // left-partial: candidate starts before the precursor, ends inside it
    if c0 < p0 && c1 >= p0 && c1 < p1 {
        return (c1 - p0) / len;
    }
    // right-partial: candidate starts inside the precursor, ends after it
    if c0 > p0 && c0 <= p1 && c1 > p1 {
        return (p1 - c0) / len;
    }
    0.0
}

/// Pearson correlation of two equal-length series. NaN when either side
/// has zero variance or the series are shorter than two points.
pub fn pearson(x: &[f32], y: &[f32]) -> f32 {
    debug_assert_eq!(x.len(), y.len());
    let n = x.len();
    if n < 2 {
        return f32::NAN;
    }
    let nf = n as f64;
    let mut sx = 0.0f64;
    let mut sy = 0.0f64;
    for i in 0..n {
        sx += x[i] as f64;
        sy += y[i] as f64;
    }
    let mx = sx / nf;
    let my = sy / nf;
    let mut cov = 0.0f64;
    let mut vx = 0.0f64;
    let mut vy = 0.0f64;
    for i in 0..n {
        let dx = x[i] as f64 - mx;
        let dy = y[i] as f64 - my;
        cov += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }
    let denom = (vx * vy).sqrt();
    if denom <= 0.0 {
        return f32::NAN;
    }
    (cov / denom) as f32
}

/// Pearson correlation of two curves resampled at `points_per_minute` over
/// their overlapping RT range.
///
/// Returns NaN on degenerate input (no overlap, too few grid points, zero
/// variance); errors only when a curve carries non-finite samples or the
/// rate is not positive.
pub fn resampled_pearson(
    a: &Curve,
    b: &Curve,
    points_per_minute: f32,
) -> Result<f32, CorrelationError> {
    if !(points_per_minute > 0.0) {
        return Err(CorrelationError::InvalidRate(points_per_minute));
    }
    let lo = a.rt_start.max(b.rt_start);
    let hi = a.rt_end.min(b.rt_end);
    if !(hi > lo) {
        return Ok(f32::NAN);
    }
    let n = (((hi - lo) * points_per_minute).ceil() as usize).saturating_add(1);
    if n < 3 {
        return Ok(f32::NAN);
    }
    let step = (hi - lo) / (n - 1) as f32;
    let mut xs = Vec::with_capacity(n);
    let mut ys = Vec::with_capacity(n);
    for k in 0..n {
        let t = lo + step * k as f32;
        let x = a.intensity_at(t);
        if !x.is_finite() {
            return Err(CorrelationError::NonFiniteSample(a.index));
        }
        let y = b.intensity_at(t);
        if !y.is_finite() {
            return Err(CorrelationError::NonFiniteSample(b.index));
        }
        xs.push(x);
        ys.push(y);
    }
    Ok(pearson(&xs, &ys))
}
