pub mod histogram;

pub use histogram::{Distribution, Histogram, SummaryStats};

use crate::domain::Point3;

fn kahan_add(sum: &mut f64, correction: &mut f64, value: f64) {
    let corrected = value - *correction;
    let next = *sum + corrected;
    *correction = (next - *sum) - corrected;
    *sum = next;
}

pub fn stable_sum(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut correction = 0.0;

    for &value in values {
        kahan_add(&mut sum, &mut correction, value);
    }

    sum
}

pub fn squared_distance3(lhs: Point3, rhs: Point3) -> f64 {
    let dx = lhs[0] - rhs[0];
    let dy = lhs[1] - rhs[1];
    let dz = lhs[2] - rhs[2];
    dx * dx + dy * dy + dz * dz
}

pub fn magnitude3(vector: [f64; 3]) -> f64 {
    squared_distance3(vector, [0.0; 3]).sqrt()
}

/// Signed per-axis offset `lhs - rhs`.
pub fn offset3(lhs: Point3, rhs: Point3) -> [f64; 3] {
    [lhs[0] - rhs[0], lhs[1] - rhs[1], lhs[2] - rhs[2]]
}

/// Number of samples in the half-open range `[start, stop)` taken every `step`.
///
/// Matches the element count of numpy's `arange`, including its behaviour for
/// ranges that are not an integer multiple of `step`. Returns `None` when the
/// inputs are not finite or `step` is not strictly positive. Counts too large
/// for `usize` saturate at `usize::MAX`; callers bound them before allocating.
pub fn arange_count(start: f64, stop: f64, step: f64) -> Option<usize> {
    if !start.is_finite() || !stop.is_finite() || !step.is_finite() || step <= 0.0 {
        return None;
    }

    let span = ((stop - start) / step).ceil();
    if span <= 0.0 {
        return Some(0);
    }
    Some(span as usize)
}
