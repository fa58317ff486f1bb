//! Fixed-width binning and summary statistics for data-quality reports.

use super::stable_sum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummaryStats {
    pub count: usize,
    pub mean: f64,
    /// Population standard deviation around `mean`.
    pub rms: f64,
    pub min: f64,
    pub max: f64,
}

impl SummaryStats {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let count = values.len();
        let mean = stable_sum(values) / count as f64;
        let squared_deviations: Vec<f64> = values
            .iter()
            .map(|value| (value - mean) * (value - mean))
            .collect();
        let rms = (stable_sum(&squared_deviations) / count as f64).sqrt();
        let (min, max) = min_max(values)?;

        Some(Self {
            count,
            mean,
            rms,
            min,
            max,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub edges: Vec<f64>,
    pub counts: Vec<u64>,
    /// Values outside `[edges[0], edges[bins]]` or not finite.
    pub skipped: u64,
}

impl Histogram {
    /// Bins `values` into `bins` equal-width bins over `range`, or over the
    /// finite min/max of the data when `range` is `None`.
    ///
    /// Every bin is half-open except the last, which also includes its upper
    /// edge. A zero-width range is widened to `[lo - 0.5, hi + 0.5]`.
    pub fn from_values(values: &[f64], bins: usize, range: Option<(f64, f64)>) -> Option<Self> {
        if bins == 0 {
            return None;
        }

        let (mut lo, mut hi) = match range {
            Some(bounds) => bounds,
            None => {
                let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
                min_max(&finite)?
            }
        };
        if !lo.is_finite() || !hi.is_finite() || hi < lo {
            return None;
        }
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }

        let width = (hi - lo) / bins as f64;
        let edges = (0..=bins)
            .map(|index| {
                if index == bins {
                    hi
                } else {
                    lo + width * index as f64
                }
            })
            .collect::<Vec<_>>();

        let mut counts = vec![0_u64; bins];
        let mut skipped = 0_u64;
        for &value in values {
            if !value.is_finite() || value < lo || value > hi {
                skipped += 1;
                continue;
            }
            let slot = (((value - lo) / (hi - lo)) * bins as f64).floor() as usize;
            counts[slot.min(bins - 1)] += 1;
        }

        Some(Self {
            edges,
            counts,
            skipped,
        })
    }

    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// Summary statistics and histogram of one sample, as written to reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub stats: Option<SummaryStats>,
    pub histogram: Option<Histogram>,
}

impl Distribution {
    pub fn from_values(values: &[f64], bins: usize, range: Option<(f64, f64)>) -> Self {
        Self {
            stats: SummaryStats::from_values(values),
            histogram: Histogram::from_values(values, bins, range),
        }
    }
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    Some(
        values
            .iter()
            .fold((first, first), |(lo, hi), &value| (lo.min(value), hi.max(value))),
    )
}
