use crate::core::constants::stats::{P50, P90};
use crate::core::types::StatSummary;

/// Summarise a sample of hours.
///
/// Absent, NaN and negative entries are dropped first. Returns `None` when
/// nothing is left, so "no data" never reads as zero.
pub fn compute_stats<I>(values: I) -> Option<StatSummary>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut sample: Vec<f64> = values
        .into_iter()
        .flatten()
        .filter(|value| value.is_finite() && *value >= 0.0)
        .collect();

    if sample.is_empty() {
        return None;
    }

    sample.sort_by(f64::total_cmp);

    let count = sample.len();
    let avg = sample.iter().sum::<f64>() / count as f64;

    Some(StatSummary {
        avg,
        p50: percentile(&sample, P50),
        p90: percentile(&sample, P90),
        min: sample[0],
        max: sample[count - 1],
        count,
    })
}

/// Convenience wrapper for samples without absent entries.
pub fn compute_stats_from_hours(values: &[f64]) -> Option<StatSummary> {
    compute_stats(values.iter().copied().map(Some))
}

/// Value at index `floor(n * p)` of an ascending sample.
///
/// Nearest rank without interpolation; the index is clamped so `p == 1.0`
/// still lands on the maximum.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let index = ((sorted.len() as f64) * p).floor() as usize;
    sorted[index.min(sorted.len() - 1)]
}
