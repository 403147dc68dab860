use serde::Serialize;

use crate::config::{EnvironmentMetricDefinition, ProjectProfile, TimePoint};
use crate::core::constants::stats::MS_PER_HOUR;
use crate::core::types::{StatSummary, UnitRecord};

use super::stats::compute_stats_from_hours;

/// Hours collected for one named metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    pub name: String,
    pub hours: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentStat {
    pub name: String,
    pub summary: Option<StatSummary>,
}

/// Collect per-unit hours for every metric of `profile`, the derived total
/// last. Units on the profile's exclusion lists contribute nothing.
pub fn compute_environment_metrics(units: &[UnitRecord], profile: &ProjectProfile) -> Vec<MetricSample> {
    let eligible: Vec<&UnitRecord> = units
        .iter()
        .filter(|unit| !profile.is_metric_excluded(&unit.usn))
        .collect();

    profile
        .metrics_with_total()
        .into_iter()
        .map(|metric| MetricSample {
            hours: eligible
                .iter()
                .filter_map(|unit| metric_hours(unit, &metric.definition))
                .collect(),
            name: metric.name,
        })
        .collect()
}

/// Summarise every metric sample, keeping metrics without data.
pub fn summarize_environment(samples: &[MetricSample]) -> Vec<EnvironmentStat> {
    samples
        .iter()
        .map(|sample| EnvironmentStat {
            name: sample.name.clone(),
            summary: compute_stats_from_hours(&sample.hours),
        })
        .collect()
}

/// One unit's value for a metric, `None` when the unit does not qualify.
pub fn metric_hours(unit: &UnitRecord, definition: &EnvironmentMetricDefinition) -> Option<f64> {
    match definition {
        EnvironmentMetricDefinition::Delta {
            start,
            end,
            discard_negative,
        } => {
            let from = instant(unit, start)?;
            let to = instant(unit, end)?;
            let hours = (to - from).num_milliseconds() as f64 / MS_PER_HOUR;
            if *discard_negative && hours < 0.0 {
                None
            } else {
                Some(hours)
            }
        }
        EnvironmentMetricDefinition::Sum { stages } => {
            let total: f64 = stages
                .iter()
                .map(|code| unit.duration_of(code).unwrap_or(0.0))
                .sum();
            (total > 0.0).then_some(total)
        }
    }
}

fn instant(unit: &UnitRecord, point: &TimePoint) -> Option<chrono::NaiveDateTime> {
    match point {
        TimePoint::TestStart => unit.test_start_time,
        TimePoint::Stage(code) => unit.pass_of(code),
    }
}
