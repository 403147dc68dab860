//! Project profiles
//!
//! A profile names the ordered test stages of a production line, the units
//! that must be ignored, and how its environment metrics are composed.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::error::{Result, StageTimeError};
use crate::core::types::timestamp;

/// Name of the metric derived from the other metrics of a profile.
pub const TOTAL_METRIC: &str = "Total";

const TEST_START: &str = "test_start";

/// An instant on a unit's timeline: its test start or a stage pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimePoint {
    TestStart,
    Stage(String),
}

impl TryFrom<String> for TimePoint {
    type Error = String;

    fn try_from(raw: String) -> std::result::Result<Self, Self::Error> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("time point cannot be empty".to_string());
        }
        if trimmed.eq_ignore_ascii_case(TEST_START) {
            Ok(TimePoint::TestStart)
        } else {
            Ok(TimePoint::Stage(trimmed.to_string()))
        }
    }
}

impl From<TimePoint> for String {
    fn from(point: TimePoint) -> Self {
        match point {
            TimePoint::TestStart => TEST_START.to_string(),
            TimePoint::Stage(code) => code,
        }
    }
}

impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimePoint::TestStart => write!(f, "{TEST_START}"),
            TimePoint::Stage(code) => write!(f, "{code}"),
        }
    }
}

/// How a named environment metric is composed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum EnvironmentMetricDefinition {
    /// Hours between two instants. Units missing either instant are skipped.
    Delta {
        start: TimePoint,
        end: TimePoint,
        #[serde(default)]
        discard_negative: bool,
    },
    /// Sum of per-stage durations, kept only when strictly positive.
    Sum { stages: Vec<String> },
}

impl EnvironmentMetricDefinition {
    pub fn mode(&self) -> MetricMode {
        match self {
            EnvironmentMetricDefinition::Delta { .. } => MetricMode::Delta,
            EnvironmentMetricDefinition::Sum { .. } => MetricMode::Sum,
        }
    }

    /// Stage codes this definition reads.
    pub fn stage_codes(&self) -> Vec<&str> {
        match self {
            EnvironmentMetricDefinition::Delta { start, end, .. } => [start, end]
                .into_iter()
                .filter_map(|point| match point {
                    TimePoint::Stage(code) => Some(code.as_str()),
                    TimePoint::TestStart => None,
                })
                .collect(),
            EnvironmentMetricDefinition::Sum { stages } => {
                stages.iter().map(String::as_str).collect()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricMode {
    Delta,
    Sum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentMetric {
    pub name: String,
    #[serde(flatten)]
    pub definition: EnvironmentMetricDefinition,
}

impl EnvironmentMetric {
    pub fn delta(name: &str, start: TimePoint, end: TimePoint, discard_negative: bool) -> Self {
        Self {
            name: name.to_string(),
            definition: EnvironmentMetricDefinition::Delta {
                start,
                end,
                discard_negative,
            },
        }
    }

    pub fn sum(name: &str, stages: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            definition: EnvironmentMetricDefinition::Sum {
                stages: stages.iter().map(|code| code.to_string()).collect(),
            },
        }
    }
}

/// Units in `bay` count only when their test started at or after `not_before`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayCutoff {
    pub bay: String,
    #[serde(with = "timestamp")]
    pub not_before: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectProfile {
    pub name: String,
    /// Display and grouping order of the stages
    pub stages: Vec<String>,
    /// Stage whose pass date keys the day grouping
    pub reference_stage: String,
    /// Units dropped on load
    #[serde(default)]
    pub excluded_units: Vec<String>,
    /// Units kept for stage statistics but left out of environment metrics
    #[serde(default)]
    pub metric_excluded_units: Vec<String>,
    #[serde(default)]
    pub bay_cutoffs: Vec<BayCutoff>,
    #[serde(default)]
    pub environment_metrics: Vec<EnvironmentMetric>,
}

impl ProjectProfile {
    /// The L10 line: stage-pair deltas.
    pub fn l10() -> Self {
        let stage = |code: &str| TimePoint::Stage(code.to_string());
        Self {
            name: "L10".to_string(),
            stages: codes(&[
                "TN", "TO", "TP", "N1", "N2", "QN", "RS", "MG", "MD", "M1", "MW", "SU", "BS",
            ]),
            reference_stage: "RS".to_string(),
            excluded_units: codes(&[
                "P123955120005012",
                "P658660471634012",
                "P658660470005012",
            ]),
            metric_excluded_units: codes(&[
                "P675460431063012",
                "P658660641055012",
                "P658660640914012",
                "P658660641168012",
                "P658660641165012",
                "P658660640918012",
            ]),
            bay_cutoffs: vec![
                cutoff("BAY_11", (2026, 2, 5), (15, 0, 0)),
                cutoff("BAY_12", (2026, 2, 6), (16, 0, 0)),
                cutoff("BAY_13", (2026, 2, 6), (16, 0, 0)),
            ],
            environment_metrics: vec![
                EnvironmentMetric::delta("PRETEST", TimePoint::TestStart, stage("RS"), false),
                EnvironmentMetric::delta("MDaaS", stage("RS"), stage("SU"), true),
                EnvironmentMetric::delta("BSL", stage("SU"), stage("BS"), true),
            ],
        }
    }

    /// The L11 line: summed stage durations.
    pub fn l11() -> Self {
        Self {
            name: "L11".to_string(),
            stages: codes(&[
                "WT", "PT", "YC", "WL", "MG", "MD", "M1", "MW", "SU", "WB", "BO",
            ]),
            reference_stage: "WL".to_string(),
            excluded_units: Vec::new(),
            metric_excluded_units: Vec::new(),
            bay_cutoffs: Vec::new(),
            environment_metrics: vec![
                EnvironmentMetric::sum("L11 PoT", &["WT", "PT", "YC"]),
                EnvironmentMetric::sum("MDaaS", &["WL", "MG", "MD", "M1", "MW", "SU"]),
                EnvironmentMetric::sum("BSL", &["WB", "BO"]),
            ],
        }
    }

    pub fn has_stage(&self, code: &str) -> bool {
        self.stages.iter().any(|stage| stage == code)
    }

    pub fn is_excluded(&self, usn: &str) -> bool {
        self.excluded_units.iter().any(|excluded| excluded == usn)
    }

    pub fn is_metric_excluded(&self, usn: &str) -> bool {
        self.is_excluded(usn) || self.metric_excluded_units.iter().any(|excluded| excluded == usn)
    }

    pub fn bay_cutoff(&self, bay: &str) -> Option<&BayCutoff> {
        self.bay_cutoffs.iter().find(|cutoff| cutoff.bay == bay)
    }

    /// Composition mode shared by every metric, `None` without metrics.
    pub fn metric_mode(&self) -> Option<MetricMode> {
        self.environment_metrics
            .first()
            .map(|metric| metric.definition.mode())
    }

    /// The derived whole-process metric.
    ///
    /// Delta profiles span from the first metric's start to the last
    /// metric's end and keep negative results. Sum profiles add up every
    /// stage used by any metric.
    pub fn total_metric(&self) -> Option<EnvironmentMetric> {
        let first = self.environment_metrics.first()?;
        let last = self.environment_metrics.last()?;

        let definition = match (&first.definition, &last.definition) {
            (
                EnvironmentMetricDefinition::Delta { start, .. },
                EnvironmentMetricDefinition::Delta { end, .. },
            ) => EnvironmentMetricDefinition::Delta {
                start: start.clone(),
                end: end.clone(),
                discard_negative: false,
            },
            _ => {
                let mut stages: Vec<String> = Vec::new();
                for metric in &self.environment_metrics {
                    for code in metric.definition.stage_codes() {
                        if !stages.iter().any(|seen| seen == code) {
                            stages.push(code.to_string());
                        }
                    }
                }
                EnvironmentMetricDefinition::Sum { stages }
            }
        };

        Some(EnvironmentMetric {
            name: TOTAL_METRIC.to_string(),
            definition,
        })
    }

    /// Configured metrics followed by the derived total.
    pub fn metrics_with_total(&self) -> Vec<EnvironmentMetric> {
        let mut metrics = self.environment_metrics.clone();
        metrics.extend(self.total_metric());
        metrics
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(StageTimeError::Config(format!("Profile '{}': {msg}", self.name)));

        if self.name.trim().is_empty() {
            return Err(StageTimeError::Config(
                "Profile name cannot be empty".to_string(),
            ));
        }
        if self.stages.is_empty() {
            return invalid("stage list cannot be empty".to_string());
        }
        for (index, code) in self.stages.iter().enumerate() {
            if code.trim().is_empty() {
                return invalid("stage codes cannot be empty".to_string());
            }
            if self.stages[..index].contains(code) {
                return invalid(format!("stage '{code}' is listed more than once"));
            }
        }
        if !self.has_stage(&self.reference_stage) {
            return invalid(format!(
                "reference stage '{}' is not in the stage list",
                self.reference_stage
            ));
        }

        for cutoff in &self.bay_cutoffs {
            if cutoff.not_before.is_none() {
                return invalid(format!(
                    "cutoff for bay '{}' needs a 'YYYY-MM-DD HH:MM:SS' timestamp",
                    cutoff.bay
                ));
            }
        }

        let mode = self.metric_mode();
        for (index, metric) in self.environment_metrics.iter().enumerate() {
            if metric.name.trim().is_empty() || metric.name == TOTAL_METRIC {
                return invalid(format!("invalid metric name '{}'", metric.name));
            }
            if self.environment_metrics[..index]
                .iter()
                .any(|other| other.name == metric.name)
            {
                return invalid(format!("metric '{}' is defined more than once", metric.name));
            }
            if Some(metric.definition.mode()) != mode {
                return invalid(format!(
                    "metric '{}' mixes delta and sum composition",
                    metric.name
                ));
            }
            if let EnvironmentMetricDefinition::Sum { stages } = &metric.definition
                && stages.is_empty()
            {
                return invalid(format!("sum metric '{}' lists no stages", metric.name));
            }
            for code in metric.definition.stage_codes() {
                if !self.has_stage(code) {
                    return invalid(format!(
                        "metric '{}' uses unknown stage '{code}'",
                        metric.name
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Built-in profiles, in display order.
pub fn builtin_profiles() -> Vec<ProjectProfile> {
    vec![ProjectProfile::l10(), ProjectProfile::l11()]
}

/// Look up a profile by name, preferring configured ones over built-ins.
pub fn resolve_profile(name: &str, configured: &[ProjectProfile]) -> Result<ProjectProfile> {
    let wanted = name.trim();
    configured
        .iter()
        .cloned()
        .chain(builtin_profiles())
        .find(|profile| profile.name.eq_ignore_ascii_case(wanted))
        .ok_or_else(|| {
            let mut known: Vec<String> = configured.iter().map(|p| p.name.clone()).collect();
            for builtin in builtin_profiles() {
                if !known.iter().any(|k| k.eq_ignore_ascii_case(&builtin.name)) {
                    known.push(builtin.name);
                }
            }
            StageTimeError::InvalidRequest(format!(
                "Unknown project '{wanted}'. Expected one of: {}.",
                known.join(", ")
            ))
        })
}

fn codes(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn cutoff(bay: &str, (y, m, d): (i32, u32, u32), (h, min, s): (u32, u32, u32)) -> BayCutoff {
    BayCutoff {
        bay: bay.to_string(),
        not_before: NaiveDate::from_ymd_opt(y, m, d).and_then(|date| date.and_hms_opt(h, min, s)),
    }
}
