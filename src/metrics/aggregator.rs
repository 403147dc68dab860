use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::config::ProjectProfile;
use crate::core::constants::groups;
use crate::core::error::StageTimeError;
use crate::core::types::{StatSummary, UnitRecord};

use super::stats::compute_stats;

static BATCH_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+").expect("Failed to compile batch number pattern"));

/// Dimension units are bucketed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    None,
    Day,
    Batch,
    Bay,
}

impl FromStr for GroupBy {
    type Err = StageTimeError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" | "none" => Ok(GroupBy::None),
            "day" => Ok(GroupBy::Day),
            "batch" => Ok(GroupBy::Batch),
            "bay" => Ok(GroupBy::Bay),
            other => Err(StageTimeError::InvalidRequest(format!(
                "Unknown grouping '{other}'. Expected one of: all, day, batch, bay."
            ))),
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GroupBy::None => groups::ALL,
            GroupBy::Day => "day",
            GroupBy::Batch => "batch",
            GroupBy::Bay => "bay",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageStat {
    pub stage: String,
    pub summary: Option<StatSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
    pub key: String,
    /// Units that fell into this group
    pub units: usize,
    pub stages: Vec<StageStat>,
}

/// Per-group stage statistics.
///
/// For [`GroupBy::None`] the single `all` group omits stages without data;
/// every other grouping lists each stage and leaves the summary empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregation {
    pub group_by: GroupBy,
    pub stages: Vec<String>,
    pub groups: Vec<GroupStats>,
}

/// Groups per-unit stage durations and summarises them.
#[derive(Debug, Clone)]
pub struct StageAggregator<'a> {
    stages: &'a [String],
    reference_stage: &'a str,
    include_no_batch: bool,
}

impl<'a> StageAggregator<'a> {
    pub fn new(profile: &'a ProjectProfile) -> Self {
        Self::with_stages(&profile.stages, &profile.reference_stage)
    }

    pub fn with_stages(stages: &'a [String], reference_stage: &'a str) -> Self {
        Self {
            stages,
            reference_stage,
            include_no_batch: false,
        }
    }

    /// Put units without a batch label into the reserved `none` bucket.
    pub fn include_no_batch(mut self, include: bool) -> Self {
        self.include_no_batch = include;
        self
    }

    /// Aggregate `units` by `group_by`.
    ///
    /// `None` means no data: no group formed, or no stage of the `all`
    /// group had a valid duration.
    pub fn aggregate(&self, units: &[UnitRecord], group_by: GroupBy) -> Option<Aggregation> {
        let groups = match group_by {
            GroupBy::None => {
                let all: Vec<&UnitRecord> = units.iter().collect();
                let stages: Vec<StageStat> = self
                    .summarize(&all)
                    .into_iter()
                    .filter(|stat| stat.summary.is_some())
                    .collect();
                if stages.is_empty() {
                    return None;
                }
                vec![GroupStats {
                    key: groups::ALL.to_string(),
                    units: all.len(),
                    stages,
                }]
            }
            GroupBy::Day => self.grouped(units, |unit| self.day_key(unit), str::cmp),
            GroupBy::Batch => {
                self.grouped(units, |unit| self.batch_group(unit), compare_group_keys)
            }
            GroupBy::Bay => self.grouped(
                units,
                |unit| unit.bay_label().map(str::to_string),
                compare_group_keys,
            ),
        };

        if groups.is_empty() {
            return None;
        }

        Some(Aggregation {
            group_by,
            stages: self.stages.to_vec(),
            groups,
        })
    }

    fn grouped<K, C>(&self, units: &[UnitRecord], key_of: K, compare: C) -> Vec<GroupStats>
    where
        K: Fn(&UnitRecord) -> Option<String>,
        C: Fn(&str, &str) -> Ordering,
    {
        let mut buckets: FxHashMap<String, Vec<&UnitRecord>> = FxHashMap::default();
        for unit in units {
            if let Some(key) = key_of(unit) {
                buckets.entry(key).or_default().push(unit);
            }
        }

        let mut keys: Vec<String> = buckets.keys().cloned().collect();
        keys.sort_by(|a, b| compare(a, b));

        keys.into_iter()
            .filter_map(|key| {
                let members = buckets.remove(&key)?;
                Some(GroupStats {
                    stages: self.summarize(&members),
                    units: members.len(),
                    key,
                })
            })
            .collect()
    }

    fn summarize(&self, members: &[&UnitRecord]) -> Vec<StageStat> {
        self.stages
            .iter()
            .map(|stage| StageStat {
                stage: stage.clone(),
                summary: compute_stats(members.iter().map(|unit| unit.duration_of(stage))),
            })
            .collect()
    }

    fn day_key(&self, unit: &UnitRecord) -> Option<String> {
        unit.pass_of(self.reference_stage)
            .map(|pass| pass.date().format("%Y-%m-%d").to_string())
    }

    fn batch_group(&self, unit: &UnitRecord) -> Option<String> {
        match unit.batch_label() {
            Some(label) => Some(batch_key(label)),
            None if self.include_no_batch => Some(groups::NO_BATCH.to_string()),
            None => None,
        }
    }
}

/// Group key of a batch label: its first run of digits, or the trimmed
/// label when it has none.
pub fn batch_key(label: &str) -> String {
    let trimmed = label.trim();
    BATCH_NUMBER
        .find(trimmed)
        .map(|found| found.as_str().to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Numeric keys first, in numeric order, then the rest lexicographically.
pub fn compare_group_keys(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
