use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::reporting::logging;

use super::cache::{
    CacheStore, FailureCacheEntry, FailureProvenance, failure_rate, now_local, round2,
};
use super::prober::ProbeReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualitySource {
    Cache,
    Realtime,
}

/// Failure rate and yield for a requested set of units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub source: QualitySource,
    pub total_units: usize,
    pub failing_units: usize,
    pub failure_rate: f64,
    pub yield_first_pass: f64,
    pub failing: Vec<String>,
    /// Computation time of the cache entry that was served
    pub computed_at: Option<String>,
}

impl QualityReport {
    fn new(source: QualitySource, total_units: usize, failing: Vec<String>) -> Self {
        let rate = failure_rate(failing.len(), total_units);
        Self {
            source,
            total_units,
            failing_units: failing.len(),
            failure_rate: round2(rate),
            yield_first_pass: round2(100.0 - rate),
            failing,
            computed_at: None,
        }
    }

    /// Narrow a fresh cache entry to `usns`.
    pub fn from_cache(entry: &FailureCacheEntry, usns: &[String]) -> Self {
        let requested = distinct(usns);
        let cached: FxHashSet<&str> = entry.usns_list.iter().map(String::as_str).collect();
        let failing: Vec<String> = requested
            .iter()
            .filter(|usn| cached.contains(usn.as_str()))
            .cloned()
            .collect();

        let mut report = Self::new(QualitySource::Cache, requested.len(), failing);
        report.computed_at = entry
            .timestamp
            .map(|ts| ts.format(crate::core::types::timestamp::FORMAT).to_string());
        report
    }

    pub fn from_probe(report: &ProbeReport) -> Self {
        Self::new(
            QualitySource::Realtime,
            report.total_units,
            report.failing_usns(),
        )
    }
}

/// The cached answer for `usns`, or `None` when the cache is missing,
/// unreadable or stale and a real-time probe is needed.
pub fn cached_quality(
    store: &CacheStore,
    usns: &[String],
    ttl: chrono::Duration,
) -> Option<QualityReport> {
    let path = store.path().display().to_string();
    let entry = match store.load() {
        Ok(Some(entry)) => entry,
        Ok(None) => {
            logging::log_cache_status(&path, None, false);
            return None;
        }
        Err(e) => {
            logging::log_warning(&e.to_string());
            logging::log_cache_status(&path, None, false);
            return None;
        }
    };

    let now = now_local();
    let fresh = entry.is_fresh(now, ttl);
    logging::log_cache_status(&path, entry.age(now).map(|age| age.num_minutes()), fresh);

    fresh.then(|| QualityReport::from_cache(&entry, usns))
}

/// One failing unit and where its logs were found.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailingUnit {
    pub usn: String,
    pub provenance: Option<FailureProvenance>,
}

/// The cached failing units with the age of the entry they came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureListing {
    pub computed_at: Option<String>,
    pub age_minutes: Option<i64>,
    pub stale: bool,
    pub total_units: usize,
    pub failure_rate: f64,
    pub yield_first_pass: f64,
    pub failing: Vec<FailingUnit>,
}

impl FailureListing {
    pub fn from_entry(entry: &FailureCacheEntry, now: chrono::NaiveDateTime, ttl: chrono::Duration) -> Self {
        let failing = entry
            .usns_list
            .iter()
            .map(|usn| FailingUnit {
                usn: usn.clone(),
                provenance: entry.log_locations.get(usn).cloned(),
            })
            .collect();

        Self {
            computed_at: entry
                .timestamp
                .map(|ts| ts.format(crate::core::types::timestamp::FORMAT).to_string()),
            age_minutes: entry.age(now).map(|age| age.num_minutes()),
            stale: entry.is_stale(now, ttl),
            total_units: entry.total_usns,
            failure_rate: entry.failure_rate,
            yield_first_pass: entry.yield_first_pass,
            failing,
        }
    }
}

fn distinct(usns: &[String]) -> Vec<String> {
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    usns.iter()
        .filter(|usn| seen.insert(usn.as_str()))
        .cloned()
        .collect()
}
