//! Persisted failure summary
//!
//! One global entry, overwritten by every refresh. Refreshes are serialised
//! through a lock file created next to the cache file.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::core::constants::cache::{LOCK_SUFFIX, STALE_LOCK_MINUTES};
use crate::core::error::{Result, StageTimeError};
use crate::core::types::timestamp;

/// Where a failing unit's logs were found and what they contained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureProvenance {
    pub tps_ip: String,
    pub log_url: String,
    pub history_url: String,
    #[serde(default)]
    pub remark: String,
    #[serde(default)]
    pub oa_ip: String,
    pub total_tests: usize,
    pub failures_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureCacheEntry {
    /// Local time of computation; unreadable values make the entry stale
    #[serde(with = "timestamp")]
    pub timestamp: Option<NaiveDateTime>,
    pub total_usns: usize,
    /// Units with at least one failed test record
    pub usns_with_logs: usize,
    pub failure_rate: f64,
    pub yield_first_pass: f64,
    pub usns_list: Vec<String>,
    #[serde(default)]
    pub log_locations: BTreeMap<String, FailureProvenance>,
    #[serde(default)]
    pub calculation_time_seconds: f64,
}

impl FailureCacheEntry {
    pub fn age(&self, now: NaiveDateTime) -> Option<chrono::Duration> {
        self.timestamp.map(|computed| now - computed)
    }

    /// An entry is stale once it is `ttl` old, or when its age is unknown.
    pub fn is_stale(&self, now: NaiveDateTime, ttl: chrono::Duration) -> bool {
        self.age(now).is_none_or(|age| age >= ttl)
    }

    pub fn is_fresh(&self, now: NaiveDateTime, ttl: chrono::Duration) -> bool {
        !self.is_stale(now, ttl)
    }
}

/// Failure rate in percent over `total` units; zero units give zero.
pub fn failure_rate(failing: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        failing as f64 / total as f64 * 100.0
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Reads and writes the single cache entry.
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(LOCK_SUFFIX);
        PathBuf::from(name)
    }

    /// The stored entry, `None` when nothing was cached yet.
    pub fn load(&self) -> Result<Option<FailureCacheEntry>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StageTimeError::Cache(format!(
                    "Could not read cache file '{}': {e}",
                    self.path.display()
                )));
            }
        };

        serde_json::from_str(&content).map(Some).map_err(|e| {
            StageTimeError::Cache(format!(
                "Cache file '{}' is not a valid failure summary: {e}",
                self.path.display()
            ))
        })
    }

    pub fn save(&self, entry: &FailureCacheEntry) -> Result<()> {
        let json = serde_json::to_string_pretty(entry)?;
        fs::write(&self.path, json).map_err(|e| {
            StageTimeError::Cache(format!(
                "Failed to write cache file '{}': {e}",
                self.path.display()
            ))
        })
    }

    /// Take the refresh lock, reclaiming one abandoned for too long.
    pub fn acquire_lock(&self) -> Result<RunLock> {
        let lock_path = self.lock_path();
        match RunLock::create(&lock_path) {
            Ok(lock) => Ok(lock),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if lock_is_abandoned(&lock_path) {
                    log::warn!("Reclaiming abandoned lock file {}", lock_path.display());
                    fs::remove_file(&lock_path)?;
                    RunLock::create(&lock_path).map_err(|_| StageTimeError::ProbeInProgress(lock_path))
                } else {
                    Err(StageTimeError::ProbeInProgress(lock_path))
                }
            }
            Err(e) => Err(StageTimeError::Cache(format!(
                "Could not create lock file '{}': {e}",
                lock_path.display()
            ))),
        }
    }
}

/// Held while a refresh runs; the lock file is removed on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    fn create(path: &Path) -> std::io::Result<Self> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        writeln!(file, "{}", now_local().format(timestamp::FORMAT))?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("Could not remove lock file {}: {e}", self.path.display());
        }
    }
}

fn lock_is_abandoned(path: &Path) -> bool {
    let written = fs::read_to_string(path)
        .ok()
        .and_then(|content| timestamp::parse(&content));
    match written {
        Some(at) => now_local() - at >= chrono::Duration::minutes(STALE_LOCK_MINUTES),
        // An unreadable lock cannot be aged; fall back to the file time
        None => fs::metadata(path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|elapsed| elapsed.as_secs() >= (STALE_LOCK_MINUTES as u64) * 60),
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    fn entry(computed: &str) -> FailureCacheEntry {
        let mut log_locations = BTreeMap::new();
        log_locations.insert(
            "U2".to_string(),
            FailureProvenance {
                tps_ip: "10.0.0.1".to_string(),
                log_url: "http://10.0.0.1:9862/opt/share/logs/U2/".to_string(),
                history_url: "http://10.0.0.1:9862/opt/share/logs/U2/U2_history.log".to_string(),
                remark: "Line A".to_string(),
                oa_ip: String::new(),
                total_tests: 5,
                failures_count: 2,
            },
        );
        FailureCacheEntry {
            timestamp: timestamp::parse(computed),
            total_usns: 4,
            usns_with_logs: 1,
            failure_rate: 25.0,
            yield_first_pass: 75.0,
            usns_list: vec!["U2".to_string()],
            log_locations,
            calculation_time_seconds: 1.25,
        }
    }

    #[test]
    fn test_failure_rate() {
        assert_eq!(failure_rate(0, 0), 0.0);
        assert_eq!(failure_rate(1, 4), 25.0);
        assert_eq!(round2(failure_rate(1, 3)), 33.33);
        assert_eq!(round2(100.0 - failure_rate(1, 3)), 66.67);
    }

    #[test]
    fn test_staleness() {
        let cached = entry("2026-02-02 10:00:00");
        let ttl = chrono::Duration::minutes(30);

        let at = |raw: &str| timestamp::parse(raw).unwrap();
        assert!(cached.is_fresh(at("2026-02-02 10:29:59"), ttl));
        assert!(cached.is_stale(at("2026-02-02 10:30:00"), ttl));
        assert!(cached.is_stale(at("2026-02-02 12:00:00"), ttl));
    }

    #[test]
    fn test_staleness__when_timestamp_unreadable() {
        let mut cached = entry("2026-02-02 10:00:00");
        cached.timestamp = None;
        assert!(cached.is_stale(now_local(), chrono::Duration::minutes(30)));
    }

    #[test]
    fn test_store_roundtrip_and_wire_names() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = CacheStore::new(dir.path().join("failure_cache.json"));

        assert_eq!(store.load()?, None);

        let cached = entry("2026-02-02 10:00:00");
        store.save(&cached)?;
        assert_eq!(store.load()?, Some(cached));

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(store.path())?)?;
        assert_eq!(raw["timestamp"], "2026-02-02 10:00:00");
        assert_eq!(raw["usns_with_logs"], 1);
        assert_eq!(raw["log_locations"]["U2"]["failures_count"], 2);
        Ok(())
    }

    #[test]
    fn test_store_load__when_corrupt() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = CacheStore::new(dir.path().join("failure_cache.json"));
        fs::write(store.path(), "{ nope")?;

        assert!(matches!(store.load(), Err(StageTimeError::Cache(_))));
        Ok(())
    }

    #[test]
    fn test_run_lock__second_refresh_is_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = CacheStore::new(dir.path().join("failure_cache.json"));

        let lock = store.acquire_lock()?;
        assert!(lock.path().exists());
        assert!(lock.path().to_string_lossy().ends_with("failure_cache.json.lock"));

        assert!(matches!(
            store.acquire_lock(),
            Err(StageTimeError::ProbeInProgress(_))
        ));

        let lock_path = lock.path().to_path_buf();
        drop(lock);
        assert!(!lock_path.exists());
        assert!(store.acquire_lock().is_ok());
        Ok(())
    }

    #[test]
    fn test_run_lock__reclaims_abandoned_lock() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = CacheStore::new(dir.path().join("failure_cache.json"));
        fs::write(store.lock_path(), "2020-01-01 00:00:00\n")?;

        let lock = store.acquire_lock()?;
        assert!(lock.path().exists());
        Ok(())
    }
}
