//! Failure detection on remote log servers
//!
//! Units are looked up on the project's log servers, their history logs
//! are tallied, and the resulting failure rate is cached with a TTL.

pub mod cache;
pub mod history;
pub mod prober;
pub mod quality;

use std::future::Future;

use crate::core::error::Result;
use crate::source::LogServer;
use crate::ui::progress::ProgressReporter;

pub use cache::{CacheStore, FailureCacheEntry, FailureProvenance, RunLock};
pub use history::{HistoryTally, parse_history};
pub use prober::{FailureLogProbe, LocatedUnit, ProbeReport, ProbeSettings};
pub use quality::{FailingUnit, FailureListing, QualityReport, QualitySource, cached_quality};

/// Probe `usns` and overwrite the cache with the result.
///
/// Holds the run-lock for the whole refresh, so overlapping refreshes fail
/// with [`crate::core::StageTimeError::ProbeInProgress`].
pub async fn refresh_failure_cache(
    probe: &FailureLogProbe,
    store: &CacheStore,
    usns: &[String],
    servers: &[LogServer],
    progress: Option<&ProgressReporter>,
) -> Result<FailureCacheEntry> {
    let _lock = store.acquire_lock()?;

    let report = probe.run(usns, servers, progress).await;
    let entry = report.into_cache_entry(cache::now_local());
    store.save(&entry)?;

    Ok(entry)
}

/// Failure rate and yield for `usns`: from a fresh cache entry when there
/// is one, otherwise from a real-time probe of exactly those units. The
/// real-time result is not persisted.
pub async fn quality_for_units<F, Fut>(
    store: &CacheStore,
    ttl: chrono::Duration,
    usns: &[String],
    realtime: F,
) -> Result<QualityReport>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<ProbeReport>>,
{
    if let Some(report) = cached_quality(store, usns, ttl) {
        return Ok(report);
    }

    let probed = realtime().await?;
    Ok(QualityReport::from_probe(&probed))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::core::StageTimeError;

    fn usns(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn fast_probe() -> FailureLogProbe {
        FailureLogProbe::new(ProbeSettings {
            log_base_template: "http://{address}/opt/share/logs".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_refresh_failure_cache__writes_entry() -> Result<()> {
        let mut server = mockito::Server::new_async().await;
        let _dir = server
            .mock("HEAD", "/opt/share/logs/U1/")
            .with_status(200)
            .create_async()
            .await;
        let _history = server
            .mock("GET", "/opt/share/logs/U1/U1_history.log")
            .with_status(200)
            .with_body("1    RS    Setup    a    b    c    fail\n")
            .create_async()
            .await;

        let dir = tempfile::tempdir()?;
        let store = CacheStore::new(dir.path().join("failure_cache.json"));
        let servers = vec![LogServer::new(&server.host_with_port())];

        let entry =
            refresh_failure_cache(&fast_probe(), &store, &usns(&["U1", "U2"]), &servers, None)
                .await?;

        assert_eq!(entry.total_usns, 2);
        assert_eq!(entry.usns_list, usns(&["U1"]));
        assert_eq!(entry.failure_rate, 50.0);
        assert_eq!(store.load()?, Some(entry));
        assert!(!store.lock_path().exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_refresh_failure_cache__when_locked() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = CacheStore::new(dir.path().join("failure_cache.json"));
        let _held = store.acquire_lock()?;

        let result = refresh_failure_cache(&fast_probe(), &store, &usns(&["U1"]), &[], None).await;

        assert!(matches!(result, Err(StageTimeError::ProbeInProgress(_))));
        assert_eq!(store.load()?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_quality_for_units__falls_back_to_realtime() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = CacheStore::new(dir.path().join("failure_cache.json"));
        let probe = fast_probe();
        let requested = usns(&["U1", "U2"]);

        let report = quality_for_units(&store, chrono::Duration::minutes(30), &requested, || async {
            Ok(probe.run(&requested, &[], None).await)
        })
        .await?;

        assert_eq!(report.source, QualitySource::Realtime);
        assert_eq!(report.total_units, 2);
        // Real-time results are not persisted
        assert_eq!(store.load()?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_quality_for_units__serves_fresh_cache() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = CacheStore::new(dir.path().join("failure_cache.json"));
        let probe = fast_probe();
        let entry = probe
            .run(&usns(&["U1"]), &[], None)
            .await
            .into_cache_entry(cache::now_local());
        store.save(&entry)?;

        let report = quality_for_units(&store, chrono::Duration::minutes(30), &usns(&["U1"]), || async {
            Err(StageTimeError::Connectivity("must not probe".to_string()))
        })
        .await?;

        assert_eq!(report.source, QualitySource::Cache);
        Ok(())
    }
}
