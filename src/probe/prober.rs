use chrono::Timelike;
use futures::{StreamExt, stream};
use reqwest::StatusCode;
use reqwest::redirect::Policy;
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::core::constants::probe;
use crate::core::error::Result;
use crate::reporting::logging;
use crate::source::LogServer;
use crate::ui::progress::ProgressReporter;

use super::cache::{FailureCacheEntry, FailureProvenance, failure_rate, round2};
use super::history::{HistoryTally, parse_history};

#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub batch_size: usize,
    pub connect_timeout: Duration,
    pub probe_timeout: Duration,
    pub history_timeout: Duration,
    /// Base of a server's log tree, `{address}` standing for the server
    pub log_base_template: String,
    pub user_agent: String,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ProbeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.batch_size().max(1),
            connect_timeout: config.connect_timeout(),
            probe_timeout: config.probe_timeout(),
            history_timeout: config.history_timeout(),
            log_base_template: config.log_base_template().to_string(),
            user_agent: config.user_agent().to_string(),
        }
    }
}

/// A unit whose log directory answered on some server.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedUnit {
    pub usn: String,
    pub server: LogServer,
    pub log_url: String,
    pub history_url: String,
    /// `None` when the history log could not be downloaded
    pub tally: Option<HistoryTally>,
}

impl LocatedUnit {
    pub fn has_failure(&self) -> bool {
        self.tally.is_some_and(|tally| tally.has_failure())
    }

    pub fn provenance(&self) -> FailureProvenance {
        let tally = self.tally.unwrap_or_default();
        FailureProvenance {
            tps_ip: self.server.address.clone(),
            log_url: self.log_url.clone(),
            history_url: self.history_url.clone(),
            remark: self.server.remark.clone(),
            oa_ip: self.server.oa_address.clone(),
            total_tests: tally.total_tests,
            failures_count: tally.failures,
        }
    }
}

/// Outcome of probing a list of units.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    pub total_units: usize,
    /// Units whose log directory was found
    pub located: usize,
    /// Failing units, in the order they were supplied
    pub failing: Vec<LocatedUnit>,
    pub elapsed: Duration,
}

impl ProbeReport {
    pub fn failure_rate(&self) -> f64 {
        failure_rate(self.failing.len(), self.total_units)
    }

    pub fn yield_first_pass(&self) -> f64 {
        100.0 - self.failure_rate()
    }

    pub fn failing_usns(&self) -> Vec<String> {
        self.failing.iter().map(|unit| unit.usn.clone()).collect()
    }

    pub fn into_cache_entry(self, computed_at: chrono::NaiveDateTime) -> FailureCacheEntry {
        let log_locations: BTreeMap<String, FailureProvenance> = self
            .failing
            .iter()
            .map(|unit| (unit.usn.clone(), unit.provenance()))
            .collect();

        FailureCacheEntry {
            timestamp: Some(computed_at.with_nanosecond(0).unwrap_or(computed_at)),
            total_usns: self.total_units,
            usns_with_logs: self.failing.len(),
            failure_rate: round2(self.failure_rate()),
            yield_first_pass: round2(self.yield_first_pass()),
            usns_list: self.failing_usns(),
            log_locations,
            calculation_time_seconds: round2(self.elapsed.as_secs_f64()),
        }
    }
}

/// Looks for per-unit log directories on a list of log servers and
/// tallies the test records of each unit's history log.
pub struct FailureLogProbe {
    probe_client: reqwest::Client,
    history_client: reqwest::Client,
    settings: ProbeSettings,
}

impl FailureLogProbe {
    pub fn new(settings: ProbeSettings) -> Result<Self> {
        let probe_client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.probe_timeout)
            .redirect(Policy::none())
            .user_agent(settings.user_agent.as_str())
            .build()?;

        let history_client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.history_timeout)
            .user_agent(settings.user_agent.as_str())
            .build()?;

        Ok(Self {
            probe_client,
            history_client,
            settings,
        })
    }

    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    /// Directory URL of `usn` on `server`, with a trailing slash.
    pub fn log_url(&self, server: &LogServer, usn: &str) -> String {
        let base = self
            .settings
            .log_base_template
            .replace(probe::ADDRESS_PLACEHOLDER, &server.address);
        format!("{}/{usn}/", base.trim_end_matches('/'))
    }

    pub fn history_url(log_url: &str, usn: &str) -> String {
        format!("{log_url}{usn}{}", probe::HISTORY_SUFFIX)
    }

    /// Probe every unit, one batch at a time.
    ///
    /// Batches run in input order and never overlap. A unit is located on
    /// the first listed server that answers 200 for its directory.
    pub async fn run(
        &self,
        usns: &[String],
        servers: &[LogServer],
        progress: Option<&ProgressReporter>,
    ) -> ProbeReport {
        let started = Instant::now();
        let units = dedup_in_order(usns);
        let batch_size = self.settings.batch_size.max(1);
        let batches = units.len().div_ceil(batch_size);

        logging::log_probe_start(units.len(), servers.len(), batch_size);
        if servers.is_empty() {
            logging::log_warning("No log servers to probe, every unit counts as passing");
        }

        let mut located = 0;
        let mut failing = Vec::new();
        let mut checked = 0;

        for (index, batch) in units.chunks(batch_size).enumerate() {
            let found = self.probe_batch(batch, servers).await;
            located += found.len();
            failing.extend(found.into_iter().filter(LocatedUnit::has_failure));

            checked += batch.len();
            if let Some(reporter) = progress {
                reporter.update_probe_progress(checked);
            }
            logging::log_probe_batch(index + 1, batches, checked, failing.len());
        }

        let report = ProbeReport {
            total_units: units.len(),
            located,
            failing,
            elapsed: started.elapsed(),
        };
        logging::log_probe_complete(
            report.total_units,
            report.failing.len(),
            report.elapsed.as_millis(),
        );
        report
    }

    async fn probe_batch(&self, batch: &[String], servers: &[LogServer]) -> Vec<LocatedUnit> {
        let targets: Vec<(&String, &LogServer)> = batch
            .iter()
            .flat_map(|usn| servers.iter().map(move |server| (usn, server)))
            .collect();
        let width = targets.len().max(1);

        // Order-preserving, so hits[i * servers.len() + j] is unit i on server j
        let hits: Vec<bool> = stream::iter(targets)
            .map(|(usn, server)| async move {
                let found = self.directory_exists(&self.log_url(server, usn)).await;
                logging::log_probe_result(usn, &server.address, found);
                found
            })
            .buffered(width)
            .collect()
            .await;

        let located: Vec<(&String, &LogServer)> = batch
            .iter()
            .enumerate()
            .filter_map(|(i, usn)| {
                servers
                    .iter()
                    .enumerate()
                    .find(|(j, _)| hits[i * servers.len() + j])
                    .map(|(_, server)| (usn, server))
            })
            .collect();

        stream::iter(located)
            .map(|(usn, server)| async move {
                let log_url = self.log_url(server, usn);
                let history_url = Self::history_url(&log_url, usn);
                let tally = self.fetch_history(&history_url).await;
                LocatedUnit {
                    usn: usn.clone(),
                    server: server.clone(),
                    log_url,
                    history_url,
                    tally,
                }
            })
            .buffered(batch.len().max(1))
            .collect()
            .await
    }

    async fn directory_exists(&self, url: &str) -> bool {
        match self.probe_client.head(url).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(_) => false,
        }
    }

    async fn fetch_history(&self, url: &str) -> Option<HistoryTally> {
        let response = self.history_client.get(url).send().await.ok()?;
        if !response.status().is_success() {
            log::debug!("History log {url} answered {}", response.status().as_u16());
            return None;
        }
        let body = response.text().await.ok()?;
        Some(parse_history(&body))
    }
}

fn dedup_in_order(usns: &[String]) -> Vec<String> {
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    usns.iter()
        .filter(|usn| seen.insert(usn.as_str()))
        .cloned()
        .collect()
}
