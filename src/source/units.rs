use async_trait::async_trait;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::ProjectProfile;
use crate::core::constants::groups;
use crate::core::error::{Result, StageTimeError};
use crate::core::types::UnitRecord;
use crate::metrics::aggregator::batch_key;

/// Anything that can hand over the unit records of a project.
#[async_trait]
pub trait UnitSource {
    async fn fetch_units(&self, project: &str) -> Result<Vec<UnitRecord>>;

    /// Human readable origin, used in logs
    fn describe(&self) -> String;
}

/// Unit records stored in a local JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl UnitSource for JsonFileSource {
    async fn fetch_units(&self, _project: &str) -> Result<Vec<UnitRecord>> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            StageTimeError::Connectivity(format!(
                "Could not read unit source '{}': {e}",
                self.path.display()
            ))
        })?;
        parse_units_payload(&content)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Unit records served over HTTP as `GET {endpoint}?project={name}`.
#[derive(Debug, Clone)]
pub struct HttpUnitSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpUnitSource {
    pub fn new(client: reqwest::Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl UnitSource for HttpUnitSource {
    async fn fetch_units(&self, project: &str) -> Result<Vec<UnitRecord>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("project", project)])
            .send()
            .await
            .map_err(|e| {
                StageTimeError::Connectivity(format!(
                    "Unit source '{}' is unreachable: {e}",
                    self.endpoint
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StageTimeError::Connectivity(format!(
                "Unit source '{}' answered with status {}",
                self.endpoint,
                status.as_u16()
            )));
        }

        let body = response.text().await?;
        parse_units_payload(&body)
    }

    fn describe(&self) -> String {
        self.endpoint.clone()
    }
}

/// Build the source named by `location`: an http(s) URL or a file path.
pub fn source_for(location: &str, client: reqwest::Client) -> Box<dyn UnitSource + Send + Sync> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Box::new(HttpUnitSource::new(client, location))
    } else {
        Box::new(JsonFileSource::new(location))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UnitsPayload {
    Bare(Vec<UnitRecord>),
    Envelope {
        success: bool,
        #[serde(default)]
        data: Vec<UnitRecord>,
        #[serde(default)]
        error: Option<String>,
    },
}

/// Decode a bare record array or a `{success, data, error}` envelope.
pub fn parse_units_payload(body: &str) -> Result<Vec<UnitRecord>> {
    match serde_json::from_str::<UnitsPayload>(body) {
        Ok(UnitsPayload::Bare(units)) => Ok(units),
        Ok(UnitsPayload::Envelope {
            success: true,
            data,
            ..
        }) => Ok(data),
        Ok(UnitsPayload::Envelope { error, .. }) => Err(StageTimeError::Connectivity(format!(
            "Unit source reported an error: {}",
            error.unwrap_or_else(|| "unknown error".to_string())
        ))),
        Err(_) => {
            // Re-decode as the array form for a precise error position
            let units: Vec<UnitRecord> = serde_json::from_str(body)?;
            Ok(units)
        }
    }
}

/// Drop excluded units and units tested in a bay before its cutoff.
pub fn apply_profile_exclusions(units: Vec<UnitRecord>, profile: &ProjectProfile) -> Vec<UnitRecord> {
    units
        .into_iter()
        .filter(|unit| !profile.is_excluded(&unit.usn))
        .filter(|unit| {
            let Some(bay) = unit.bay_label() else {
                return true;
            };
            match profile.bay_cutoff(bay) {
                Some(cutoff) => matches!(
                    (unit.test_start_time, cutoff.not_before),
                    (Some(start), Some(not_before)) if start >= not_before
                ),
                None => true,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    /// Some profile stage has no pass timestamp yet
    Pending,
    /// Every profile stage has passed
    Completed,
}

impl FromStr for StatusFilter {
    type Err = StageTimeError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(StatusFilter::Pending),
            "completed" => Ok(StatusFilter::Completed),
            other => Err(StageTimeError::InvalidRequest(format!(
                "Unknown status '{other}'. Expected pending or completed."
            ))),
        }
    }
}

/// Client-side narrowing of the loaded units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitFilter {
    /// Exact unit serial number
    pub usn: Option<String>,
    /// Stage code expected as `(CODE)` in the current-stage marker
    pub stage: Option<String>,
    /// Substring of the model
    pub model: Option<String>,
    /// Exact bay label; `all` keeps every unit
    pub bay: Option<String>,
    /// Batch group key; `none` keeps only units without a batch
    pub batch: Option<String>,
    pub status: Option<StatusFilter>,
}

impl UnitFilter {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Reject filters that name something the profile does not know.
    pub fn validate(&self, profile: &ProjectProfile) -> Result<()> {
        if let Some(ref stage) = self.stage
            && !profile.has_stage(stage)
        {
            return Err(StageTimeError::InvalidRequest(format!(
                "Unknown stage '{stage}' for project {}. Expected one of: {}.",
                profile.name,
                profile.stages.join(", ")
            )));
        }
        Ok(())
    }

    pub fn apply(&self, units: Vec<UnitRecord>, profile: &ProjectProfile) -> Result<Vec<UnitRecord>> {
        self.validate(profile)?;
        Ok(units
            .into_iter()
            .filter(|unit| self.matches(unit, profile))
            .collect())
    }

    pub fn matches(&self, unit: &UnitRecord, profile: &ProjectProfile) -> bool {
        if let Some(ref usn) = self.usn
            && unit.usn != *usn
        {
            return false;
        }

        if let Some(ref stage) = self.stage {
            let marker = format!("({stage})");
            if !unit
                .current_stage
                .as_deref()
                .is_some_and(|current| current.contains(&marker))
            {
                return false;
            }
        }

        if let Some(ref model) = self.model
            && !unit
                .model
                .as_deref()
                .is_some_and(|value| value.contains(model.as_str()))
        {
            return false;
        }

        if let Some(ref bay) = self.bay
            && bay != groups::ALL
            && unit.bay_label() != Some(bay.as_str())
        {
            return false;
        }

        if let Some(ref batch) = self.batch {
            let keep = match unit.batch_label() {
                Some(label) => batch != groups::NO_BATCH && batch_key(label) == batch_key(batch),
                None => batch == groups::NO_BATCH,
            };
            if !keep {
                return false;
            }
        }

        match self.status {
            Some(StatusFilter::Completed) => is_completed(unit, profile),
            Some(StatusFilter::Pending) => !is_completed(unit, profile),
            None => true,
        }
    }
}

fn is_completed(unit: &UnitRecord, profile: &ProjectProfile) -> bool {
    profile
        .stages
        .iter()
        .all(|stage| unit.pass_of(stage).is_some())
}
