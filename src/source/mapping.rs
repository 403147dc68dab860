use serde::{Deserialize, Serialize};

use crate::core::error::{Result, StageTimeError};

/// A log server taken from the mapping list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogServer {
    /// Address the log tree is served from
    pub address: String,
    /// Companion office-side address, informational
    pub oa_address: String,
    pub remark: String,
}

impl LogServer {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            oa_address: String::new(),
            remark: String::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MappingEntry {
    #[serde(rename = "Project", default)]
    project: Option<String>,
    #[serde(rename = "TPS_IP", default)]
    address: Option<String>,
    #[serde(rename = "OA_IP", default)]
    oa_address: Option<String>,
    #[serde(rename = "Remark", default)]
    remark: Option<String>,
}

/// Keep the entries tagged `project_tag` that name an address, in list order.
pub fn parse_mapping(body: &str, project_tag: &str) -> Result<Vec<LogServer>> {
    let entries: Vec<MappingEntry> = serde_json::from_str(body)?;

    Ok(entries
        .into_iter()
        .filter(|entry| {
            entry
                .project
                .as_deref()
                .is_some_and(|project| project.eq_ignore_ascii_case(project_tag))
        })
        .filter_map(|entry| {
            let address = entry.address?.trim().to_string();
            if address.is_empty() {
                return None;
            }
            Some(LogServer {
                address,
                oa_address: entry.oa_address.unwrap_or_default(),
                remark: entry.remark.unwrap_or_default(),
            })
        })
        .collect())
}

/// Download the mapping list and select the servers of `project_tag`.
///
/// Without the list no probe target is known, so every failure here is a
/// hard connectivity error.
pub async fn fetch_log_servers(
    client: &reqwest::Client,
    mapping_url: &str,
    project_tag: &str,
) -> Result<Vec<LogServer>> {
    let mapping_error = |detail: String| {
        StageTimeError::Connectivity(format!(
            "Failed to fetch server mapping from '{mapping_url}': {detail}"
        ))
    };

    let response = client
        .get(mapping_url)
        .send()
        .await
        .map_err(|e| mapping_error(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(mapping_error(format!("status {}", status.as_u16())));
    }

    let body = response
        .text()
        .await
        .map_err(|e| mapping_error(e.to_string()))?;

    parse_mapping(&body, project_tag).map_err(|e| mapping_error(e.to_string()))
}
