use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::constants::probe::MIN_RECORD_TOKENS;

static COLUMN_GAP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s{2,}").expect("Failed to compile column gap pattern"));

/// Test records counted in one history log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTally {
    pub total_tests: usize,
    pub failures: usize,
}

impl HistoryTally {
    pub fn has_failure(&self) -> bool {
        self.failures > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Pass,
    Fail,
}

/// Count the pass/fail records of a history log.
///
/// Lines that do not look like a record are skipped and never counted.
pub fn parse_history(content: &str) -> HistoryTally {
    content
        .lines()
        .filter_map(parse_record)
        .fold(HistoryTally::default(), |mut tally, verdict| {
            tally.total_tests += 1;
            if verdict == Verdict::Fail {
                tally.failures += 1;
            }
            tally
        })
}

fn parse_record(line: &str) -> Option<Verdict> {
    let line = line.trim();
    if line.is_empty() || is_header(line) || is_separator(line) {
        return None;
    }

    let columns: Vec<&str> = COLUMN_GAP.split(line).collect();
    if columns.len() < MIN_RECORD_TOKENS {
        return None;
    }

    let id = columns[0].trim();
    if !id.parse::<f64>().is_ok_and(f64::is_finite) {
        return None;
    }

    match columns[columns.len() - 1].trim().to_lowercase().as_str() {
        "pass" => Some(Verdict::Pass),
        "fail" => Some(Verdict::Fail),
        _ => None,
    }
}

fn is_header(line: &str) -> bool {
    line.contains("ID") && line.contains("Stage")
}

fn is_separator(line: &str) -> bool {
    line.starts_with("---") || line.starts_with("====")
}
