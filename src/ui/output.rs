//! Rendering of results as text tables, JSON or CSV

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::core::constants::{display, output_formats};
use crate::core::error::{Result, StageTimeError};
use crate::core::types::{StatSummary, UnitRecord, timestamp};
use crate::metrics::{Aggregation, EnvironmentStat, GroupBy};
use crate::probe::{FailureCacheEntry, FailureListing, QualityReport};

use super::color::{Colors, bold, colorize, colorize_failure_rate, colorize_yield};

const SUMMARY_HEADERS: [&str; 6] = ["Avg", "P50", "P90", "Min", "Max", "Count"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

impl FromStr for OutputFormat {
    type Err = StageTimeError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            output_formats::TEXT => Ok(OutputFormat::Text),
            output_formats::JSON => Ok(OutputFormat::Json),
            output_formats::CSV => Ok(OutputFormat::Csv),
            other => Err(StageTimeError::InvalidRequest(format!(
                "Unknown output format '{other}'. Expected one of: {}.",
                output_formats::ALL.join(", ")
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Text => output_formats::TEXT,
            OutputFormat::Json => output_formats::JSON,
            OutputFormat::Csv => output_formats::CSV,
        };
        write!(f, "{name}")
    }
}

/// Hours with two decimals, or the placeholder when absent.
pub fn format_hours(hours: Option<f64>) -> String {
    match hours {
        Some(value) => format!("{value:.2}h"),
        None => display::PLACEHOLDER.to_string(),
    }
}

fn summary_cells(summary: Option<&StatSummary>) -> Vec<String> {
    match summary {
        Some(s) => vec![
            format_hours(Some(s.avg)),
            format_hours(Some(s.p50)),
            format_hours(Some(s.p90)),
            format_hours(Some(s.min)),
            format_hours(Some(s.max)),
            s.count.to_string(),
        ],
        None => vec![display::PLACEHOLDER.to_string(); SUMMARY_HEADERS.len()],
    }
}

/// A rectangular table rendered either aligned or as CSV.
#[derive(Debug, Default)]
struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn new<S: AsRef<str>>(headers: &[S]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(width) = widths.get_mut(i) {
                    *width = (*width).max(cell.chars().count());
                }
            }
        }
        widths
    }

    fn render_text(&self) -> String {
        let widths = self.widths();
        let line = |cells: &[String]| -> String {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut out = bold(&line(&self.headers));
        out.push('\n');
        for row in &self.rows {
            out.push_str(&line(row));
            out.push('\n');
        }
        out
    }

    fn render_csv(&self) -> String {
        let mut out = csv_line(&self.headers);
        for row in &self.rows {
            out.push_str(&csv_line(row));
        }
        out
    }

    fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Csv => self.render_csv(),
            _ => self.render_text(),
        }
    }
}

/// Every cell double-quoted, embedded quotes doubled.
pub fn csv_line<S: AsRef<str>>(cells: &[S]) -> String {
    let quoted: Vec<String> = cells
        .iter()
        .map(|cell| format!("\"{}\"", cell.as_ref().replace('"', "\"\"")))
        .collect();
    format!("{}\n", quoted.join(","))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(format!("{}\n", serde_json::to_string_pretty(value)?))
}

pub fn render_aggregation(aggregation: &Aggregation, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return to_json(aggregation);
    }

    let group_header = match aggregation.group_by {
        GroupBy::None => "Group".to_string(),
        other => capitalize(&other.to_string()),
    };
    let mut headers = vec![group_header, "Units".to_string(), "Stage".to_string()];
    headers.extend(SUMMARY_HEADERS.iter().map(|h| h.to_string()));

    let mut table = Table::new(&headers);
    for group in &aggregation.groups {
        for stat in &group.stages {
            let mut row = vec![group.key.clone(), group.units.to_string(), stat.stage.clone()];
            row.extend(summary_cells(stat.summary.as_ref()));
            table.push(row);
        }
    }
    Ok(table.render(format))
}

pub fn render_environment(stats: &[EnvironmentStat], format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return to_json(stats);
    }

    let mut headers = vec!["Metric"];
    headers.extend(SUMMARY_HEADERS);

    let mut table = Table::new(&headers);
    for stat in stats {
        let mut row = vec![stat.name.clone()];
        match stat.summary {
            Some(ref summary) => row.extend(summary_cells(Some(summary))),
            None => {
                row.push(display::NO_DATA.to_string());
                row.extend(std::iter::repeat_n(String::new(), SUMMARY_HEADERS.len() - 1));
            }
        }
        table.push(row);
    }
    Ok(table.render(format))
}

pub fn render_quality(report: &QualityReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(report),
        OutputFormat::Csv => {
            let mut table = Table::new(&[
                "source",
                "total_units",
                "failing_units",
                "failure_rate",
                "yield_first_pass",
                "computed_at",
            ]);
            table.push(vec![
                format!("{:?}", report.source).to_lowercase(),
                report.total_units.to_string(),
                report.failing_units.to_string(),
                format!("{:.2}", report.failure_rate),
                format!("{:.2}", report.yield_first_pass),
                report.computed_at.clone().unwrap_or_default(),
            ]);
            Ok(table.render_csv())
        }
        OutputFormat::Text => {
            let source = format!("{:?}", report.source).to_lowercase();
            let mut out = String::new();
            out.push_str(&labelled("Source", &source));
            out.push_str(&labelled("Units", &report.total_units.to_string()));
            out.push_str(&labelled("Failing units", &report.failing_units.to_string()));
            out.push_str(&labelled("Failure rate", &colorize_failure_rate(report.failure_rate)));
            out.push_str(&labelled("First-pass yield", &colorize_yield(report.yield_first_pass)));
            if let Some(ref computed_at) = report.computed_at {
                out.push_str(&labelled("Computed at", computed_at));
            }
            Ok(out)
        }
    }
}

/// Summary of a freshly written cache entry.
pub fn render_cache_entry(entry: &FailureCacheEntry, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(entry),
        OutputFormat::Csv => {
            let mut table = Table::new(&[
                "timestamp",
                "total_usns",
                "usns_with_logs",
                "failure_rate",
                "yield_first_pass",
                "calculation_time_seconds",
            ]);
            table.push(vec![
                format_timestamp(entry),
                entry.total_usns.to_string(),
                entry.usns_with_logs.to_string(),
                format!("{:.2}", entry.failure_rate),
                format!("{:.2}", entry.yield_first_pass),
                format!("{:.2}", entry.calculation_time_seconds),
            ]);
            Ok(table.render_csv())
        }
        OutputFormat::Text => {
            let mut out = String::new();
            out.push_str(&labelled("Computed at", &format_timestamp(entry)));
            out.push_str(&labelled("Units probed", &entry.total_usns.to_string()));
            out.push_str(&labelled("Units with failures", &entry.usns_with_logs.to_string()));
            out.push_str(&labelled("Failure rate", &colorize_failure_rate(entry.failure_rate)));
            out.push_str(&labelled("First-pass yield", &colorize_yield(entry.yield_first_pass)));
            out.push_str(&labelled(
                "Calculation time",
                &format!("{:.2}s", entry.calculation_time_seconds),
            ));
            Ok(out)
        }
    }
}

pub fn render_failures(listing: &FailureListing, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return to_json(listing);
    }

    let mut table = Table::new(&["USN", "Server", "Failures", "Tests", "Log URL"]);
    for unit in &listing.failing {
        let row = match unit.provenance {
            Some(ref p) => vec![
                unit.usn.clone(),
                p.tps_ip.clone(),
                p.failures_count.to_string(),
                p.total_tests.to_string(),
                p.log_url.clone(),
            ],
            None => {
                let mut row = vec![unit.usn.clone()];
                row.extend(std::iter::repeat_n(display::PLACEHOLDER.to_string(), 4));
                row
            }
        };
        table.push(row);
    }

    if format == OutputFormat::Csv {
        return Ok(table.render_csv());
    }

    let mut out = String::new();
    let computed = listing.computed_at.as_deref().unwrap_or(display::PLACEHOLDER);
    let age = match listing.age_minutes {
        Some(minutes) => format!("{minutes} min ago"),
        None => "age unknown".to_string(),
    };
    let freshness = if listing.stale {
        colorize("stale", Colors::YELLOW)
    } else {
        colorize("fresh", Colors::GREEN)
    };
    out.push_str(&labelled("Computed at", &format!("{computed} ({age}, {freshness})")));
    out.push_str(&labelled("Failure rate", &colorize_failure_rate(listing.failure_rate)));
    out.push_str(&labelled("First-pass yield", &colorize_yield(listing.yield_first_pass)));
    out.push('\n');
    out.push_str(&table.render_text());
    Ok(out)
}

/// Flat per-unit table, one duration column per profile stage.
pub fn render_units(units: &[UnitRecord], stages: &[String], format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return to_json(units);
    }

    let mut headers = vec![
        "USN".to_string(),
        "Model".to_string(),
        "Batch".to_string(),
        "Bay".to_string(),
        "Current stage".to_string(),
        "Test start".to_string(),
    ];
    headers.extend(stages.iter().cloned());

    let text = |value: Option<&str>| value.unwrap_or(display::PLACEHOLDER).to_string();
    let mut table = Table::new(&headers);
    for unit in units {
        let mut row = vec![
            unit.usn.clone(),
            text(unit.model.as_deref()),
            text(unit.batch_label()),
            text(unit.bay_label()),
            text(unit.current_stage.as_deref()),
            unit.test_start_time
                .map(|ts| ts.format(timestamp::FORMAT).to_string())
                .unwrap_or_else(|| display::PLACEHOLDER.to_string()),
        ];
        row.extend(stages.iter().map(|code| format_hours(unit.duration_of(code))));
        table.push(row);
    }
    Ok(table.render(format))
}

/// What to print when a command had nothing to report.
pub fn render_no_data(format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(&serde_json::json!({ "status": "no_data" })),
        OutputFormat::Csv => Ok(String::new()),
        OutputFormat::Text => Ok(format!("{}\n", colorize("No data available", Colors::YELLOW))),
    }
}

fn format_timestamp(entry: &FailureCacheEntry) -> String {
    entry
        .timestamp
        .map(|ts| ts.format(timestamp::FORMAT).to_string())
        .unwrap_or_else(|| display::PLACEHOLDER.to_string())
}

fn labelled(label: &str, value: &str) -> String {
    format!("{}: {}\n", colorize(label, Colors::BRIGHT_CYAN), value)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::config::ProjectProfile;
    use crate::metrics::{StageAggregator, compute_stats_from_hours};
    use crate::probe::{FailingUnit, FailureProvenance, QualitySource};

    fn summary() -> StatSummary {
        compute_stats_from_hours(&[1.0, 2.0, 3.0]).unwrap()
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("csv".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!(OutputFormat::Json.to_string(), "json");
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_format_hours() {
        assert_eq!(format_hours(Some(1.0)), "1.00h");
        assert_eq!(format_hours(Some(2.345)), "2.35h");
        assert_eq!(format_hours(None), "-");
    }

    #[test]
    fn test_csv_line__quotes_every_cell() {
        assert_eq!(csv_line(&["a", "b\"c", ""]), "\"a\",\"b\"\"c\",\"\"\n");
    }

    #[test]
    fn test_render_aggregation__grouped_uses_placeholder() {
        let profile = ProjectProfile::l10();
        let stages = vec!["RS".to_string(), "MG".to_string()];
        let units = vec![
            UnitRecord::new("U1")
                .with_batch("B7")
                .with_stage("RS", None, Some(2.0)),
        ];
        let aggregation = StageAggregator::with_stages(&stages, &profile.reference_stage)
            .aggregate(&units, GroupBy::Batch)
            .unwrap();

        let text = render_aggregation(&aggregation, OutputFormat::Text).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("Batch"));
        assert!(lines[1].contains("2.00h"));
        assert!(lines[2].contains("MG"));
        assert!(lines[2].ends_with('-'));

        let csv = render_aggregation(&aggregation, OutputFormat::Csv).unwrap();
        assert!(csv.starts_with("\"Batch\",\"Units\",\"Stage\""));
        assert!(csv.contains("\"7\",\"1\",\"MG\",\"-\""));
    }

    #[test]
    fn test_render_environment__no_data_row() {
        let stats = vec![
            EnvironmentStat {
                name: "PRETEST".to_string(),
                summary: Some(summary()),
            },
            EnvironmentStat {
                name: "BSL".to_string(),
                summary: None,
            },
        ];

        let text = render_environment(&stats, OutputFormat::Text).unwrap();
        assert!(text.contains("PRETEST"));
        assert!(text.contains("2.00h"));
        assert!(text.lines().any(|line| line.starts_with("BSL") && line.contains("No data")));

        let json = render_environment(&stats, OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed[1]["summary"].is_null());
        assert_eq!(parsed[0]["summary"]["count"], 3);
    }

    #[test]
    fn test_render_quality__formats() {
        let report = QualityReport {
            source: QualitySource::Realtime,
            total_units: 4,
            failing_units: 1,
            failure_rate: 25.0,
            yield_first_pass: 75.0,
            failing: vec!["U1".to_string()],
            computed_at: None,
        };

        let text = render_quality(&report, OutputFormat::Text).unwrap();
        assert!(text.contains("Source: realtime"));
        assert!(text.contains("25.00%"));

        let csv = render_quality(&report, OutputFormat::Csv).unwrap();
        assert!(csv.lines().nth(1).unwrap().starts_with("\"realtime\",\"4\",\"1\",\"25.00\""));

        let json = render_quality(&report, OutputFormat::Json).unwrap();
        assert!(json.contains("\"source\": \"realtime\""));
    }

    #[test]
    fn test_render_failures__text_and_csv() {
        let listing = FailureListing {
            computed_at: Some("2026-02-02 10:00:00".to_string()),
            age_minutes: Some(5),
            stale: false,
            total_units: 2,
            failure_rate: 50.0,
            yield_first_pass: 50.0,
            failing: vec![FailingUnit {
                usn: "U1".to_string(),
                provenance: Some(FailureProvenance {
                    tps_ip: "10.1.1.1".to_string(),
                    log_url: "http://10.1.1.1/logs/U1/".to_string(),
                    failures_count: 1,
                    total_tests: 3,
                    ..Default::default()
                }),
            }],
        };

        let text = render_failures(&listing, OutputFormat::Text).unwrap();
        assert!(text.contains("5 min ago, fresh"));
        assert!(text.contains("10.1.1.1"));

        let csv = render_failures(&listing, OutputFormat::Csv).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.contains("\"U1\",\"10.1.1.1\",\"1\",\"3\""));
    }

    #[test]
    fn test_render_units__columns_per_stage() {
        let units = vec![
            UnitRecord::new("U1")
                .with_model("Rack-A")
                .with_stage("RS", None, Some(1.5)),
        ];
        let stages = vec!["RS".to_string(), "SU".to_string()];

        let csv = render_units(&units, &stages, OutputFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert!(lines[0].ends_with("\"RS\",\"SU\""));
        assert_eq!(
            lines[1],
            "\"U1\",\"Rack-A\",\"-\",\"-\",\"-\",\"-\",\"1.50h\",\"-\""
        );
    }

    #[test]
    fn test_render_no_data() {
        let json: serde_json::Value =
            serde_json::from_str(&render_no_data(OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["status"], "no_data");
        assert!(render_no_data(OutputFormat::Csv).unwrap().is_empty());
        assert!(render_no_data(OutputFormat::Text).unwrap().contains("No data available"));
    }
}
