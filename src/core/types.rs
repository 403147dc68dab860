use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Lenient `YYYY-MM-DD HH:MM:SS` timestamps.
///
/// Values that do not parse are read as absent rather than rejected, since a
/// bad timestamp on one unit must not sink a whole aggregation pass.
pub mod timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    const ACCEPTED: [&str; 4] = [
        FORMAT,
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];

    /// Parse a timestamp in any accepted layout.
    pub fn parse(raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        ACCEPTED
            .iter()
            .find_map(|layout| NaiveDateTime::parse_from_str(raw, layout).ok())
    }

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_str(&ts.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
        Ok(raw.as_ref().and_then(serde_json::Value::as_str).and_then(parse))
    }
}

/// Durations arrive as JSON numbers or as decimal strings straight from the
/// database driver. Anything else reads as absent.
fn lenient_hours<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::Number(value)) => value.as_f64(),
        Some(serde_json::Value::String(text)) => text.trim().parse().ok(),
        _ => None,
    })
}

/// One stage checkpoint of a unit: when it passed and how long it took.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageEvent {
    /// Pass timestamp, absent while the stage has not been reached
    #[serde(default, with = "timestamp")]
    pub pass: Option<NaiveDateTime>,
    /// Stage duration in hours; may be negative because of clock skew
    #[serde(default, deserialize_with = "lenient_hours")]
    pub duration_hours: Option<f64>,
}

impl StageEvent {
    pub fn new(pass: Option<NaiveDateTime>, duration_hours: Option<f64>) -> Self {
        Self {
            pass,
            duration_hours,
        }
    }
}

/// A manufactured unit tracked through sequential test stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitRecord {
    /// Unit serial number, unique per project
    pub usn: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub batch: Option<String>,
    #[serde(default)]
    pub bay: Option<String>,
    #[serde(default)]
    pub rack_pn: Option<String>,
    /// Current-stage marker, e.g. `"Burn-in (MD)"`
    #[serde(default)]
    pub current_stage: Option<String>,
    #[serde(default, with = "timestamp")]
    pub test_start_time: Option<NaiveDateTime>,
    #[serde(default, alias = "ultima_actualizacion", with = "timestamp")]
    pub last_update: Option<NaiveDateTime>,
    #[serde(default)]
    pub stages: BTreeMap<String, StageEvent>,
}

impl UnitRecord {
    pub fn new<S: Into<String>>(usn: S) -> Self {
        Self {
            usn: usn.into(),
            ..Default::default()
        }
    }

    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_batch<S: Into<String>>(mut self, batch: S) -> Self {
        self.batch = Some(batch.into());
        self
    }

    pub fn with_bay<S: Into<String>>(mut self, bay: S) -> Self {
        self.bay = Some(bay.into());
        self
    }

    pub fn with_current_stage<S: Into<String>>(mut self, marker: S) -> Self {
        self.current_stage = Some(marker.into());
        self
    }

    pub fn with_test_start(mut self, start: Option<NaiveDateTime>) -> Self {
        self.test_start_time = start;
        self
    }

    pub fn with_stage<S: Into<String>>(
        mut self,
        code: S,
        pass: Option<NaiveDateTime>,
        duration_hours: Option<f64>,
    ) -> Self {
        self.stages
            .insert(code.into(), StageEvent::new(pass, duration_hours));
        self
    }

    pub fn stage(&self, code: &str) -> Option<&StageEvent> {
        self.stages.get(code)
    }

    pub fn pass_of(&self, code: &str) -> Option<NaiveDateTime> {
        self.stage(code).and_then(|event| event.pass)
    }

    pub fn duration_of(&self, code: &str) -> Option<f64> {
        self.stage(code).and_then(|event| event.duration_hours)
    }

    /// Batch label, treating blank labels as missing.
    pub fn batch_label(&self) -> Option<&str> {
        self.batch
            .as_deref()
            .map(str::trim)
            .filter(|label| !label.is_empty())
    }

    /// Bay label exactly as recorded; only an empty label is missing.
    pub fn bay_label(&self) -> Option<&str> {
        self.bay.as_deref().filter(|label| !label.is_empty())
    }
}

/// Summary statistics over a sample of hours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatSummary {
    pub avg: f64,
    pub p50: f64,
    pub p90: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    fn ts(raw: &str) -> NaiveDateTime {
        timestamp::parse(raw).unwrap()
    }

    #[test]
    fn test_timestamp_parse_layouts() {
        assert!(timestamp::parse("2026-02-02 10:00:00").is_some());
        assert!(timestamp::parse("2026-02-02T10:00:00").is_some());
        assert!(timestamp::parse("2026-02-02 10:00:00.250").is_some());
        assert_eq!(timestamp::parse(""), None);
        assert_eq!(timestamp::parse("0000-00-00 00:00:00"), None);
        assert_eq!(timestamp::parse("yesterday"), None);
    }

    #[test]
    fn test_unit_record_deserialize_full() {
        let json = r#"{
            "usn": "P658660550270012",
            "rack_pn": "R-1",
            "model": "C2195",
            "batch": "Batch 2",
            "current_stage": "Burn-in (MD)",
            "test_start_time": "2026-02-01 08:00:00",
            "ultima_actualizacion": "2026-02-03 09:30:00",
            "stages": {
                "RS": {"pass": "2026-02-02 10:00:00", "duration_hours": 1.5},
                "MD": {"pass": null, "duration_hours": "2.25"},
                "SU": {"pass": "garbage", "duration_hours": null}
            }
        }"#;

        let unit: UnitRecord = serde_json::from_str(json).unwrap();

        assert_eq!(unit.usn, "P658660550270012");
        assert_eq!(unit.batch_label(), Some("Batch 2"));
        assert_eq!(unit.bay, None);
        assert_eq!(unit.test_start_time, Some(ts("2026-02-01 08:00:00")));
        assert_eq!(unit.last_update, Some(ts("2026-02-03 09:30:00")));
        assert_eq!(unit.pass_of("RS"), Some(ts("2026-02-02 10:00:00")));
        assert_eq!(unit.duration_of("RS"), Some(1.5));
        assert_eq!(unit.duration_of("MD"), Some(2.25));
        assert_eq!(unit.pass_of("SU"), None);
        assert_eq!(unit.pass_of("BS"), None);
    }

    #[test]
    fn test_unit_record_deserialize__wrongly_typed_fields_are_absent() {
        let json = r#"{
            "usn": "U2",
            "test_start_time": 0,
            "last_update": {"date": "2026-02-03"},
            "stages": {
                "RS": {"pass": 1738490400, "duration_hours": true},
                "SU": {"pass": "2026-02-02 10:00:00", "duration_hours": [1.0]}
            }
        }"#;

        let unit: UnitRecord = serde_json::from_str(json).unwrap();

        assert_eq!(unit.test_start_time, None);
        assert_eq!(unit.last_update, None);
        assert_eq!(unit.pass_of("RS"), None);
        assert_eq!(unit.duration_of("RS"), None);
        assert_eq!(unit.pass_of("SU"), Some(ts("2026-02-02 10:00:00")));
        assert_eq!(unit.duration_of("SU"), None);
    }

    #[test]
    fn test_unit_record_deserialize_minimal() {
        let unit: UnitRecord = serde_json::from_str(r#"{"usn": "U1"}"#).unwrap();
        assert_eq!(unit, UnitRecord::new("U1"));
        assert!(unit.stages.is_empty());
    }

    #[test]
    fn test_blank_labels_are_missing() {
        let unit = UnitRecord::new("U1").with_batch("   ").with_bay("");
        assert_eq!(unit.batch_label(), None);
        assert_eq!(unit.bay_label(), None);

        let unit = UnitRecord::new("U2").with_bay("BAY_1 ");
        assert_eq!(unit.bay_label(), Some("BAY_1 "));
    }

    #[test]
    fn test_unit_record_serialize_uses_canonical_timestamp() {
        let unit = UnitRecord::new("U1").with_stage("RS", Some(ts("2026-02-02T10:00:00")), None);
        let json = serde_json::to_value(&unit).unwrap();
        assert_eq!(json["stages"]["RS"]["pass"], "2026-02-02 10:00:00");
        assert!(json["test_start_time"].is_null());
    }
}
