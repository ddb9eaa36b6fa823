use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// One device log entry as returned by `GET /api/logs`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogRecord {
    /// Storage row id assigned by the backend.
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub device_id: Option<String>,
    pub log_id: i64,
    pub log_message: String,
    pub log_sourcefile: String,
    pub log_codeline: i64,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub received_at: Option<DateTime<Utc>>,
    /// Device-side clock, epoch seconds.
    #[serde(default)]
    pub creation_timestamp: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub device_status: DeviceStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub additional_info: BTreeMap<String, serde_json::Value>,
}

/// Scalar telemetry value. Anything nested is rejected at decode time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StatusValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Absent,
}

impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusValue::Bool(b) => write!(f, "{}", b),
            StatusValue::Integer(i) => write!(f, "{}", i),
            StatusValue::Float(x) => write!(f, "{}", x),
            StatusValue::Text(s) => f.write_str(s),
            StatusValue::Absent => f.write_str("N/A"),
        }
    }
}

/// Open key/value snapshot of device telemetry. Keys are server-defined.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct DeviceStatus(BTreeMap<String, StatusValue>);

impl DeviceStatus {
    /// Present, non-null value for `key`.
    pub fn get(&self, key: &str) -> Option<&StatusValue> {
        self.0.get(key).filter(|v| **v != StatusValue::Absent)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &StatusValue)> {
        self.0.iter()
    }
}

impl FromIterator<(String, StatusValue)> for DeviceStatus {
    fn from_iter<I: IntoIterator<Item = (String, StatusValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Records from one fetch, in server order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogBatch {
    records: Vec<LogRecord>,
}

impl LogBatch {
    pub fn new(records: Vec<LogRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&LogRecord> {
        self.records.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LogRecord> {
        self.records.iter()
    }
}

impl From<Vec<LogRecord>> for LogBatch {
    fn from(records: Vec<LogRecord>) -> Self {
        Self::new(records)
    }
}

/// Response body of `GET /api/logs`.
#[derive(Debug, Deserialize)]
pub struct LogsResponse {
    pub logs: Vec<LogRecord>,
}

impl From<LogsResponse> for LogBatch {
    fn from(response: LogsResponse) -> Self {
        Self::new(response.logs)
    }
}

/// Parses the timestamp shapes the backend has been seen to emit: RFC 3339,
/// naive ISO-8601 (taken as UTC), and epoch seconds.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    raw.parse::<f64>().ok().and_then(from_epoch_seconds)
}

pub fn from_epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = (((secs - whole) * 1e9).round() as u32).min(999_999_999);
    DateTime::from_timestamp(whole as i64, nanos)
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => parse_timestamp(&s)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {:?}", s))),
        Some(serde_json::Value::Number(n)) => n
            .as_f64()
            .and_then(from_epoch_seconds)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid epoch timestamp: {}", n))),
        Some(other) => Err(de::Error::custom(format!(
            "expected timestamp string or number, got {}",
            other
        ))),
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}


#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "logs": [
            {
                "id": 7,
                "device_id": "AA:BB:CC:DD:EE:FF",
                "access_token": "secret",
                "creation_timestamp": 1714564790,
                "log_id": 12,
                "log_message": "WiFi connection failed",
                "log_codeline": 588,
                "log_sourcefile": "src/bl.cpp",
                "device_status": {
                    "wifi_rssi_level": -67,
                    "wifi_status": "connected",
                    "battery_voltage": 4.12,
                    "current_fw_version": "1.5.2",
                    "rssi": null
                },
                "additional_info": {"retry_count": 3},
                "received_at": "2024-05-01T12:00:00.123456"
            }
        ]
    }"#;

    #[test]
    fn decodes_backend_response() {
        let response: LogsResponse = serde_json::from_str(SAMPLE).unwrap();
        let batch = LogBatch::from(response);
        assert_eq!(batch.len(), 1);

        let record = batch.get(0).unwrap();
        assert_eq!(record.id, Some(7));
        assert_eq!(record.log_id, 12);
        assert_eq!(record.log_codeline, 588);
        assert_eq!(
            record.device_status.get("wifi_rssi_level"),
            Some(&StatusValue::Integer(-67))
        );
        assert_eq!(
            record.device_status.get("battery_voltage"),
            Some(&StatusValue::Float(4.12))
        );
        assert_eq!(record.device_status.get("rssi"), None);
        assert_eq!(record.additional_info["retry_count"], serde_json::json!(3));

        let received = record.received_at.unwrap();
        assert_eq!(received.to_rfc3339(), "2024-05-01T12:00:00.123456+00:00");
    }

    #[test]
    fn optional_fields_may_be_null_or_missing() {
        let json = r#"{
            "device_id": null,
            "log_id": 0,
            "log_message": "Display request",
            "log_codeline": 0,
            "log_sourcefile": "api/display",
            "device_status": null,
            "received_at": null
        }"#;
        let record: LogRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.device_id, None);
        assert_eq!(record.received_at, None);
        assert!(record.device_status.iter().next().is_none());
        assert!(record.additional_info.is_empty());
    }

    #[test]
    fn nested_status_values_are_rejected() {
        let json = r#"{
            "log_id": 1, "log_message": "x", "log_codeline": 1, "log_sourcefile": "a",
            "device_status": {"nested": {"a": 1}}
        }"#;
        assert!(serde_json::from_str::<LogRecord>(json).is_err());
    }

    #[test]
    fn parses_timestamp_variants() {
        let expected = DateTime::from_timestamp(1_714_564_800, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-01T12:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T14:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T12:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 12:00:00"), Some(expected));
        assert_eq!(parse_timestamp("1714564800"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn numeric_received_at_is_epoch_seconds() {
        let json = r#"{
            "log_id": 1, "log_message": "x", "log_codeline": 1, "log_sourcefile": "a",
            "received_at": 1714564800.5
        }"#;
        let record: LogRecord = serde_json::from_str(json).unwrap();
        let received = record.received_at.unwrap();
        assert_eq!(received.timestamp(), 1_714_564_800);
        assert_eq!(received.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn status_values_display_like_json_scalars() {
        assert_eq!(StatusValue::Float(4.0).to_string(), "4");
        assert_eq!(StatusValue::Float(3.7).to_string(), "3.7");
        assert_eq!(StatusValue::Integer(-60).to_string(), "-60");
        assert_eq!(StatusValue::Bool(true).to_string(), "true");
        assert_eq!(StatusValue::Absent.to_string(), "N/A");
    }
}
