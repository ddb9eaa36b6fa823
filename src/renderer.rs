//! Pure mapping from a [`LogBatch`] to the structure shown on screen, plus the
//! text painter used by the terminal front end.

use crate::types::{DeviceStatus, LogBatch, LogRecord};
use chrono::{DateTime, Utc};
use std::fmt;

const PREVIEW_CHARS: usize = 80;
const ELLIPSIS: &str = "...";
const NOT_AVAILABLE: &str = "N/A";
const EMPTY_PLACEHOLDER: &str = "No logs found.";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogClass {
    Error,
    Warning,
    Normal,
}

impl LogClass {
    fn tag(self) -> &'static str {
        match self {
            LogClass::Error => "ERROR",
            LogClass::Warning => "WARN",
            LogClass::Normal => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub label: String,
    pub value: String,
}

impl Field {
    fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Collapsed one-line view of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub preview: String,
    pub device: String,
    pub timestamp: String,
}

/// Everything shown once an entry is expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detail {
    pub message: String,
    pub fields: Vec<Field>,
    pub device_status: Vec<Field>,
    pub additional_info: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntryView {
    pub class: LogClass,
    pub summary: Summary,
    pub detail: Detail,
    pub expanded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEntry {
    Placeholder(String),
    Log(LogEntryView),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayTree {
    entries: Vec<DisplayEntry>,
}

impl DisplayTree {
    pub fn entries(&self) -> &[DisplayEntry] {
        &self.entries
    }

    /// Flips the expanded flag of the entry at `index` (0-based). Returns false
    /// for the placeholder or an index past the end.
    pub fn toggle(&mut self, index: usize) -> bool {
        match self.entries.get_mut(index) {
            Some(DisplayEntry::Log(entry)) => {
                entry.expanded = !entry.expanded;
                true
            }
            _ => false,
        }
    }
}

pub fn render(batch: &LogBatch) -> DisplayTree {
    if batch.is_empty() {
        return DisplayTree {
            entries: vec![DisplayEntry::Placeholder(EMPTY_PLACEHOLDER.to_string())],
        };
    }

    DisplayTree {
        entries: batch
            .iter()
            .map(|record| DisplayEntry::Log(render_record(record)))
            .collect(),
    }
}

/// First matching rule wins: error words beat warning words.
pub fn classify(message: &str) -> LogClass {
    let lower = message.to_lowercase();
    if lower.contains("error") || lower.contains("failed") {
        LogClass::Error
    } else if lower.contains("warning") || lower.contains("warn") {
        LogClass::Warning
    } else {
        LogClass::Normal
    }
}

pub fn truncate_preview(message: &str) -> String {
    match message.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}{}", &message[..cut], ELLIPSIS),
        None => message.to_string(),
    }
}

fn render_record(record: &LogRecord) -> LogEntryView {
    let device = record
        .device_id
        .clone()
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    let received = format_time(record.received_at);
    let created = format_time(
        record
            .creation_timestamp
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
    );
    let status = &record.device_status;

    let fields = vec![
        Field::new("Device ID", device.clone()),
        Field::new("Log ID", record.log_id.to_string()),
        Field::new(
            "Source",
            format!("{}:{}", record.log_sourcefile, record.log_codeline),
        ),
        Field::new("Received", received.clone()),
        Field::new("Created", created),
        Field::new(
            "Firmware Version",
            status_value(status, &["current_fw_version", "fw_version"], ""),
        ),
        Field::new("Battery", status_value(status, &["battery_voltage"], " V")),
        Field::new(
            "WiFi RSSI",
            status_value(status, &["wifi_rssi_level", "rssi"], " dBm"),
        ),
    ];

    let device_status = status
        .iter()
        .map(|(key, value)| Field::new(humanize_key(key), value.to_string()))
        .collect();

    let additional_info = record
        .additional_info
        .iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => NOT_AVAILABLE.to_string(),
                other => other.to_string(),
            };
            Field::new(humanize_key(key), value)
        })
        .collect();

    LogEntryView {
        class: classify(&record.log_message),
        summary: Summary {
            preview: truncate_preview(&record.log_message),
            device,
            timestamp: received,
        },
        detail: Detail {
            message: record.log_message.clone(),
            fields,
            device_status,
            additional_info,
        },
        expanded: false,
    }
}

/// First present key wins; a missing value still carries its unit.
fn status_value(status: &DeviceStatus, keys: &[&str], unit: &str) -> String {
    let value = keys
        .iter()
        .find_map(|key| status.get(key))
        .map(|v| v.to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    format!("{}{}", value, unit)
}

fn humanize_key(key: &str) -> String {
    key.replace('_', " ")
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format(TIME_FORMAT).to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

impl fmt::Display for DisplayTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, entry) in self.entries().iter().enumerate() {
            match entry {
                DisplayEntry::Placeholder(text) => writeln!(f, "{}", text)?,
                DisplayEntry::Log(entry) => paint_entry(f, index + 1, entry)?,
            }
        }
        Ok(())
    }
}

fn paint_entry(f: &mut fmt::Formatter<'_>, number: usize, entry: &LogEntryView) -> fmt::Result {
    let marker = if entry.expanded { '-' } else { '+' };
    writeln!(
        f,
        "[{}] {} {:<5} {} | {} | {}",
        number,
        marker,
        entry.class.tag(),
        entry.summary.preview,
        entry.summary.device,
        entry.summary.timestamp
    )?;
    if !entry.expanded {
        return Ok(());
    }

    let detail = &entry.detail;
    writeln!(f, "      Message: {}", detail.message)?;
    for field in &detail.fields {
        writeln!(f, "      {}: {}", field.label, field.value)?;
    }
    for (title, fields) in [
        ("Device Status", &detail.device_status),
        ("Additional Info", &detail.additional_info),
    ] {
        if fields.is_empty() {
            continue;
        }
        writeln!(f, "      {}:", title)?;
        for field in fields {
            writeln!(f, "        {}: {}", field.label, field.value)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::{batch, record};
    use crate::types::StatusValue;

    fn only_entry(tree: &DisplayTree) -> &LogEntryView {
        match &tree.entries()[0] {
            DisplayEntry::Log(entry) => entry,
            other => panic!("expected a log entry, got {:?}", other),
        }
    }

    fn field<'a>(fields: &'a [Field], label: &str) -> &'a str {
        &fields
            .iter()
            .find(|f| f.label == label)
            .unwrap_or_else(|| panic!("missing field {}", label))
            .value
    }

    #[test]
    fn classification_order() {
        assert_eq!(classify("Warning: failed to connect"), LogClass::Error);
        assert_eq!(classify("ERROR in warning handler"), LogClass::Error);
        assert_eq!(classify("Battery WARN"), LogClass::Warning);
        assert_eq!(classify("a Warning appeared"), LogClass::Warning);
        assert_eq!(classify("Woke up from deep sleep"), LogClass::Normal);
    }

    #[test]
    fn long_messages_are_truncated_in_summary_only() {
        let message = "x".repeat(90);
        let tree = render(&vec![record(1, &message)].into());
        let entry = only_entry(&tree);

        assert_eq!(entry.summary.preview, format!("{}...", "x".repeat(80)));
        assert_eq!(entry.detail.message, message);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let message = "ä".repeat(81);
        assert_eq!(truncate_preview(&message), format!("{}...", "ä".repeat(80)));
        assert_eq!(truncate_preview(&"ä".repeat(80)), "ä".repeat(80));
    }

    #[test]
    fn empty_batch_renders_one_placeholder() {
        let tree = render(&batch(&[]));
        assert_eq!(
            tree.entries(),
            &[DisplayEntry::Placeholder("No logs found.".to_string())]
        );
        assert_eq!(tree.to_string(), "No logs found.\n");
    }

    #[test]
    fn rendering_is_idempotent() {
        let logs = batch(&[3, 2, 1]);
        assert_eq!(render(&logs), render(&logs));
    }

    #[test]
    fn missing_status_fields_keep_units() {
        let tree = render(&vec![record(1, "boot")].into());
        let fields = &only_entry(&tree).detail.fields;

        assert_eq!(field(fields, "Firmware Version"), "N/A");
        assert_eq!(field(fields, "Battery"), "N/A V");
        assert_eq!(field(fields, "WiFi RSSI"), "N/A dBm");
        assert_eq!(field(fields, "Source"), "src/bl.cpp:42");
        assert_eq!(field(fields, "Received"), "2024-05-01 12:00:01 UTC");

        // A reported zero is a value, not a missing field.
        let mut rec = record(2, "boot");
        rec.device_status = [
            ("battery_voltage".to_string(), StatusValue::Float(0.0)),
            ("wifi_rssi_level".to_string(), StatusValue::Integer(0)),
        ]
        .into_iter()
        .collect();
        let tree = render(&vec![rec].into());
        let fields = &only_entry(&tree).detail.fields;
        assert_eq!(field(fields, "Battery"), "0 V");
        assert_eq!(field(fields, "WiFi RSSI"), "0 dBm");
    }

    #[test]
    fn status_fields_fall_back_to_display_request_keys() {
        let mut rec = record(1, "Display request - 800x480");
        rec.device_status = [
            ("fw_version".to_string(), StatusValue::Text("1.4.0".to_string())),
            ("rssi".to_string(), StatusValue::Integer(-71)),
            ("battery_voltage".to_string(), StatusValue::Float(3.9)),
            ("refresh_rate".to_string(), StatusValue::Absent),
        ]
        .into_iter()
        .collect();

        let tree = render(&vec![rec].into());
        let detail = &only_entry(&tree).detail;

        assert_eq!(field(&detail.fields, "Firmware Version"), "1.4.0");
        assert_eq!(field(&detail.fields, "Battery"), "3.9 V");
        assert_eq!(field(&detail.fields, "WiFi RSSI"), "-71 dBm");
        assert_eq!(field(&detail.device_status, "refresh rate"), "N/A");
        assert_eq!(field(&detail.device_status, "fw version"), "1.4.0");
    }

    #[test]
    fn additional_info_is_listed() {
        let mut rec = record(1, "boot");
        rec.additional_info
            .insert("retry_count".to_string(), serde_json::json!(3));
        rec.additional_info
            .insert("reason".to_string(), serde_json::json!("timer"));

        let tree = render(&vec![rec].into());
        let info = &only_entry(&tree).detail.additional_info;
        assert_eq!(field(info, "retry count"), "3");
        assert_eq!(field(info, "reason"), "timer");
    }

    #[test]
    fn missing_device_and_time_show_placeholder() {
        let mut rec = record(1, "boot");
        rec.device_id = None;
        rec.received_at = None;

        let tree = render(&vec![rec].into());
        let summary = &only_entry(&tree).summary;
        assert_eq!(summary.device, "N/A");
        assert_eq!(summary.timestamp, "N/A");
    }

    #[test]
    fn toggle_expands_and_collapses() {
        let mut tree = render(&batch(&[2, 1]));
        assert!(tree.toggle(1));
        assert!(tree.to_string().contains("Message: message 1"));
        assert!(!tree.to_string().contains("Message: message 2"));

        assert!(tree.toggle(1));
        assert!(!tree.to_string().contains("Message:"));
        assert!(!tree.toggle(5));
    }

    #[test]
    fn placeholder_cannot_be_toggled() {
        let mut tree = render(&batch(&[]));
        assert!(!tree.toggle(0));
    }

    #[test]
    fn painted_summary_line() {
        let tree = render(&vec![record(3, "Sensor read error")].into());
        assert_eq!(
            tree.to_string(),
            "[1] + ERROR Sensor read error | AA:BB:CC:DD:EE:FF | 2024-05-01 12:00:03 UTC\n"
        );
    }
}
