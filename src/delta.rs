//! Signal K delta envelope assembly.

use crate::mac_address::MacAddress;
use crate::transform::PathValue;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Fixed source label identifying the vendor.
pub const SOURCE_LABEL: &str = "Victron";

/// Fixed transport kind of every emitted delta.
pub const SOURCE_TYPE: &str = "Bluetooth";

/// Origin descriptor of one update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub label: &'static str,
    #[serde(rename = "type")]
    pub transport: &'static str,
    pub src: String,
}

/// One timestamped set of observations from a single source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Update {
    pub source: Source,
    /// ISO-8601 UTC with a trailing literal `Z`.
    pub timestamp: String,
    pub values: Vec<PathValue>,
}

/// The canonical delta document: one update per received frame, never
/// batched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delta {
    pub updates: Vec<Update>,
}

/// Wrap transformed values into a delta, capturing the timestamp now.
///
/// An empty value sequence still produces a valid (if vacuous) delta;
/// callers choose not to emit in that case.
pub fn assemble(source_address: MacAddress, values: Vec<PathValue>) -> Delta {
    assemble_at(source_address, values, Utc::now())
}

fn assemble_at(source_address: MacAddress, values: Vec<PathValue>, at: DateTime<Utc>) -> Delta {
    Delta {
        updates: vec![Update {
            source: Source {
                label: SOURCE_LABEL,
                transport: SOURCE_TYPE,
                src: source_address.to_string(),
            },
            timestamp: at.to_rfc3339_opts(SecondsFormat::Micros, true),
            values,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TEST_MAC;
    use crate::transform::FieldValue;
    use chrono::TimeZone;

    fn values() -> Vec<PathValue> {
        vec![PathValue {
            path: "electrical.batteries.house.voltage".to_string(),
            value: FieldValue::Number(12.6),
        }]
    }

    #[test]
    fn test_assemble_shape() {
        let timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 45).unwrap();
        let delta = assemble_at(TEST_MAC, values(), timestamp);

        assert_eq!(delta.updates.len(), 1);
        let update = &delta.updates[0];
        assert_eq!(update.source.label, "Victron");
        assert_eq!(update.source.transport, "Bluetooth");
        assert_eq!(update.source.src, "aa:bb:cc:dd:ee:ff");
        assert_eq!(update.timestamp, "2024-05-01T12:30:45.000000Z");
        assert_eq!(update.values, values());
    }

    #[test]
    fn test_assemble_timestamp_has_trailing_z() {
        let delta = assemble(TEST_MAC, values());
        assert!(delta.updates[0].timestamp.ends_with('Z'));
    }

    #[test]
    fn test_assemble_allows_empty_values() {
        let delta = assemble(TEST_MAC, Vec::new());
        assert!(delta.updates[0].values.is_empty());
    }

    #[test]
    fn test_delta_json_shape() {
        let timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 45).unwrap();
        let delta = assemble_at(TEST_MAC, values(), timestamp);
        let json = serde_json::to_string(&delta).unwrap();
        assert_eq!(
            json,
            r#"{"updates":[{"source":{"label":"Victron","type":"Bluetooth","src":"aa:bb:cc:dd:ee:ff"},"timestamp":"2024-05-01T12:30:45.000000Z","values":[{"path":"electrical.batteries.house.voltage","value":12.6}]}]}"#
        );
    }
}
