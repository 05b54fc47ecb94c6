//! Startup configuration for the device roster.
//!
//! One JSON document is read from stdin before the scan loop starts:
//!
//! ```json
//! {"devices": [{"mac": "aa:bb:cc:dd:ee:ff", "id": "house", "key": "<32 hex chars>", "secondary_battery": "starter"}]}
//! ```
//!
//! There is no dynamic reconfiguration after startup.

use crate::mac_address::{MacAddress, ParseMacError};
use serde::Deserialize;
use thiserror::Error;

/// Length of a Victron advertisement encryption key in bytes.
pub const ADVERTISEMENT_KEY_LEN: usize = 16;

/// Raw configuration document as supplied on stdin.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub devices: Vec<DeviceEntry>,
}

/// One raw device entry from the configuration document.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceEntry {
    pub mac: String,
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub secondary_battery: Option<String>,
}

/// A validated device roster entry, immutable for the process lifetime.
///
/// `id` is the stable logical name used in every emitted path.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfiguredDevice {
    pub id: String,
    pub mac: MacAddress,
    pub key: [u8; ADVERTISEMENT_KEY_LEN],
    pub secondary_battery: Option<String>,
}

/// Errors raised while parsing and validating the configuration document.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("device '{id}': {source}")]
    Mac {
        id: String,
        #[source]
        source: ParseMacError,
    },
    #[error("device '{id}': key must be 32 hex characters")]
    Key { id: String },
}

/// Parse the startup JSON document into validated device entries.
pub fn parse(document: &str) -> Result<Vec<ConfiguredDevice>, ConfigError> {
    let config: Config = serde_json::from_str(document)?;
    config.devices.into_iter().map(validate).collect()
}

fn validate(entry: DeviceEntry) -> Result<ConfiguredDevice, ConfigError> {
    let mac: MacAddress = entry.mac.parse().map_err(|source| ConfigError::Mac {
        id: entry.id.clone(),
        source,
    })?;
    let key = parse_key(&entry.key).ok_or_else(|| ConfigError::Key {
        id: entry.id.clone(),
    })?;
    Ok(ConfiguredDevice {
        id: entry.id,
        mac,
        key,
        secondary_battery: entry.secondary_battery,
    })
}

fn parse_key(key: &str) -> Option<[u8; ADVERTISEMENT_KEY_LEN]> {
    let bytes = hex::decode(key).ok()?;
    bytes.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_HEX: &str = "0102030405060708090a0b0c0d0e0f10";

    #[test]
    fn test_parse_single_device() {
        let doc = format!(
            r#"{{"devices": [{{"mac": "AA:BB:CC:DD:EE:FF", "id": "house", "key": "{KEY_HEX}"}}]}}"#
        );
        let devices = parse(&doc).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, "house");
        assert_eq!(devices[0].mac, "aa:bb:cc:dd:ee:ff".parse().unwrap());
        assert_eq!(devices[0].key[0], 0x01);
        assert_eq!(devices[0].key[15], 0x10);
        assert_eq!(devices[0].secondary_battery, None);
    }

    #[test]
    fn test_parse_secondary_battery() {
        let doc = format!(
            r#"{{"devices": [{{"mac": "aa:bb:cc:dd:ee:ff", "id": "house", "key": "{KEY_HEX}", "secondary_battery": "starter"}}]}}"#
        );
        let devices = parse(&doc).unwrap();
        assert_eq!(devices[0].secondary_battery.as_deref(), Some("starter"));
    }

    #[test]
    fn test_parse_rejects_bad_mac() {
        let doc = format!(r#"{{"devices": [{{"mac": "nope", "id": "house", "key": "{KEY_HEX}"}}]}}"#);
        assert!(matches!(parse(&doc), Err(ConfigError::Mac { .. })));
    }

    #[test]
    fn test_parse_rejects_bad_key() {
        let doc = r#"{"devices": [{"mac": "aa:bb:cc:dd:ee:ff", "id": "house", "key": "abc"}]}"#;
        assert!(matches!(parse(doc), Err(ConfigError::Key { .. })));
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        assert!(matches!(parse("not json"), Err(ConfigError::Json(_))));
    }
}
