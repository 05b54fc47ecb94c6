//! Immutable-after-load device roster keyed by MAC address.

use crate::config::ConfiguredDevice;
use crate::mac_address::MacAddress;
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while building the registry.
#[derive(Error, Debug, PartialEq)]
pub enum RegistryError {
    #[error("duplicate MAC address in configuration: {0}")]
    DuplicateMac(MacAddress),
}

/// Mapping from transport address to configured logical device.
///
/// Built once from configuration at startup and read-only afterwards, so it
/// needs no synchronization. Lookups are case-insensitive on the original
/// MAC string because keys are parsed byte addresses.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: HashMap<MacAddress, ConfiguredDevice>,
}

impl DeviceRegistry {
    /// Build a registry from validated configuration entries.
    pub fn load(
        devices: impl IntoIterator<Item = ConfiguredDevice>,
    ) -> Result<Self, RegistryError> {
        let mut map = HashMap::new();
        for device in devices {
            let mac = device.mac;
            if map.insert(mac, device).is_some() {
                return Err(RegistryError::DuplicateMac(mac));
            }
        }
        Ok(Self { devices: map })
    }

    /// Look up the configured device for a transport address.
    ///
    /// `None` means "not ours": callers ignore the frame rather than treat
    /// this as an error.
    pub fn lookup(&self, address: MacAddress) -> Option<&ConfiguredDevice> {
        self.devices.get(&address)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TEST_KEY, TEST_MAC};

    fn device(id: &str, mac: MacAddress) -> ConfiguredDevice {
        ConfiguredDevice {
            id: id.to_string(),
            mac,
            key: TEST_KEY,
            secondary_battery: None,
        }
    }

    #[test]
    fn test_lookup_registered() {
        let registry = DeviceRegistry::load([device("house", TEST_MAC)]).unwrap();
        assert_eq!(registry.lookup(TEST_MAC).unwrap().id, "house");
    }

    #[test]
    fn test_lookup_is_case_insensitive_on_source_string() {
        let mac: MacAddress = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        let registry = DeviceRegistry::load([device("house", mac)]).unwrap();

        let lower: MacAddress = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        assert_eq!(registry.lookup(lower).unwrap().id, "house");
    }

    #[test]
    fn test_lookup_unregistered_is_none() {
        let registry = DeviceRegistry::load([device("house", TEST_MAC)]).unwrap();
        let other = MacAddress([0; 6]);
        assert!(registry.lookup(other).is_none());
    }

    #[test]
    fn test_load_rejects_duplicate_mac() {
        let result = DeviceRegistry::load([device("a", TEST_MAC), device("b", TEST_MAC)]);
        assert_eq!(result.unwrap_err(), RegistryError::DuplicateMac(TEST_MAC));
    }
}
