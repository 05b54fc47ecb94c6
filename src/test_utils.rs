//! Shared fixtures for unit tests and benches.

use crate::config::ConfiguredDevice;
use crate::decode::{DecodeError, FrameDecoder};
use crate::mac_address::MacAddress;
use crate::reading::{DeviceKind, Reading};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A stable MAC address for unit tests.
pub const TEST_MAC: MacAddress = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

/// A stable advertisement key for unit tests.
pub const TEST_KEY: [u8; 16] = [
    0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
    0x10,
];

/// Registry entry for the "house" battery at [`TEST_MAC`].
pub fn house_device() -> ConfiguredDevice {
    ConfiguredDevice {
        id: "house".to_string(),
        mac: TEST_MAC,
        key: TEST_KEY,
        secondary_battery: None,
    }
}

/// Same as [`house_device`] with a configured secondary battery.
pub fn house_device_with_secondary(secondary: &str) -> ConfiguredDevice {
    ConfiguredDevice {
        secondary_battery: Some(secondary.to_string()),
        ..house_device()
    }
}

/// Decoder returning a canned reading, counting kind detections.
pub struct FakeDecoder {
    reading: Option<Reading>,
    pub detections: Arc<AtomicUsize>,
}

impl FakeDecoder {
    pub fn new(reading: Reading) -> Self {
        Self {
            reading: Some(reading),
            detections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A decoder that recognizes no device kind at all.
    pub fn unknown() -> Self {
        Self {
            reading: None,
            detections: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl FrameDecoder for FakeDecoder {
    fn detect_kind(&self, _frame: &[u8]) -> Result<DeviceKind, DecodeError> {
        self.detections.fetch_add(1, Ordering::SeqCst);
        match &self.reading {
            Some(reading) => Ok(reading.kind()),
            None => Err(DecodeError::UnknownDeviceKind { record_type: 0xEE }),
        }
    }

    fn decode(
        &self,
        _key: &[u8; 16],
        _kind: DeviceKind,
        _frame: &[u8],
    ) -> Result<Reading, DecodeError> {
        self.reading
            .clone()
            .ok_or(DecodeError::UnknownDeviceKind { record_type: 0xEE })
    }
}
