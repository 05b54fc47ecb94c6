//! BLE transport for Victron advertisement frames.
//!
//! The transport is a passive producer: it filters advertisements on the
//! Victron manufacturer ID and delivers `(address, raw bytes)` pairs over a
//! bounded channel. Decryption and decoding happen downstream in the
//! engine.

#[cfg(feature = "bluer")]
pub mod bluer;

use crate::mac_address::MacAddress;
use thiserror::Error;
#[cfg(feature = "bluer")]
use tokio::sync::mpsc;

/// One raw advertisement frame as delivered by the transport layer.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub mac: MacAddress,
    pub data: Vec<u8>,
}

/// Error type for scanner operations.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Bluetooth/adapter related error
    #[error("Bluetooth error: {0}")]
    Bluetooth(String),
}

/// Victron Energy manufacturer ID (little-endian bytes for pattern
/// matching).
///
/// Bluetooth LE advertisements use little-endian byte order for
/// manufacturer IDs; this is the byte representation of 0x02E1 used for
/// filtering advertisements.
#[cfg(feature = "bluer")]
pub const VICTRON_MANUFACTURER_ID_BYTES: [u8; 2] = [0xE1, 0x02];

/// Victron Energy manufacturer ID for data lookup (big-endian, 0x02E1).
#[cfg(feature = "bluer")]
pub const VICTRON_MANUFACTURER_ID: u16 = 0x02E1;

/// Bluetooth manufacturer-specific data type (AD type 0xFF)
#[cfg(feature = "bluer")]
pub const MANUFACTURER_DATA_TYPE: u8 = 0xff;

/// Channel buffer size for raw frames.
pub const FRAME_CHANNEL_BUFFER_SIZE: usize = 100;

/// Start a scanning session with the compiled-in backend.
#[cfg(feature = "bluer")]
pub async fn start_scan() -> Result<mpsc::Receiver<RawFrame>, ScanError> {
    bluer::start_scan().await
}
