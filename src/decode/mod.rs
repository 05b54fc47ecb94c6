//! Frame decoder boundary.
//!
//! The engine never inspects ciphertext: it hands `(key, raw_bytes)` to a
//! [`FrameDecoder`] and gets back a typed [`Reading`] or a typed error. The
//! production implementation lives in [`victron`]; tests inject fakes.

pub mod victron;

use crate::reading::{DeviceKind, Reading};
use thiserror::Error;

/// Error types for decoding advertisement frames.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Frame decodes but matches no known device kind. Logged and dropped.
    #[error("unknown device kind (record type {record_type:#04x})")]
    UnknownDeviceKind { record_type: u8 },
    /// Malformed or truncated frame.
    #[error("malformed frame: {0}")]
    Malformed(String),
    /// The configured key does not match the frame's key check byte.
    #[error("advertisement key does not match frame")]
    KeyMismatch,
}

/// Decodes encrypted advertisement frames into typed readings.
pub trait FrameDecoder: Send {
    /// Detect the device kind from the frame's type discriminator, without
    /// decrypting the payload.
    fn detect_kind(&self, frame: &[u8]) -> Result<DeviceKind, DecodeError>;

    /// Decrypt and parse a frame already known to be of `kind`.
    fn decode(&self, key: &[u8; 16], kind: DeviceKind, frame: &[u8])
        -> Result<Reading, DecodeError>;
}
