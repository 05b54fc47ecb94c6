//! Device identity resolution: key lookup plus a per-address kind cache.

use crate::config::ConfiguredDevice;
use crate::decode::{DecodeError, FrameDecoder};
use crate::mac_address::MacAddress;
use crate::reading::{DeviceKind, Reading};
use crate::registry::DeviceRegistry;
use std::collections::HashMap;
use thiserror::Error;

/// Per-frame failures. All are local: one bad frame never aborts the
/// process or corrupts state for subsequent frames.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    /// Address not registered. Expected for other devices in range and
    /// silently dropped by the caller.
    #[error("no advertisement key for {0}")]
    KeyMissing(MacAddress),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Resolves transport addresses to configured devices and decodes their
/// frames, caching the detected device kind per address.
///
/// The cache is created lazily on the first successfully decoded frame from
/// an address and kept for the process lifetime; it is owned by the engine,
/// so it survives supervised restarts of the scanning session. Mutation
/// happens only from the single frame-processing context.
pub struct IdentityResolver<D> {
    registry: DeviceRegistry,
    decoder: D,
    kinds: HashMap<MacAddress, DeviceKind>,
}

impl<D: FrameDecoder> IdentityResolver<D> {
    pub fn new(registry: DeviceRegistry, decoder: D) -> Self {
        Self {
            registry,
            decoder,
            kinds: HashMap::new(),
        }
    }

    /// The configured device for an address, if registered.
    pub fn device(&self, address: MacAddress) -> Option<&ConfiguredDevice> {
        self.registry.lookup(address)
    }

    /// Decode one raw frame from `address` into a typed reading.
    ///
    /// The kind detection runs once per address; later frames decode
    /// directly with the cached kind.
    pub fn resolve(&mut self, address: MacAddress, frame: &[u8]) -> Result<Reading, FrameError> {
        let device = self
            .registry
            .lookup(address)
            .ok_or(FrameError::KeyMissing(address))?;
        let key = device.key;

        let kind = match self.kinds.get(&address) {
            Some(kind) => *kind,
            None => {
                let kind = self.decoder.detect_kind(frame)?;
                self.kinds.insert(address, kind);
                kind
            }
        };

        Ok(self.decoder.decode(&key, kind, frame)?)
    }

    /// Number of addresses with a cached device kind.
    pub fn cached_kinds(&self) -> usize {
        self.kinds.len()
    }
}
