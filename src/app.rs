//! Core engine and scan supervisor.
//!
//! This module is decoupled from CLI parsing and process exit codes so it
//! can be tested deterministically with an injected transport, decoder and
//! output stream.

use crate::decode::{DecodeError, FrameDecoder};
use crate::delta::assemble;
use crate::emitter::Emitter;
use crate::registry::DeviceRegistry;
use crate::resolver::{FrameError, IdentityResolver};
use crate::scanner::{RawFrame, ScanError};
use crate::transform::transform;
use std::future::Future;
use std::io::{self, Write};
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Fixed delay before a failed scanning session is restarted.
pub const RESTART_BACKOFF: Duration = Duration::from_secs(5);

/// Errors that abort the run loop.
///
/// Per-frame failures never surface here; only the output sink is fatal,
/// because downstream delivery is assumed critical.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("output failure: {0}")]
    Output(#[from] io::Error),
}

/// Transport abstraction to enable deterministic unit tests without
/// Bluetooth hardware.
pub trait Transport: Send + Sync {
    fn start_session(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<RawFrame>, ScanError>> + Send + '_>>;
}

/// Real transport that delegates to the compiled-in BLE backend.
#[cfg(feature = "bluer")]
#[derive(Debug, Default, Clone, Copy)]
pub struct BleTransport;

#[cfg(feature = "bluer")]
impl Transport for BleTransport {
    fn start_session(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<RawFrame>, ScanError>> + Send + '_>>
    {
        Box::pin(async move { crate::scanner::start_scan().await })
    }
}

/// Per-frame processing pipeline: identity resolution, decoding,
/// transformation, delta assembly and emission.
///
/// Owns the identity resolver, so the kind cache survives supervised
/// restarts of the scanning session.
pub struct Engine<D, W> {
    resolver: IdentityResolver<D>,
    emitter: Emitter<W>,
}

impl<D: FrameDecoder, W: Write> Engine<D, W> {
    pub fn new(registry: DeviceRegistry, decoder: D, out: W) -> Self {
        Self {
            resolver: IdentityResolver::new(registry, decoder),
            emitter: Emitter::new(out),
        }
    }

    /// Process one raw frame.
    ///
    /// Frame-local failures are logged and swallowed; one bad frame never
    /// aborts the process. Only output failures propagate.
    pub fn handle_frame(&mut self, frame: &RawFrame) -> io::Result<()> {
        debug!(
            "received frame from {}: {}",
            frame.mac,
            hex::encode(&frame.data)
        );

        let reading = match self.resolver.resolve(frame.mac, &frame.data) {
            Ok(reading) => reading,
            // Unregistered devices in range are expected, not an error.
            Err(FrameError::KeyMissing(_)) => return Ok(()),
            Err(FrameError::Decode(e @ DecodeError::UnknownDeviceKind { .. })) => {
                error!("{e}");
                return Ok(());
            }
            Err(FrameError::Decode(e)) => {
                warn!("dropping frame from {}: {e}", frame.mac);
                return Ok(());
            }
        };

        let Some(device) = self.resolver.device(frame.mac) else {
            return Ok(());
        };
        let values = transform(device, &reading);
        if values.is_empty() {
            return Ok(());
        }

        let delta = assemble(frame.mac, values);
        debug!("emitting delta for {}", frame.mac);
        self.emitter.emit(&delta)
    }
}

enum SupervisorState {
    Starting,
    Running(mpsc::Receiver<RawFrame>),
    BackingOff,
}

/// Supervising scan loop.
///
/// Any transport failure, including an ended frame stream, moves the loop
/// through a fixed [`RESTART_BACKOFF`] delay into a fresh scanning session
/// with the same registry. There is no retry limit; the loop returns only
/// when the output sink fails.
pub async fn supervise<T, D, W>(transport: &T, engine: &mut Engine<D, W>) -> Result<(), RunError>
where
    T: Transport + ?Sized,
    D: FrameDecoder,
    W: Write,
{
    let mut state = SupervisorState::Starting;
    loop {
        state = match state {
            SupervisorState::Starting => match transport.start_session().await {
                Ok(frames) => {
                    debug!("scanning session started");
                    SupervisorState::Running(frames)
                }
                Err(e) => {
                    warn!("failed to start scanning session: {e}");
                    SupervisorState::BackingOff
                }
            },
            SupervisorState::Running(mut frames) => {
                while let Some(frame) = frames.recv().await {
                    engine.handle_frame(&frame)?;
                }
                warn!("scanning session ended");
                SupervisorState::BackingOff
            }
            SupervisorState::BackingOff => {
                tokio::time::sleep(RESTART_BACKOFF).await;
                SupervisorState::Starting
            }
        };
    }
}
