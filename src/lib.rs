//! `victron-listener` library.
//!
//! The binary (`src/main.rs`) is responsible for CLI parsing, config
//! ingestion and process exit codes. The core business logic lives in
//! [`crate::app`] where it can be tested deterministically with an injected
//! transport, decoder and output stream.

pub mod app;
pub mod config;
pub mod decode;
pub mod delta;
pub mod emitter;
pub mod mac_address;
pub mod reading;
pub mod registry;
pub mod resolver;
pub mod scanner;
pub mod test_utils;
pub mod transform;

// Re-export commonly used types at the crate root
pub use app::{supervise, Engine, RunError, Transport, RESTART_BACKOFF};
pub use config::{Config, ConfiguredDevice};
pub use decode::victron::VictronDecoder;
pub use decode::{DecodeError, FrameDecoder};
pub use delta::{assemble, Delta};
pub use emitter::Emitter;
pub use mac_address::MacAddress;
pub use reading::{DeviceKind, Reading};
pub use registry::DeviceRegistry;
pub use resolver::{FrameError, IdentityResolver};
pub use scanner::{RawFrame, ScanError};
pub use transform::{transform, FieldValue, PathValue};
