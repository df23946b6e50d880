//! beacon-core: Shared types for the Beacon passive discovery workspace.
//!
//! This crate provides the foundational types used across all Beacon components:
//! - The `Device` record produced by protocol decoders and owned by the registry
//! - Hardware address formatting and normalisation helpers
//! - Device events handed from the capture thread to the presentation layer

pub mod events;
pub mod types;

pub use events::{DeviceEvent, DeviceEventKind, EventId};
pub use types::{Device, UNKNOWN_NAME};
