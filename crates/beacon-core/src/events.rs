//! Device events handed from the capture thread to consumers.
//!
//! The registry fires callbacks synchronously on the capture thread;
//! consumers that live elsewhere (an async UI loop, a JSON stream) wrap
//! each notification in a `DeviceEvent` and forward it over a channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Device;

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

/// What happened to the device.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeviceEventKind {
    /// First sighting of this hardware address.
    Discovered,
    /// A known device announced itself again.
    Updated,
}

/// A registry change notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEvent {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    pub kind: DeviceEventKind,
    pub device: Device,
}

impl DeviceEvent {
    pub fn new(kind: DeviceEventKind, device: Device) -> Self {
        Self {
            id: EventId::new(),
            timestamp: Utc::now(),
            kind,
            device,
        }
    }

    pub fn discovered(device: Device) -> Self {
        Self::new(DeviceEventKind::Discovered, device)
    }

    pub fn updated(device: Device) -> Self {
        Self::new(DeviceEventKind::Updated, device)
    }
}
