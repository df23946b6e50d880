//! Deduplicating device registry.
//!
//! Devices are keyed by their canonical hardware address. The map is
//! guarded by a `parking_lot::RwLock`; notifications are fired only after
//! the write guard is dropped, so a callback may read the registry (or
//! record another sighting) without deadlocking.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;

use beacon_core::types::normalize_mac;
use beacon_core::Device;

/// Notification hook. Receives a snapshot of the stored record.
pub type DeviceCallback = Arc<dyn Fn(&Device) + Send + Sync>;

/// Outcome of recording one sighting.
#[derive(Debug, Clone, PartialEq)]
pub enum Sighting {
    /// First time this hardware address was seen.
    New(Device),
    /// A known device was seen again; holds the refreshed record.
    Refreshed(Device),
}

impl Sighting {
    pub fn device(&self) -> &Device {
        match self {
            Self::New(d) | Self::Refreshed(d) => d,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::New(_))
    }
}

#[derive(Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<String, Device>>,
    on_new: RwLock<Option<DeviceCallback>>,
    on_updated: RwLock<Option<DeviceCallback>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_on_new_device(&self, callback: impl Fn(&Device) + Send + Sync + 'static) {
        *self.on_new.write() = Some(Arc::new(callback));
    }

    pub fn set_on_device_updated(&self, callback: impl Fn(&Device) + Send + Sync + 'static) {
        *self.on_updated.write() = Some(Arc::new(callback));
    }

    /// Merge a freshly decoded device into the registry.
    ///
    /// Unknown addresses are inserted as-is. For known addresses only
    /// `last_seen` and `ip` change; `discovered_at` and every other field
    /// of the stored record are kept.
    pub fn record(&self, device: Device) -> Sighting {
        let sighting = {
            let mut devices = self.devices.write();
            match devices.entry(device.unique_id()) {
                Entry::Occupied(mut entry) => {
                    let existing = entry.get_mut();
                    existing.touch(Utc::now());
                    if existing.ip != device.ip {
                        tracing::debug!(
                            mac = %existing.mac,
                            old_ip = %existing.ip,
                            new_ip = %device.ip,
                            "Device address changed"
                        );
                        existing.ip = device.ip;
                    }
                    Sighting::Refreshed(existing.clone())
                }
                Entry::Vacant(entry) => {
                    tracing::info!(
                        brand = %device.brand,
                        name = %device.name,
                        ip = %device.ip,
                        mac = %device.mac,
                        "New device"
                    );
                    Sighting::New(entry.insert(device).clone())
                }
            }
        };

        let callback = if sighting.is_new() {
            self.on_new.read().clone()
        } else {
            self.on_updated.read().clone()
        };
        if let Some(callback) = callback {
            callback(sighting.device());
        }

        sighting
    }

    /// Snapshot of all devices, in no particular order.
    pub fn devices(&self) -> Vec<Device> {
        self.devices.read().values().cloned().collect()
    }

    /// Look up one device by hardware address, in any case or separator style.
    pub fn device(&self, mac: &str) -> Option<Device> {
        self.devices.read().get(&normalize_mac(mac)).cloned()
    }

    pub fn device_count(&self) -> usize {
        self.devices.read().len()
    }

    pub fn clear(&self) {
        let removed = {
            let mut devices = self.devices.write();
            let n = devices.len();
            devices.clear();
            n
        };
        tracing::info!(removed, "Device list cleared");
    }
}
