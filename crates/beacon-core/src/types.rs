//! Core domain types for discovered network devices.
//!
//! A `Device` is built fresh by a protocol decoder for every parsed
//! discovery packet. The registry keeps one long-lived record per
//! hardware address and refreshes it in place on later sightings.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name reported when a discovery packet carries no hostname/identity.
pub const UNKNOWN_NAME: &str = "Unknown";

// ── Device ────────────────────────────────────────────────────────

/// One physical network endpoint seen on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Device {
    /// Vendor label, assigned by the decoder or inferred from the payload.
    pub brand: String,
    /// Dotted-quad address, from the payload if present, else the packet source.
    pub ip: String,
    /// Hardware address, `AA:BB:CC:DD:EE:FF`.
    pub mac: String,
    /// Hostname or identity.
    pub name: String,
    pub model: String,
    pub firmware: String,
    /// Device uptime in seconds.
    pub uptime: u32,
    /// First sighting. Never changes once the device is registered.
    pub discovered_at: DateTime<Utc>,
    /// Most recent sighting.
    pub last_seen: DateTime<Utc>,
}

impl Device {
    /// Create a device first seen now, with empty optional fields.
    pub fn new(brand: &str, ip: &str, mac: &str) -> Self {
        let now = Utc::now();
        Self {
            brand: brand.to_string(),
            ip: ip.to_string(),
            mac: mac.to_string(),
            name: UNKNOWN_NAME.to_string(),
            model: String::new(),
            firmware: String::new(),
            uptime: 0,
            discovered_at: now,
            last_seen: now,
        }
    }

    /// Registry key: the hardware address in canonical uppercase form.
    pub fn unique_id(&self) -> String {
        normalize_mac(&self.mac)
    }

    /// Vendor prefix (first three octets) of the hardware address.
    pub fn oui(&self) -> Option<String> {
        let id = self.unique_id();
        let prefix: Vec<&str> = id.split(':').take(3).collect();
        if prefix.len() == 3 && prefix.iter().all(|octet| octet.len() == 2) {
            Some(prefix.join(":"))
        } else {
            None
        }
    }

    /// Record a new sighting. `last_seen` never moves backwards, even if
    /// the wall clock does.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_seen {
            self.last_seen = now;
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({}) [{}]", self.brand, self.name, self.ip, self.mac)
    }
}

// ── Hardware addresses ────────────────────────────────────────────

/// Render raw address bytes as uppercase hex pairs joined by colons.
pub fn format_mac(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Canonicalise a textual hardware address: trimmed, uppercase, with
/// hyphen separators folded to colons.
pub fn normalize_mac(mac: &str) -> String {
    mac.trim().to_uppercase().replace('-', ":")
}
