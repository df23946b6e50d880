//! Mikrotik Neighbor Discovery Protocol (UDP 5678).
//!
//! The payload is a bare TLV stream starting at offset 0; type and length
//! are both 2-byte little-endian. Mimosa radios speak the same protocol,
//! so the brand is inferred from the platform and board strings rather
//! than fixed per port.

use std::net::{IpAddr, Ipv4Addr};

use beacon_core::{Device, UNKNOWN_NAME};

use crate::tlv::{Tlv, TlvLayout, TlvReader};
use crate::Decoder;

pub const MNDP_PORT: u16 = 5678;

const BRAND: &str = "Mikrotik/Mimosa";
const MIN_PAYLOAD_LEN: usize = 4;

pub const BRAND_MIKROTIK: &str = "Mikrotik";
pub const BRAND_MIMOSA: &str = "Mimosa";
/// Catch-all for MNDP speakers with no recognisable platform.
pub const BRAND_GENERIC: &str = "Mikrotik/MNDP";

const TLV_MAC_ADDRESS: u16 = 0x0001;
const TLV_IDENTITY: u16 = 0x0005;
const TLV_VERSION: u16 = 0x0007;
const TLV_PLATFORM: u16 = 0x0008;
const TLV_UPTIME: u16 = 0x000A;
const TLV_SOFTWARE_ID: u16 = 0x000B;
const TLV_BOARD: u16 = 0x000E;
const TLV_IPV6: u16 = 0x0010;
const TLV_INTERFACE: u16 = 0x0011;
const TLV_IPV4: u16 = 0x0014;

/// Substrings of platform/board names that identify RouterOS hardware.
const MIKROTIK_INDICATORS: &[&str] = &[
    "routerboard",
    "rb",
    "ccr",
    "crs",
    "css",
    "hex",
    "hap",
    "mikrotik",
    "routeros",
    "chr",
    "ltap",
    "wap",
    "disc",
    "sxt",
    "lhg",
    "basebox",
    "netbox",
    "netmetal",
    "powerbox",
];

/// Decoder for MNDP announcements.
#[derive(Debug, Clone, Default)]
pub struct MndpDecoder;

impl MndpDecoder {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Default)]
struct Announcement {
    mac: Option<String>,
    identity: Option<String>,
    version: Option<String>,
    platform: Option<String>,
    board: Option<String>,
    uptime: Option<u32>,
    ip: Option<Ipv4Addr>,
}

impl Announcement {
    fn apply(&mut self, tlv: &Tlv<'_>) {
        match tlv.kind {
            TLV_MAC_ADDRESS => {
                if let Some(mac) = tlv.mac() {
                    self.mac = Some(mac);
                }
            }
            TLV_IDENTITY => self.identity = Some(tlv.text()),
            TLV_VERSION => self.version = Some(tlv.text()),
            TLV_PLATFORM => self.platform = Some(tlv.text()),
            TLV_BOARD => self.board = Some(tlv.text()),
            TLV_UPTIME => {
                if let Some(uptime) = tlv.u32_le() {
                    self.uptime = Some(uptime);
                }
            }
            TLV_IPV4 => {
                if let Some(ip) = tlv.ipv4_at(0) {
                    self.ip = Some(ip);
                }
            }
            TLV_SOFTWARE_ID | TLV_IPV6 | TLV_INTERFACE => {}
            _ => {}
        }
    }
}

/// Infer the vendor from MNDP platform and board strings.
pub fn detect_brand(platform: &str, board: &str) -> &'static str {
    let combined = format!("{platform} {board}").to_lowercase();

    if combined.contains("mimosa") {
        return BRAND_MIMOSA;
    }
    if MIKROTIK_INDICATORS
        .iter()
        .any(|indicator| combined.contains(indicator))
    {
        return BRAND_MIKROTIK;
    }
    BRAND_GENERIC
}

impl Decoder for MndpDecoder {
    fn port(&self) -> u16 {
        MNDP_PORT
    }

    fn brand(&self) -> &str {
        BRAND
    }

    fn decode(&self, payload: &[u8], source_ip: IpAddr) -> Option<Device> {
        if payload.len() < MIN_PAYLOAD_LEN {
            return None;
        }

        let mut announcement = Announcement::default();
        let mut reader = TlvReader::new(TlvLayout::Mndp, payload);
        for tlv in reader.by_ref() {
            announcement.apply(&tlv);
        }
        if reader.is_truncated() {
            tracing::trace!(source = %source_ip, "Truncated MNDP announcement");
        }

        let mac = announcement.mac?;
        let platform = announcement.platform.unwrap_or_default();
        let board = announcement.board.unwrap_or_default();
        let ip = announcement
            .ip
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| source_ip.to_string());

        let mut device = Device::new(detect_brand(&platform, &board), &ip, &mac);
        device.name = announcement
            .identity
            .unwrap_or_else(|| UNKNOWN_NAME.to_string());
        device.model = if board.is_empty() { platform } else { board };
        device.firmware = announcement.version.unwrap_or_default();
        device.uptime = announcement.uptime.unwrap_or(0);

        Some(device)
    }
}
