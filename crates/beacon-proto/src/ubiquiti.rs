//! Ubiquiti Discovery Protocol (UDP 10001).
//!
//! Payload layout:
//! - bytes 0-1: version, `01 00` or `02 00`
//! - bytes 2-3: command / payload length (ignored)
//! - bytes 4..: TLV records, 1-byte type and 2-byte big-endian length

use std::net::{IpAddr, Ipv4Addr};

use beacon_core::{Device, UNKNOWN_NAME};

use crate::tlv::{Tlv, TlvLayout, TlvReader};
use crate::Decoder;

pub const UBIQUITI_PORT: u16 = 10001;

const BRAND: &str = "Ubiquiti";
const HEADER_LEN: usize = 4;
const MIN_PAYLOAD_LEN: usize = 6;

const TLV_MAC_ADDRESS: u16 = 0x01;
const TLV_IP_INFO: u16 = 0x02;
const TLV_FIRMWARE: u16 = 0x03;
const TLV_HOSTNAME: u16 = 0x0B;
const TLV_MODEL_SHORT: u16 = 0x0C;
const TLV_ESSID: u16 = 0x0D;
const TLV_UPTIME: u16 = 0x0E;
const TLV_MODEL_FULL: u16 = 0x14;

/// Decoder for Ubiquiti discovery announcements.
#[derive(Debug, Clone, Default)]
pub struct UbiquitiDecoder;

impl UbiquitiDecoder {
    pub fn new() -> Self {
        Self
    }
}

/// Fields accumulated while walking the TLV stream.
#[derive(Debug, Default)]
struct Announcement {
    mac: Option<String>,
    ip: Option<Ipv4Addr>,
    firmware: Option<String>,
    hostname: Option<String>,
    model: Option<String>,
    uptime: Option<u32>,
}

impl Announcement {
    fn apply(&mut self, tlv: &Tlv<'_>) {
        match tlv.kind {
            TLV_MAC_ADDRESS => {
                if let Some(mac) = tlv.mac() {
                    self.mac = Some(mac);
                }
            }
            // MAC and IPv4 arrive together; take both or neither.
            TLV_IP_INFO => {
                if let (Some(mac), Some(ip)) = (tlv.mac(), tlv.ipv4_at(6)) {
                    self.mac = Some(mac);
                    self.ip = Some(ip);
                }
            }
            TLV_FIRMWARE => self.firmware = Some(tlv.text()),
            TLV_HOSTNAME => self.hostname = Some(tlv.text()),
            TLV_MODEL_SHORT => {
                if self.model.is_none() {
                    self.model = Some(tlv.text());
                }
            }
            TLV_MODEL_FULL => self.model = Some(tlv.text()),
            TLV_UPTIME => {
                if let Some(uptime) = tlv.u32_be() {
                    self.uptime = Some(uptime);
                }
            }
            TLV_ESSID => {}
            _ => {}
        }
    }
}

impl Decoder for UbiquitiDecoder {
    fn port(&self) -> u16 {
        UBIQUITI_PORT
    }

    fn brand(&self) -> &str {
        BRAND
    }

    fn decode(&self, payload: &[u8], source_ip: IpAddr) -> Option<Device> {
        if payload.len() < MIN_PAYLOAD_LEN {
            return None;
        }
        if !matches!(&payload[..2], [0x01, 0x00] | [0x02, 0x00]) {
            return None;
        }

        let mut announcement = Announcement::default();
        let mut reader = TlvReader::new(TlvLayout::Ubiquiti, &payload[HEADER_LEN..]);
        for tlv in reader.by_ref() {
            announcement.apply(&tlv);
        }
        if reader.is_truncated() {
            tracing::trace!(source = %source_ip, "Truncated Ubiquiti announcement");
        }

        let mac = announcement.mac?;
        let mut device = Device::new(
            BRAND,
            &announcement
                .ip
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| source_ip.to_string()),
            &mac,
        );
        device.name = announcement
            .hostname
            .unwrap_or_else(|| UNKNOWN_NAME.to_string());
        device.model = announcement.model.unwrap_or_default();
        device.firmware = announcement.firmware.unwrap_or_default();
        device.uptime = announcement.uptime.unwrap_or(0);

        Some(device)
    }
}
