//! beacon-proto: decoders for vendor UDP discovery broadcasts.
//!
//! Two protocols are understood, each a flat Type-Length-Value stream
//! with its own header layout and byte order:
//! - Ubiquiti Discovery Protocol (UDP 10001), big-endian lengths after a
//!   4-byte version header
//! - Mikrotik Neighbor Discovery Protocol (UDP 5678, also spoken by
//!   Mimosa radios), little-endian type and length from offset 0
//!
//! Decoders are stateless. Malformed or truncated payloads yield `None`
//! and are never reported as errors.

pub mod mndp;
pub mod tlv;
pub mod ubiquiti;

use std::net::IpAddr;

use beacon_core::Device;

pub use mndp::{MndpDecoder, MNDP_PORT};
pub use ubiquiti::{UbiquitiDecoder, UBIQUITI_PORT};

/// A discovery protocol bound to one UDP port.
pub trait Decoder: Send + Sync {
    /// UDP port the protocol broadcasts on.
    fn port(&self) -> u16;

    /// Brand label used for logging and for devices that do not carry
    /// their own vendor hint.
    fn brand(&self) -> &str;

    /// Decode a UDP payload. `source_ip` is the sender address from the
    /// enclosing IP header, used when the payload carries no address.
    fn decode(&self, payload: &[u8], source_ip: IpAddr) -> Option<Device>;
}
