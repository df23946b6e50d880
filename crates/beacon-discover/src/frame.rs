//! Link-layer frame decoding.
//!
//! Turns a captured frame into the UDP view the scanners need: sender IP,
//! both ports and the payload. Anything that is not UDP over IP is dropped.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use etherparse::{IpHeader, PacketHeaders, TransportHeader};

/// A captured UDP datagram. `payload` borrows from the capture buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Datagram<'a> {
    pub source_ip: IpAddr,
    pub source_port: u16,
    pub destination_port: u16,
    pub payload: &'a [u8],
}

impl<'a> Datagram<'a> {
    /// True if either end of the datagram uses `port`.
    pub fn involves_port(&self, port: u16) -> bool {
        self.source_port == port || self.destination_port == port
    }
}

/// Link-layer framing of a capture handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLayer {
    Ethernet,
    /// Linux "cooked" capture, v1 (16-byte header).
    LinuxSll,
    /// Linux "cooked" capture, v2 (20-byte header).
    LinuxSll2,
    /// BSD loopback (4-byte address family).
    Null,
    /// Bare IP packets, no link header.
    RawIp,
}

impl LinkLayer {
    /// Map a libpcap DLT/LINKTYPE value.
    pub fn from_linktype(linktype: i32) -> Option<Self> {
        match linktype {
            1 => Some(Self::Ethernet),
            113 => Some(Self::LinuxSll),
            276 => Some(Self::LinuxSll2),
            0 | 108 => Some(Self::Null),
            12 | 14 | 101 | 228 => Some(Self::RawIp),
            _ => None,
        }
    }

    fn header_len(self) -> usize {
        match self {
            Self::Ethernet | Self::RawIp => 0,
            Self::LinuxSll => 16,
            Self::LinuxSll2 => 20,
            Self::Null => 4,
        }
    }
}

/// Decode one captured frame into a UDP datagram.
pub fn parse_frame(link: LinkLayer, data: &[u8]) -> Option<Datagram<'_>> {
    let headers = match link {
        LinkLayer::Ethernet => PacketHeaders::from_ethernet_slice(data).ok()?,
        _ => PacketHeaders::from_ip_slice(data.get(link.header_len()..)?).ok()?,
    };

    let source_ip = match headers.ip? {
        IpHeader::Version4(ipv4, _) => IpAddr::V4(Ipv4Addr::from(ipv4.source)),
        IpHeader::Version6(ipv6, _) => IpAddr::V6(Ipv6Addr::from(ipv6.source)),
    };

    let (source_port, destination_port) = match headers.transport? {
        TransportHeader::Udp(udp) => (udp.source_port, udp.destination_port),
        _ => return None,
    };

    Some(Datagram {
        source_ip,
        source_port,
        destination_port,
        payload: headers.payload,
    })
}
