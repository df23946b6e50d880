//! Type-Length-Value stream reader and writer.
//!
//! Both discovery protocols pack their fields as consecutive TLV records
//! but disagree on the header: Ubiquiti uses a 1-byte type and a 2-byte
//! big-endian length, MNDP a 2-byte type and 2-byte length, both
//! little-endian.
//!
//! The reader stops at the first record whose declared length runs past
//! the end of the buffer. Records parsed before that point are kept.

use std::net::Ipv4Addr;

use beacon_core::types::format_mac;

/// Header layout of a TLV record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlvLayout {
    /// `type: u8`, `length: u16` big-endian.
    Ubiquiti,
    /// `type: u16`, `length: u16`, both little-endian.
    Mndp,
}

impl TlvLayout {
    pub fn header_len(self) -> usize {
        match self {
            Self::Ubiquiti => 3,
            Self::Mndp => 4,
        }
    }

    fn read_header(self, bytes: &[u8]) -> (u16, usize) {
        match self {
            Self::Ubiquiti => (
                u16::from(bytes[0]),
                usize::from(u16::from_be_bytes([bytes[1], bytes[2]])),
            ),
            Self::Mndp => (
                u16::from_le_bytes([bytes[0], bytes[1]]),
                usize::from(u16::from_le_bytes([bytes[2], bytes[3]])),
            ),
        }
    }

    fn write_header(self, buf: &mut Vec<u8>, kind: u16, len: u16) {
        match self {
            Self::Ubiquiti => {
                buf.push(kind as u8);
                buf.extend_from_slice(&len.to_be_bytes());
            }
            Self::Mndp => {
                buf.extend_from_slice(&kind.to_le_bytes());
                buf.extend_from_slice(&len.to_le_bytes());
            }
        }
    }
}

/// One decoded record. `value` borrows from the packet buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    pub kind: u16,
    pub value: &'a [u8],
}

impl<'a> Tlv<'a> {
    /// Value as text: invalid UTF-8 is dropped, NUL padding trimmed.
    pub fn text(&self) -> String {
        decode_text(self.value)
    }

    /// First six bytes as a hardware address.
    pub fn mac(&self) -> Option<String> {
        self.value.get(..6).map(format_mac)
    }

    /// Four bytes at `offset` as an IPv4 address.
    pub fn ipv4_at(&self, offset: usize) -> Option<Ipv4Addr> {
        let octets: [u8; 4] = self.value.get(offset..offset + 4)?.try_into().ok()?;
        Some(Ipv4Addr::from(octets))
    }

    pub fn u32_be(&self) -> Option<u32> {
        let bytes: [u8; 4] = self.value.get(..4)?.try_into().ok()?;
        Some(u32::from_be_bytes(bytes))
    }

    pub fn u32_le(&self) -> Option<u32> {
        let bytes: [u8; 4] = self.value.get(..4)?.try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    }
}

/// Iterator over the TLV records of a buffer.
#[derive(Debug, Clone)]
pub struct TlvReader<'a> {
    layout: TlvLayout,
    data: &'a [u8],
    offset: usize,
    truncated: bool,
}

impl<'a> TlvReader<'a> {
    pub fn new(layout: TlvLayout, data: &'a [u8]) -> Self {
        Self {
            layout,
            data,
            offset: 0,
            truncated: false,
        }
    }

    /// True once the reader hit a record (or partial header) that did not
    /// fit in the buffer.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl<'a> Iterator for TlvReader<'a> {
    type Item = Tlv<'a>;

    fn next(&mut self) -> Option<Tlv<'a>> {
        let rest = &self.data[self.offset..];
        if rest.is_empty() {
            return None;
        }

        let header_len = self.layout.header_len();
        if rest.len() < header_len {
            self.truncated = true;
            self.offset = self.data.len();
            return None;
        }

        let (kind, len) = self.layout.read_header(rest);
        let end = header_len + len;
        if end > rest.len() {
            tracing::trace!(
                tlv_type = kind,
                declared_len = len,
                available = rest.len() - header_len,
                "TLV overruns buffer, stopping"
            );
            self.truncated = true;
            self.offset = self.data.len();
            return None;
        }

        self.offset += end;
        Some(Tlv {
            kind,
            value: &rest[header_len..end],
        })
    }
}

/// Builds a TLV stream, e.g. to simulate a device announcement.
#[derive(Debug, Clone)]
pub struct TlvWriter {
    layout: TlvLayout,
    buf: Vec<u8>,
}

impl TlvWriter {
    pub fn new(layout: TlvLayout) -> Self {
        Self {
            layout,
            buf: Vec::new(),
        }
    }

    /// Start the stream with raw header bytes (e.g. a protocol version).
    pub fn with_prefix(layout: TlvLayout, prefix: &[u8]) -> Self {
        Self {
            layout,
            buf: prefix.to_vec(),
        }
    }

    /// Append one record. Values longer than `u16::MAX` are cut to fit.
    pub fn push(&mut self, kind: u16, value: &[u8]) -> &mut Self {
        let value = &value[..value.len().min(usize::from(u16::MAX))];
        self.layout.write_header(&mut self.buf, kind, value.len() as u16);
        self.buf.extend_from_slice(value);
        self
    }

    pub fn push_str(&mut self, kind: u16, value: &str) -> &mut Self {
        self.push(kind, value.as_bytes())
    }

    /// Append raw bytes with no header, e.g. a deliberately broken record.
    pub fn push_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Decode protocol text: invalid UTF-8 sequences are dropped and NUL
/// padding is stripped from both ends.
pub fn decode_text(value: &[u8]) -> String {
    String::from_utf8_lossy(value)
        .chars()
        .filter(|c| *c != char::REPLACEMENT_CHARACTER)
        .collect::<String>()
        .trim_matches('\0')
        .to_string()
}
