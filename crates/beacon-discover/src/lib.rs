//! beacon-discover: Passive discovery of Ubiquiti, Mikrotik and Mimosa gear.
//!
//! Captures UDP discovery broadcasts with libpcap, routes each datagram to
//! the protocol scanners, and merges what they decode into a deduplicated,
//! thread-safe device registry with change notifications.

pub mod capture;
pub mod config;
pub mod error;
pub mod frame;
pub mod manager;
pub mod registry;
pub mod report;
pub mod router;
pub mod scanner;

pub use capture::{PacketSource, PcapSource};
pub use frame::Datagram;
pub use manager::ScannerManager;
pub use registry::{DeviceRegistry, Sighting};
pub use router::Router;
pub use scanner::Scanner;
