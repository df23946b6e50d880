//! Packet sources and the capture loop.
//!
//! A [`PacketSource`] delivers decoded UDP datagrams until asked to stop.
//! [`PcapSource`] is the libpcap-backed implementation; tests substitute a
//! scripted source. [`run_capture_loop`] is the body of the capture thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::config::DiscoverConfig;
use crate::error::CaptureError;
use crate::frame::{parse_frame, Datagram, LinkLayer};
use crate::router::Router;

/// A blocking source of captured UDP datagrams.
pub trait PacketSource: Send + Sync {
    /// Capture on `interface` (or the default device) with the given BPF
    /// `filter`, handing every UDP datagram to `on_datagram`.
    ///
    /// Runs until `should_stop` returns true or an error ends the capture.
    /// `should_stop` is checked after every frame and after every read
    /// timeout, so an idle network does not delay shutdown.
    fn capture(
        &self,
        filter: &str,
        interface: Option<&str>,
        on_datagram: &mut dyn FnMut(&Datagram<'_>),
        should_stop: &dyn Fn() -> bool,
    ) -> Result<(), CaptureError>;
}

/// libpcap packet source.
#[derive(Debug, Clone)]
pub struct PcapSource {
    promiscuous: bool,
    snaplen: i32,
    read_timeout_ms: i32,
}

impl PcapSource {
    pub fn new(config: &DiscoverConfig) -> Self {
        Self {
            promiscuous: config.promiscuous,
            snaplen: config.snaplen,
            read_timeout_ms: config.read_timeout_ms,
        }
    }

    fn open(
        &self,
        interface: Option<&str>,
    ) -> Result<(pcap::Capture<pcap::Active>, String), CaptureError> {
        let device = match interface {
            Some(name) => pcap::Device::from(name),
            None => pcap::Device::lookup()
                .map_err(|e| CaptureError::from_pcap("default", e))?
                .ok_or(CaptureError::NoInterface)?,
        };
        let name = device.name.clone();

        let capture = pcap::Capture::from_device(device)
            .and_then(|inactive| {
                inactive
                    .promisc(self.promiscuous)
                    .snaplen(self.snaplen)
                    .timeout(self.read_timeout_ms)
                    .open()
            })
            .map_err(|e| CaptureError::from_pcap(&name, e))?;

        Ok((capture, name))
    }
}

impl Default for PcapSource {
    fn default() -> Self {
        Self::new(&DiscoverConfig::default())
    }
}

impl PacketSource for PcapSource {
    fn capture(
        &self,
        filter: &str,
        interface: Option<&str>,
        on_datagram: &mut dyn FnMut(&Datagram<'_>),
        should_stop: &dyn Fn() -> bool,
    ) -> Result<(), CaptureError> {
        let (mut capture, name) = self.open(interface)?;

        capture
            .filter(filter, true)
            .map_err(|e| CaptureError::Filter {
                filter: filter.to_string(),
                message: e.to_string(),
            })?;

        let linktype = capture.get_datalink().0;
        let link = LinkLayer::from_linktype(linktype)
            .ok_or(CaptureError::UnsupportedLinkType(linktype))?;

        tracing::info!(interface = %name, filter = %filter, link = ?link, "Capture opened");

        while !should_stop() {
            match capture.next_packet() {
                Ok(packet) => {
                    if let Some(datagram) = parse_frame(link, packet.data) {
                        on_datagram(&datagram);
                    }
                }
                Err(pcap::Error::TimeoutExpired) => continue,
                Err(pcap::Error::NoMorePackets) => break,
                Err(e) => return Err(CaptureError::from_pcap(&name, e)),
            }
        }

        Ok(())
    }
}

/// Body of the capture thread for one session.
///
/// Routes every datagram through a snapshot of the router and ends when
/// `running` is cleared or the source fails. No router lock is held while
/// scanners and their callbacks run. Failures are logged, never retried. On
/// return `running` is always false; the registry is left as it was.
pub fn run_capture_loop(
    session_id: Uuid,
    source: &dyn PacketSource,
    router: &RwLock<Arc<Router>>,
    filter: &str,
    interface: Option<&str>,
    running: &Arc<AtomicBool>,
) {
    tracing::info!(session = %session_id, filter = %filter, "Capture loop started");

    let mut decoded: u64 = 0;
    let result = source.capture(
        filter,
        interface,
        &mut |datagram| {
            let snapshot = Arc::clone(&router.read());
            decoded += snapshot.route_packet(datagram) as u64;
        },
        &|| !running.load(Ordering::SeqCst),
    );

    match result {
        Ok(()) => {
            tracing::info!(session = %session_id, decoded, "Capture loop stopped");
        }
        Err(e) if e.is_permission_denied() => {
            tracing::error!(
                session = %session_id,
                error = %e,
                "Permission denied opening capture; run with elevated privileges or grant CAP_NET_RAW"
            );
        }
        Err(e) => {
            tracing::error!(session = %session_id, error = %e, "Capture loop failed");
        }
    }

    running.store(false, Ordering::SeqCst);
}
