//! End-to-end tests of the scanner manager against a scripted packet source.
//!
//! Frames are built with etherparse, so every test exercises link-layer
//! parsing, routing, decoding and registry merging together.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use etherparse::PacketBuilder;
use parking_lot::Mutex;

use beacon_discover::error::CaptureError;
use beacon_discover::frame::{parse_frame, LinkLayer};
use beacon_discover::{Datagram, PacketSource, ScannerManager};
use beacon_proto::tlv::{TlvLayout, TlvWriter};
use beacon_proto::MndpDecoder;

// ── Scripted source ───────────────────────────────────────────────

/// Delivers queued frames, then idles until stopped.
#[derive(Default)]
struct ScriptedSource {
    frames: Mutex<Vec<Vec<u8>>>,
    filters: Mutex<Vec<String>>,
    interfaces: Mutex<Vec<Option<String>>>,
    sessions: AtomicUsize,
}

impl ScriptedSource {
    fn push(&self, frame: Vec<u8>) {
        self.frames.lock().push(frame);
    }
}

impl PacketSource for ScriptedSource {
    fn capture(
        &self,
        filter: &str,
        interface: Option<&str>,
        on_datagram: &mut dyn FnMut(&Datagram<'_>),
        should_stop: &dyn Fn() -> bool,
    ) -> Result<(), CaptureError> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        self.filters.lock().push(filter.to_string());
        self.interfaces.lock().push(interface.map(str::to_string));

        while !should_stop() {
            let pending: Vec<Vec<u8>> = std::mem::take(&mut *self.frames.lock());
            for frame in &pending {
                if let Some(datagram) = parse_frame(LinkLayer::Ethernet, frame) {
                    on_datagram(&datagram);
                }
            }
            thread::sleep(Duration::from_millis(5));
        }
        Ok(())
    }
}

/// Fails the way libpcap does without capture privileges.
struct DeniedSource;

impl PacketSource for DeniedSource {
    fn capture(
        &self,
        _filter: &str,
        interface: Option<&str>,
        _on_datagram: &mut dyn FnMut(&Datagram<'_>),
        _should_stop: &dyn Fn() -> bool,
    ) -> Result<(), CaptureError> {
        Err(CaptureError::from_pcap(
            interface.unwrap_or("any"),
            pcap::Error::PcapError(
                "any: You don't have permission to capture on that device".into(),
            ),
        ))
    }
}

// ── Frame helpers ─────────────────────────────────────────────────

fn udp_frame(src: [u8; 4], port: u16, payload: &[u8]) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2([0x02, 0, 0, 0, 0, 1], [0xff; 6])
        .ipv4(src, [255, 255, 255, 255], 64)
        .udp(port, port);
    let mut frame = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut frame, payload).unwrap();
    frame
}

fn ubiquiti_frame(src: [u8; 4], mac: [u8; 6], hostname: &str) -> Vec<u8> {
    let mut w = TlvWriter::with_prefix(TlvLayout::Ubiquiti, &[0x01, 0x00, 0x00, 0x00]);
    w.push(0x01, &mac)
        .push_str(0x0b, hostname)
        .push(0x0e, &3600u32.to_be_bytes());
    udp_frame(src, 10001, &w.into_bytes())
}

fn mndp_frame(src: [u8; 4], mac: [u8; 6], identity: &str, board: &str) -> Vec<u8> {
    let mut w = TlvWriter::new(TlvLayout::Mndp);
    w.push(0x0001, &mac)
        .push_str(0x0005, identity)
        .push_str(0x0008, "MikroTik")
        .push_str(0x000e, board);
    udp_frame(src, 5678, &w.into_bytes())
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..300 {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

fn manager_with(source: Arc<ScriptedSource>) -> ScannerManager {
    ScannerManager::with_default_scanners(source).with_stop_timeout(Duration::from_secs(2))
}

// ── Tests ─────────────────────────────────────────────────────────

#[test]
fn test_discovers_both_protocols() {
    let source = Arc::new(ScriptedSource::default());
    let manager = manager_with(source.clone());

    source.push(ubiquiti_frame([10, 0, 0, 20], [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff], "AP1"));
    source.push(mndp_frame(
        [10, 0, 0, 30],
        [0x4c, 0x5e, 0x0c, 0x11, 0x22, 0x33],
        "core-router",
        "RouterBOARD 951",
    ));
    manager.start(Some("eth0")).unwrap();

    assert!(wait_until(|| manager.device_count() == 2));
    manager.stop();

    let devices = manager.devices();
    let ap = devices.iter().find(|d| d.brand == "Ubiquiti").unwrap();
    assert_eq!(ap.mac, "AA:BB:CC:DD:EE:FF");
    assert_eq!(ap.name, "AP1");
    assert_eq!(ap.ip, "10.0.0.20");

    let router = devices.iter().find(|d| d.brand == "Mikrotik").unwrap();
    assert_eq!(router.name, "core-router");
    assert_eq!(router.model, "RouterBOARD 951");
    assert_eq!(router.ip, "10.0.0.30");
}

#[test]
fn test_source_receives_combined_filter_and_interface() {
    let source = Arc::new(ScriptedSource::default());
    let manager = manager_with(source.clone());

    manager.start(Some("wlan0")).unwrap();
    assert!(wait_until(|| source.sessions.load(Ordering::SeqCst) == 1));
    manager.stop();

    assert_eq!(
        source.filters.lock().as_slice(),
        ["udp and (port 10001 or port 5678)".to_string()]
    );
    assert_eq!(
        source.interfaces.lock().as_slice(),
        [Some("wlan0".to_string())]
    );
}

#[test]
fn test_repeat_sightings_are_deduplicated() {
    let source = Arc::new(ScriptedSource::default());
    let manager = manager_with(source.clone());
    let updates = Arc::new(AtomicUsize::new(0));
    let counter = updates.clone();
    manager.set_on_device_updated(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let mac = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff];
    source.push(ubiquiti_frame([10, 0, 0, 20], mac, "AP1"));
    source.push(ubiquiti_frame([10, 0, 0, 20], mac, "AP1"));
    source.push(ubiquiti_frame([10, 0, 0, 99], mac, "AP1"));
    manager.start(None).unwrap();

    assert!(wait_until(|| updates.load(Ordering::SeqCst) == 2));
    manager.stop();

    let devices = manager.devices();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].ip, "10.0.0.99");
    assert!(devices[0].last_seen >= devices[0].discovered_at);
}

#[test]
fn test_new_device_callback_fires_once_per_device() {
    let source = Arc::new(ScriptedSource::default());
    let manager = manager_with(source.clone());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    manager.set_on_new_device(move |device| sink.lock().push(device.mac.clone()));

    source.push(ubiquiti_frame([10, 0, 0, 1], [0, 1, 2, 3, 4, 5], "a"));
    source.push(ubiquiti_frame([10, 0, 0, 1], [0, 1, 2, 3, 4, 5], "a"));
    source.push(ubiquiti_frame([10, 0, 0, 2], [0, 1, 2, 3, 4, 6], "b"));
    manager.start(None).unwrap();

    assert!(wait_until(|| manager.device_count() == 2));
    manager.stop();

    let seen = seen.lock();
    assert_eq!(seen.len(), 2);
    assert!(seen.contains(&"00:01:02:03:04:05".to_string()));
    assert!(seen.contains(&"00:01:02:03:04:06".to_string()));
}

#[test]
fn test_stop_then_start_keeps_devices() {
    let source = Arc::new(ScriptedSource::default());
    let manager = manager_with(source.clone());

    source.push(ubiquiti_frame([10, 0, 0, 20], [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff], "AP1"));
    manager.start(None).unwrap();
    assert!(wait_until(|| manager.device_count() == 1));
    let before = manager.devices();

    manager.stop();
    assert!(!manager.is_running());
    manager.start(None).unwrap();
    assert!(manager.is_running());

    // The first session winding down must not stop the second one.
    thread::sleep(Duration::from_millis(50));
    assert!(manager.is_running());
    assert_eq!(manager.devices(), before);

    manager.stop();
    assert_eq!(source.sessions.load(Ordering::SeqCst), 2);
}

#[test]
fn test_garbage_and_unrelated_traffic_is_ignored() {
    let source = Arc::new(ScriptedSource::default());
    let manager = manager_with(source.clone());

    source.push(udp_frame([10, 0, 0, 5], 10001, &[0x07, 0x00, 0x00, 0x00, 0x01, 0x00]));
    source.push(udp_frame([10, 0, 0, 5], 5678, &[0x00, 0x00]));
    source.push(udp_frame([10, 0, 0, 5], 53, b"dns"));
    source.push(vec![0xde, 0xad, 0xbe, 0xef]);
    source.push(ubiquiti_frame([10, 0, 0, 20], [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff], "AP1"));
    manager.start(None).unwrap();

    assert!(wait_until(|| manager.device_count() == 1));
    manager.stop();
    assert!(manager.devices()[0].name == "AP1");
}

#[test]
fn test_permission_error_stops_capture_and_keeps_registry() {
    let scripted = Arc::new(ScriptedSource::default());
    let first = manager_with(scripted.clone());
    scripted.push(ubiquiti_frame([10, 0, 0, 20], [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff], "AP1"));
    first.start(None).unwrap();
    assert!(wait_until(|| first.device_count() == 1));
    first.stop();

    let denied = ScannerManager::with_default_scanners(Arc::new(DeniedSource));
    for device in first.devices() {
        denied.registry().record(device);
    }

    denied.start(Some("eth0")).unwrap();
    assert!(wait_until(|| !denied.is_running()));
    assert_eq!(denied.device_count(), 1);
    denied.stop();
}

#[test]
fn test_clear_devices() {
    let source = Arc::new(ScriptedSource::default());
    let manager = manager_with(source.clone());

    source.push(ubiquiti_frame([10, 0, 0, 20], [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff], "AP1"));
    manager.start(None).unwrap();
    assert!(wait_until(|| manager.device_count() == 1));

    manager.clear_devices();
    assert_eq!(manager.device_count(), 0);
    assert!(manager.is_running());
    manager.stop();
}

#[test]
fn test_callback_can_query_manager_while_scanner_registers() {
    let source = Arc::new(ScriptedSource::default());
    let manager = Arc::new(manager_with(source.clone()));

    let (entered_tx, entered_rx) = mpsc::channel();
    let (result_tx, result_rx) = mpsc::channel();
    let weak = Arc::downgrade(&manager);
    manager.set_on_new_device(move |_| {
        let _ = entered_tx.send(());
        // Give the registering thread time to queue for the router lock.
        thread::sleep(Duration::from_millis(200));
        if let Some(manager) = weak.upgrade() {
            let _ = result_tx.send((manager.registered_scanners(), manager.capture_filter()));
        }
    });

    source.push(ubiquiti_frame([10, 0, 0, 20], [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff], "AP1"));
    manager.start(None).unwrap();
    entered_rx.recv_timeout(Duration::from_secs(3)).unwrap();

    let registering = manager.clone();
    let registrar = thread::spawn(move || {
        registering.register_scanner(Box::new(MndpDecoder::new()));
    });

    let (scanners, filter) = result_rx
        .recv_timeout(Duration::from_secs(3))
        .expect("callback blocked on the router lock");
    assert!(scanners.len() >= 2);
    assert!(filter.starts_with("udp and ("));

    registrar.join().unwrap();
    assert_eq!(manager.registered_scanners().len(), 3);
    manager.stop();
}
