//! Scanner manager: owns the scanners, the device registry and the capture
//! thread.
//!
//! Each `start()` opens a capture session with its own running flag, so a
//! session that is still winding down after `stop()` can never clear the
//! flag of the session that replaced it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use beacon_core::Device;
use beacon_proto::{Decoder, MndpDecoder, UbiquitiDecoder};

use crate::capture::{run_capture_loop, PacketSource};
use crate::error::Result;
use crate::registry::DeviceRegistry;
use crate::router::Router;
use crate::scanner::Scanner;

const CAPTURE_THREAD_NAME: &str = "beacon-capture";
const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(2);

struct CaptureSession {
    id: Uuid,
    running: Arc<AtomicBool>,
    done: mpsc::Receiver<()>,
    handle: thread::JoinHandle<()>,
}

/// Clears the session flag and signals completion when the capture thread
/// exits, including by unwinding.
struct SessionGuard {
    running: Arc<AtomicBool>,
    done: mpsc::Sender<()>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.done.send(());
    }
}

pub struct ScannerManager {
    registry: Arc<DeviceRegistry>,
    router: Arc<RwLock<Arc<Router>>>,
    source: Arc<dyn PacketSource>,
    session: Mutex<Option<CaptureSession>>,
    stop_timeout: Duration,
}

impl ScannerManager {
    pub fn new(source: Arc<dyn PacketSource>) -> Self {
        Self {
            registry: Arc::new(DeviceRegistry::new()),
            router: Arc::new(RwLock::new(Arc::new(Router::new()))),
            source,
            session: Mutex::new(None),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Manager with the Ubiquiti and MNDP scanners already registered.
    pub fn with_default_scanners(source: Arc<dyn PacketSource>) -> Self {
        let manager = Self::new(source);
        manager.register_scanner(Box::new(UbiquitiDecoder::new()));
        manager.register_scanner(Box::new(MndpDecoder::new()));
        manager
    }

    /// How long `stop()` waits for the capture thread.
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Register a protocol decoder. Every device it decodes is merged into
    /// the registry.
    ///
    /// Scanners added while a session is running receive datagrams only if
    /// the active capture filter already admits their port.
    pub fn register_scanner(&self, decoder: Box<dyn Decoder>) {
        let mut scanner = Scanner::new(decoder);
        let registry = self.registry.clone();
        scanner.set_callback(move |device| {
            registry.record(device);
        });

        tracing::info!(brand = %scanner.brand(), port = scanner.port(), "Registered scanner");
        let mut router = self.router.write();
        let mut next = Router::clone(&router);
        next.register(scanner);
        *router = Arc::new(next);
    }

    /// Called once per newly discovered device, on the capture thread.
    ///
    /// Callbacks may query the manager and its registry.
    pub fn set_on_new_device(&self, callback: impl Fn(&Device) + Send + Sync + 'static) {
        self.registry.set_on_new_device(callback);
    }

    /// Called for every repeat sighting of a known device, on the capture
    /// thread.
    pub fn set_on_device_updated(&self, callback: impl Fn(&Device) + Send + Sync + 'static) {
        self.registry.set_on_device_updated(callback);
    }

    /// Start capturing in the background. Returns immediately.
    ///
    /// A no-op when a session is already running. `interface` of `None`
    /// selects the default capture device.
    pub fn start(&self, interface: Option<&str>) -> Result<()> {
        let mut slot = self.session.lock();
        if let Some(session) = slot.as_ref() {
            if session.running.load(Ordering::SeqCst) {
                tracing::warn!(session = %session.id, "Scanner manager already running");
                return Ok(());
            }
        }

        // Reap a finished session before replacing it.
        if let Some(old) = slot.take() {
            if old.handle.is_finished() && old.handle.join().is_err() {
                tracing::error!(session = %old.id, "Capture thread panicked");
            }
        }

        let filter = {
            let router = self.router.read();
            if router.is_empty() {
                tracing::warn!("No scanners registered");
            }
            router.build_filter()
        };

        let id = Uuid::new_v4();
        let running = Arc::new(AtomicBool::new(true));
        let (done_tx, done_rx) = mpsc::channel();

        let guard = SessionGuard {
            running: running.clone(),
            done: done_tx,
        };
        let source = self.source.clone();
        let router = self.router.clone();
        let iface = interface.map(str::to_string);
        let thread_filter = filter.clone();

        let handle = thread::Builder::new()
            .name(CAPTURE_THREAD_NAME.to_string())
            .spawn(move || {
                let guard = guard;
                run_capture_loop(
                    id,
                    source.as_ref(),
                    &router,
                    &thread_filter,
                    iface.as_deref(),
                    &guard.running,
                );
            })?;

        tracing::info!(
            session = %id,
            interface = interface.unwrap_or("default"),
            filter = %filter,
            "Scanner manager started"
        );

        *slot = Some(CaptureSession {
            id,
            running,
            done: done_rx,
            handle,
        });
        Ok(())
    }

    /// Ask the capture thread to stop and wait up to the stop timeout for
    /// it to finish. A thread that overruns the timeout is left to exit on
    /// its own.
    pub fn stop(&self) {
        let Some(session) = self.session.lock().take() else {
            tracing::debug!("Scanner manager not running");
            return;
        };

        session.running.store(false, Ordering::SeqCst);

        match session.done.recv_timeout(self.stop_timeout) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                if session.handle.join().is_err() {
                    tracing::error!(session = %session.id, "Capture thread panicked");
                }
                tracing::info!(session = %session.id, "Scanner manager stopped");
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    session = %session.id,
                    timeout_ms = self.stop_timeout.as_millis() as u64,
                    "Capture thread did not stop in time; detaching"
                );
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|s| s.running.load(Ordering::SeqCst))
    }

    /// Snapshot of all discovered devices.
    pub fn devices(&self) -> Vec<Device> {
        self.registry.devices()
    }

    pub fn device_count(&self) -> usize {
        self.registry.device_count()
    }

    pub fn clear_devices(&self) {
        self.registry.clear();
    }

    /// Brand labels of the registered scanners, in registration order.
    pub fn registered_scanners(&self) -> Vec<String> {
        self.router.read().brands()
    }

    /// BPF filter the next session will capture with.
    pub fn capture_filter(&self) -> String {
        self.router.read().build_filter()
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }
}

impl Drop for ScannerManager {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.running.store(false, Ordering::SeqCst);
        }
    }
}

impl fmt::Display for ScannerManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ScannerManager(scanners={}, devices={})",
            self.router.read().len(),
            self.device_count()
        )
    }
}
