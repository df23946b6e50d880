//! Protocol scanner: one decoder bound to its UDP port.
//!
//! The scanner is the fault boundary of the pipeline. Whatever goes wrong
//! while decoding one device's announcement is logged and swallowed so
//! the capture loop keeps going.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use beacon_core::Device;
use beacon_proto::Decoder;

use crate::frame::Datagram;

/// Receives every device a scanner decodes, on the capture thread.
pub type DiscoveryCallback = Arc<dyn Fn(Device) + Send + Sync>;

pub struct Scanner {
    decoder: Box<dyn Decoder>,
    callback: Option<DiscoveryCallback>,
}

impl Scanner {
    pub fn new(decoder: Box<dyn Decoder>) -> Self {
        Self {
            decoder,
            callback: None,
        }
    }

    pub fn port(&self) -> u16 {
        self.decoder.port()
    }

    pub fn brand(&self) -> &str {
        self.decoder.brand()
    }

    /// BPF fragment selecting this scanner's traffic.
    pub fn filter_expression(&self) -> String {
        format!("udp port {}", self.port())
    }

    /// Register the discovery callback. Replaces any previous one.
    pub fn set_callback(&mut self, callback: impl Fn(Device) + Send + Sync + 'static) {
        self.callback = Some(Arc::new(callback));
    }

    /// Decode a datagram if it belongs to this scanner's port and hand the
    /// device to the callback. Returns true when a device was decoded.
    pub fn handle_packet(&self, datagram: &Datagram<'_>) -> bool {
        if !datagram.involves_port(self.port()) {
            return false;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let device = self
                .decoder
                .decode(datagram.payload, datagram.source_ip)?;
            if let Some(callback) = &self.callback {
                callback(device);
            }
            Some(())
        }));

        match outcome {
            Ok(decoded) => decoded.is_some(),
            Err(cause) => {
                tracing::error!(
                    brand = %self.brand(),
                    source = %datagram.source_ip,
                    error = panic_message(cause.as_ref()),
                    "Packet parsing error"
                );
                false
            }
        }
    }
}

impl fmt::Debug for Scanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scanner")
            .field("port", &self.port())
            .field("brand", &self.brand())
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

impl fmt::Display for Scanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scanner(port={}, brand='{}')", self.port(), self.brand())
    }
}

fn panic_message(cause: &(dyn std::any::Any + Send)) -> &str {
    if let Some(msg) = cause.downcast_ref::<&str>() {
        *msg
    } else if let Some(msg) = cause.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}
