//! Scanner registry and datagram fan-out.

use std::sync::Arc;

use crate::frame::Datagram;
use crate::scanner::Scanner;

/// Ordered set of registered scanners.
///
/// Cloning is cheap and shares the scanners, so a caller can route over a
/// snapshot without holding whatever lock guards the live router.
#[derive(Debug, Default, Clone)]
pub struct Router {
    scanners: Vec<Arc<Scanner>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, scanner: Scanner) {
        self.scanners.push(Arc::new(scanner));
    }

    pub fn len(&self) -> usize {
        self.scanners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scanners.is_empty()
    }

    /// Brand labels of the registered scanners, in registration order.
    pub fn brands(&self) -> Vec<String> {
        self.scanners.iter().map(|s| s.brand().to_string()).collect()
    }

    pub fn ports(&self) -> Vec<u16> {
        self.scanners.iter().map(|s| s.port()).collect()
    }

    /// Combined BPF filter covering every registered port.
    pub fn build_filter(&self) -> String {
        if self.scanners.is_empty() {
            return "udp".to_string();
        }
        let ports: Vec<String> = self
            .scanners
            .iter()
            .map(|s| format!("port {}", s.port()))
            .collect();
        format!("udp and ({})", ports.join(" or "))
    }

    /// Offer the datagram to every scanner. Scanners decide relevance by
    /// port themselves; there is no short circuit after the first match.
    /// Returns how many scanners decoded a device.
    pub fn route_packet(&self, datagram: &Datagram<'_>) -> usize {
        self.scanners
            .iter()
            .filter(|scanner| scanner.handle_packet(datagram))
            .count()
    }
}
