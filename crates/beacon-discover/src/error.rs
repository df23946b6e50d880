//! Error types for the beacon-discover crate.

use thiserror::Error;

/// Failures of the packet source. All of them end the capture loop.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Insufficient privileges to capture on {interface}: {message}")]
    PermissionDenied { interface: String, message: String },

    #[error("No capture interface available")]
    NoInterface,

    #[error("Unsupported link type {0} on capture interface")]
    UnsupportedLinkType(i32),

    #[error("Invalid capture filter '{filter}': {message}")]
    Filter { filter: String, message: String },

    #[error("Capture failed on {interface}: {message}")]
    Source { interface: String, message: String },
}

impl CaptureError {
    /// Build an error from a libpcap failure, separating privilege problems
    /// from everything else.
    pub fn from_pcap(interface: &str, err: pcap::Error) -> Self {
        let message = err.to_string();
        let lower = message.to_lowercase();
        if lower.contains("permission") || lower.contains("not permitted") {
            Self::PermissionDenied {
                interface: interface.to_string(),
                message,
            }
        } else {
            Self::Source {
                interface: interface.to_string(),
                message,
            }
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }
}

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for DiscoverError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DiscoverError>;
