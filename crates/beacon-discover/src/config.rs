//! Configuration for the beacon-discover capture service.

use std::collections::HashSet;

use serde::Deserialize;

use beacon_proto::{Decoder, MndpDecoder, UbiquitiDecoder, MNDP_PORT, UBIQUITI_PORT};

use crate::error::Result;

/// Top-level discover configuration.
///
/// Loaded from the `[discover]` section of `<prefix>.toml` or from
/// `BEACON__DISCOVER__` environment variables.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DiscoverConfig {
    /// Capture interface. When unset, libpcap's default device is used.
    #[serde(default)]
    pub interface: Option<String>,

    /// Discovery protocols to listen for.
    #[serde(default = "default_protocols")]
    pub protocols: Vec<ProtocolKind>,

    /// Put the interface into promiscuous mode.
    #[serde(default = "default_true")]
    pub promiscuous: bool,

    /// Maximum bytes captured per frame.
    #[serde(default = "default_snaplen")]
    pub snaplen: i32,

    /// Read timeout of the capture handle. Bounds how long a stop request
    /// can go unnoticed on a quiet network.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: i32,

    /// How long `stop()` waits for the capture thread to wind down.
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,

    /// Interval of the periodic inventory summary in the CLI.
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,
}

/// Supported discovery protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolKind {
    /// Ubiquiti discovery, UDP 10001.
    Ubiquiti,
    /// MikroTik Neighbor Discovery, UDP 5678.
    Mndp,
}

impl ProtocolKind {
    pub fn port(self) -> u16 {
        match self {
            Self::Ubiquiti => UBIQUITI_PORT,
            Self::Mndp => MNDP_PORT,
        }
    }

    /// Fresh decoder for this protocol.
    pub fn decoder(self) -> Box<dyn Decoder> {
        match self {
            Self::Ubiquiti => Box::new(UbiquitiDecoder::new()),
            Self::Mndp => Box::new(MndpDecoder::new()),
        }
    }
}

fn default_protocols() -> Vec<ProtocolKind> {
    vec![ProtocolKind::Ubiquiti, ProtocolKind::Mndp]
}

fn default_true() -> bool {
    true
}

fn default_snaplen() -> i32 {
    65535
}

fn default_read_timeout_ms() -> i32 {
    500
}

fn default_stop_timeout_ms() -> u64 {
    2000
}

fn default_report_interval() -> u64 {
    30
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            interface: None,
            protocols: default_protocols(),
            promiscuous: default_true(),
            snaplen: default_snaplen(),
            read_timeout_ms: default_read_timeout_ms(),
            stop_timeout_ms: default_stop_timeout_ms(),
            report_interval_secs: default_report_interval(),
        }
    }
}

impl DiscoverConfig {
    /// Load from `<file_prefix>.{toml,json,...}` (optional) and the
    /// environment. A missing `[discover]` section yields the defaults.
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("BEACON")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut loaded = match cfg.get::<DiscoverConfig>("discover") {
            Ok(c) => c,
            Err(config::ConfigError::NotFound(_)) => Self::default(),
            Err(e) => return Err(e.into()),
        };
        loaded.dedup_protocols();
        Ok(loaded)
    }

    /// Drop repeated protocols, keeping the first occurrence of each.
    pub fn dedup_protocols(&mut self) {
        let mut seen = HashSet::new();
        self.protocols.retain(|p| seen.insert(*p));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = DiscoverConfig::default();
        assert_eq!(config.interface, None);
        assert_eq!(
            config.protocols,
            vec![ProtocolKind::Ubiquiti, ProtocolKind::Mndp]
        );
        assert!(config.promiscuous);
        assert_eq!(config.snaplen, 65535);
        assert_eq!(config.read_timeout_ms, 500);
        assert_eq!(config.stop_timeout_ms, 2000);
        assert_eq!(config.report_interval_secs, 30);
    }

    #[test]
    fn test_protocol_ports() {
        assert_eq!(ProtocolKind::Ubiquiti.port(), 10001);
        assert_eq!(ProtocolKind::Mndp.port(), 5678);
        assert_eq!(ProtocolKind::Mndp.decoder().port(), 5678);
        assert_eq!(ProtocolKind::Ubiquiti.decoder().brand(), "Ubiquiti");
    }

    #[test]
    fn test_dedup_protocols_keeps_first_occurrence() {
        let mut config = DiscoverConfig {
            protocols: vec![
                ProtocolKind::Ubiquiti,
                ProtocolKind::Mndp,
                ProtocolKind::Ubiquiti,
                ProtocolKind::Mndp,
            ],
            ..DiscoverConfig::default()
        };
        config.dedup_protocols();
        assert_eq!(
            config.protocols,
            vec![ProtocolKind::Ubiquiti, ProtocolKind::Mndp]
        );
    }

    #[test]
    fn test_loaded_protocols_are_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("dup.toml"),
            "[discover]\nprotocols = [\"mndp\", \"ubiquiti\", \"mndp\"]\n",
        )
        .unwrap();

        let prefix = dir.path().join("dup");
        let config = DiscoverConfig::load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(
            config.protocols,
            vec![ProtocolKind::Mndp, ProtocolKind::Ubiquiti]
        );
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("absent");
        let config = DiscoverConfig::load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(config, DiscoverConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beacon.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[discover]
interface = "eth1"
protocols = ["mndp"]
promiscuous = false
stop_timeout_ms = 750
"#
        )
        .unwrap();

        let prefix = dir.path().join("beacon");
        let config = DiscoverConfig::load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(config.interface.as_deref(), Some("eth1"));
        assert_eq!(config.protocols, vec![ProtocolKind::Mndp]);
        assert!(!config.promiscuous);
        assert_eq!(config.stop_timeout_ms, 750);
        // Untouched keys keep their defaults.
        assert_eq!(config.snaplen, 65535);
        assert_eq!(config.report_interval_secs, 30);
    }
}
