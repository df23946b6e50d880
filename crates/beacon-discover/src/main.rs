//! CLI entry point for the beacon-discover passive scanner.

use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};
use tracing_subscriber::{fmt, EnvFilter};

use beacon_core::DeviceEvent;

use beacon_discover::config::{DiscoverConfig, ProtocolKind};
use beacon_discover::report::{render_table, sort_devices, InventorySummary};
use beacon_discover::{PcapSource, ScannerManager};

#[derive(Parser)]
#[command(name = "beacon-discover")]
#[command(about = "Passive discovery of Ubiquiti, Mikrotik and Mimosa devices")]
struct Cli {
    /// Capture interface (default: libpcap's default device).
    #[arg(short, long)]
    interface: Option<String>,

    /// Protocol to listen for. Repeat to select several (default: all).
    #[arg(short, long = "protocol", value_enum)]
    protocols: Vec<ProtocolKind>,

    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(short, long)]
    duration: Option<u64>,

    /// Stream device events as JSON lines on stdout.
    #[arg(long)]
    events: bool,

    /// Print the final inventory as JSON.
    #[arg(long)]
    json: bool,

    /// Config file prefix (default: beacon).
    #[arg(short, long, default_value = "beacon")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let mut config = DiscoverConfig::load(&cli.config)?;
    if cli.interface.is_some() {
        config.interface = cli.interface.clone();
    }
    if !cli.protocols.is_empty() {
        config.protocols = cli.protocols.clone();
    }
    config.dedup_protocols();

    let source = Arc::new(PcapSource::new(&config));
    let manager = Arc::new(
        ScannerManager::new(source)
            .with_stop_timeout(Duration::from_millis(config.stop_timeout_ms)),
    );
    for protocol in &config.protocols {
        manager.register_scanner(protocol.decoder());
    }

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<DeviceEvent>();
    let tx = event_tx.clone();
    manager.set_on_new_device(move |device| {
        let _ = tx.send(DeviceEvent::discovered(device.clone()));
    });
    let tx = event_tx;
    manager.set_on_device_updated(move |device| {
        let _ = tx.send(DeviceEvent::updated(device.clone()));
    });

    manager.start(config.interface.as_deref())?;

    let deadline = async {
        match cli.duration {
            Some(secs) => sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut report = interval(Duration::from_secs(config.report_interval_secs.max(1)));
    report.set_missed_tick_behavior(MissedTickBehavior::Delay);
    report.tick().await;

    let mut health = interval(Duration::from_millis(250));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
            _ = &mut deadline => {
                tracing::info!(duration_secs = ?cli.duration, "Capture duration elapsed");
                break;
            }
            _ = report.tick() => {
                let summary = InventorySummary::from_devices(&manager.devices());
                tracing::info!(
                    total = summary.total,
                    by_brand = ?summary.by_brand,
                    "Inventory summary"
                );
            }
            _ = health.tick() => {
                if !manager.is_running() {
                    tracing::warn!("Capture loop ended on its own");
                    break;
                }
            }
            Some(event) = event_rx.recv() => {
                if cli.events {
                    println!("{}", serde_json::to_string(&event)?);
                }
            }
        }
    }

    let stopper = manager.clone();
    tokio::task::spawn_blocking(move || stopper.stop()).await?;

    // Sightings made just before shutdown are still queued.
    for event in drain_pending(&mut event_rx) {
        if cli.events {
            println!("{}", serde_json::to_string(&event)?);
        }
    }

    let mut devices = manager.devices();
    sort_devices(&mut devices);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
    } else {
        print!("{}", render_table(&devices));
    }

    Ok(())
}

/// Everything already queued on the channel, without waiting.
fn drain_pending(rx: &mut mpsc::UnboundedReceiver<DeviceEvent>) -> Vec<DeviceEvent> {
    let mut pending = Vec::new();
    while let Ok(event) = rx.try_recv() {
        pending.push(event);
    }
    pending
}
