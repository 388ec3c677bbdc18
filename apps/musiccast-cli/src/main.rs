//! MusicCast CLI - headless controller for Yamaha MusicCast receivers.
//!
//! Watches a receiver's zones, prints one-shot status and links or unlinks
//! distribution groups from the command line.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use musiccast_core::{
    Controller, Device, DistributionGroup, FnNotifier, GroupId, GroupMember, HttpTransport,
};
use tokio::signal;
use tokio::sync::mpsc;

use crate::config::CliConfig;

/// MusicCast CLI - control and group Yamaha MusicCast receivers.
#[derive(Parser, Debug)]
#[command(name = "musiccast")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "MUSICCAST_LOG_LEVEL", global = true)]
    log_level: log::LevelFilter,

    /// First UDP port for device events (overrides config file).
    #[arg(short = 'p', long, env = "MUSICCAST_UDP_PORT", global = true)]
    udp_port: Option<u16>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Follow a device and log zone changes until Ctrl+C.
    Watch {
        /// Host or IP of the receiver.
        host: String,
    },
    /// Print device info and zone status once.
    Status {
        /// Host or IP of the receiver.
        host: String,
    },
    /// Link clients to a master and print the new group id.
    Link {
        #[arg(long)]
        master: String,
        #[arg(long = "client", required = true)]
        clients: Vec<String>,
    },
    /// Tear down a group.
    Unlink {
        #[arg(long)]
        master: String,
        #[arg(long = "client", required = true)]
        clients: Vec<String>,
        /// Group id (32 hex characters).
        #[arg(long)]
        group_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("MusicCast CLI v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        CliConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(port) = args.udp_port {
        config.udp_port = port;
    }

    let core_config = config.to_core_config();
    log::debug!("Configuration: {:?}", core_config);

    match args.command {
        Command::Watch { host } => {
            let controller =
                Controller::new(core_config).context("Failed to create controller")?;
            watch(&controller, &host).await
        }
        Command::Status { host } => status(&host).await,
        Command::Link { master, clients } => {
            let controller =
                Controller::new(core_config).context("Failed to create controller")?;
            let group = controller
                .join(&master, &clients)
                .await
                .context("Link failed")?;
            println!("{}", group.id);
            Ok(())
        }
        Command::Unlink {
            master,
            clients,
            group_id,
        } => {
            let id = GroupId::parse(&group_id)
                .filter(|id| !id.is_null())
                .ok_or_else(|| anyhow!("Invalid group id: {group_id}"))?;
            let zone = core_config.link.zone.clone();
            let controller =
                Controller::new(core_config).context("Failed to create controller")?;
            let group = DistributionGroup {
                id,
                master: GroupMember::new(master, zone.clone()),
                clients: clients
                    .into_iter()
                    .map(|c| GroupMember::new(c, zone.clone()))
                    .collect(),
                name: String::new(),
            };
            if !controller.linker().unlink(&group).await {
                bail!("Unlink finished with errors (see log)");
            }
            log::info!("Group {} dissolved", id);
            Ok(())
        }
    }
}

/// Runs a device until a shutdown signal, printing zones on every change.
async fn watch(controller: &Controller, host: &str) -> Result<()> {
    let device = controller
        .add_device(host, None)
        .await
        .with_context(|| format!("Failed to connect to {host}"))?;

    let (tx, mut rx) = mpsc::unbounded_channel::<()>();
    device
        .set_notifier(FnNotifier::shared(move || {
            // a closed channel only means we are shutting down
            let _ = tx.send(());
            Ok(())
        }))
        .await;

    // initial snapshot
    device.poll().await;
    if let Err(e) = device.refresh_play_info().await {
        log::debug!("No play info: {}", e);
    }

    log::info!("Watching {} ({}), press Ctrl+C to stop", host, device.info().model_name);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            Some(()) = rx.recv() => {
                // coalesce bursts into one print
                while rx.try_recv().is_ok() {}
                print_zones(&device).await?;
            }
        }
    }

    log::info!("Shutdown signal received, cleaning up...");
    let stats = device.stats();
    log::info!(
        "Events: received={} dispatched={} dropped={} malformed={} foreign={}",
        stats.received,
        stats.dispatched,
        stats.dropped_overflow,
        stats.malformed,
        stats.foreign
    );
    controller.shutdown().await;
    log::info!("Shutdown complete");
    Ok(())
}

/// Connects without starting the event pipeline and prints one snapshot.
async fn status(host: &str) -> Result<()> {
    let transport = HttpTransport::with_defaults().context("Failed to create HTTP client")?;
    let device = Device::connect(host, Arc::new(transport), Default::default(), None)
        .await
        .with_context(|| format!("Failed to connect to {host}"))?;

    device.poll().await;
    if let Err(e) = device.refresh_play_info().await {
        log::debug!("No play info: {}", e);
    }

    print!(
        "{}",
        serde_yaml::to_string(device.info()).context("Failed to render device info")?
    );
    match device.location_info().await {
        Ok(location) => println!("location: {} ({})", location.name, location.id),
        Err(e) => log::debug!("No location info: {}", e),
    }
    match device.network_status().await {
        Ok(network) => println!(
            "network: {} via {} at {}",
            network.network_name, network.connection, network.ip_address
        ),
        Err(e) => log::debug!("No network status: {}", e),
    }
    print_zones(&device).await
}

async fn print_zones(device: &Device) -> Result<()> {
    for id in device.zone_ids() {
        let Some(zone) = device.zone(&id) else {
            continue;
        };
        let attributes = zone.attributes().await;
        println!("--- {}/{}", device.address(), id);
        print!(
            "{}",
            serde_yaml::to_string(&attributes).context("Failed to render zone")?
        );
        if let Some(media) = zone.media_status().await {
            println!(
                "now_playing: {} - {} ({:?}/{:?})",
                media.artist(),
                media.track(),
                media.position(),
                media.duration()
            );
        }
    }
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
