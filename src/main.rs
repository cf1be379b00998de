//! snapmon - snap refresh monitor
//!
//! Watches snapd for refreshes held back by running apps and reports them.
//!
//! ## Usage
//!
//! ```bash
//! # Monitor the system snapd
//! snapmon
//!
//! # With verbose logging
//! snapmon -v
//!
//! # Against a specific socket, with a config file
//! snapmon --socket /run/snapd.socket --config ~/.config/snapmon/config.yaml
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use snapmon_core::{LogGuard, MonitorConfig, SnapmonError, init_logging};
use snapmon_monitor::{RefreshEvent, RefreshMonitor};
use tracing::{error, info, warn};

/// Snap refresh monitor
///
/// Follows snapd notices, tracks refresh progress and reports refreshes
/// that are waiting for running applications to close.
#[derive(Parser, Debug)]
#[command(name = "snapmon")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging (increases log level)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory for log files (defaults to ~/.local/state/snapmon/logs/)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Config file (defaults to ~/.config/snapmon/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// snapd socket path
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Talk HTTP to this URL instead of the socket
    #[arg(long)]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match setup_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::from(1);
        }
    };

    info!("Starting snapmon");

    match run(cli).await {
        Ok(()) => {
            info!("snapmon exited normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("snapmon error: {:#}", e);
            eprintln!("Error: {:#}", e);
            if let Some(hint) = e
                .chain()
                .find_map(|cause| cause.downcast_ref::<SnapmonError>())
                .and_then(SnapmonError::guidance)
            {
                eprintln!("Hint: {}", hint);
            }
            ExitCode::from(1)
        }
    }
}

/// Set up logging based on CLI arguments.
fn setup_logging(cli: &Cli) -> snapmon_core::Result<LogGuard> {
    init_logging(cli.log_dir.clone(), cli.verbose > 0)
}

fn load_config(cli: &Cli) -> anyhow::Result<MonitorConfig> {
    let mut config =
        MonitorConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(socket) = &cli.socket {
        config = config.with_socket_path(socket);
    }
    if let Some(url) = &cli.base_url {
        config = config.with_base_url(url);
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    info!(
        socket = %config.daemon.socket().display(),
        base_url = ?config.daemon.base_url,
        poll_interval_ms = config.poll_interval_ms,
        "configuration loaded"
    );

    let (mut monitor, mut events) = RefreshMonitor::from_config(&config);
    monitor.start();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => report(&event),
                None => {
                    warn!("event channel closed");
                    break;
                }
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for ctrl-c")?;
                info!("interrupted, shutting down");
                break;
            }
        }
    }

    monitor.shutdown().await;
    Ok(())
}

fn report(event: &RefreshEvent) {
    match event {
        RefreshEvent::PendingRefresh { snaps } => {
            let names: Vec<&str> = snaps.iter().map(|snap| snap.name.as_str()).collect();
            info!(snaps = ?names, "refresh pending, close these apps to update");
        }
        RefreshEvent::PendingRefreshForced {
            snap,
            remaining_secs,
            warning_tier,
        } => {
            info!(
                snap = %snap.name,
                remaining_secs,
                warning_tier,
                "snap will be refreshed even if running"
            );
        }
        RefreshEvent::RefreshComplete {
            snap,
            fallback_name,
        } => {
            let name = snap
                .as_ref()
                .map(|snap| snap.name.as_str())
                .or(fallback_name.as_deref())
                .unwrap_or("unknown");
            let version = snap.as_ref().and_then(|snap| snap.version.as_deref());
            info!(snap = name, version, "refresh complete");
        }
    }
}
