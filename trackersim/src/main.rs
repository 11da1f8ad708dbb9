//! trackersim: GPS tracker simulator.
//!
//! Replays a route against a tracking server as one or more GT06 (binary)
//! or Suntech SA200 (text) units.

use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn};
use tokio::sync::watch;

mod config;
mod error;
mod logging;
mod runner;
mod session;
mod trajectory;

use config::{Args, ConfigFile, Settings};
use trajectory::TrajectorySource;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load config file: explicit path > auto-detect > default
    let file_config = match config::config_path(&args) {
        Some(path) => match config::load_config(&path) {
            Ok(c) => {
                eprintln!("Loaded config from: {}", path.display());
                c
            }
            Err(e) => {
                eprintln!("Failed to load config file: {}", e);
                return Err(e);
            }
        },
        None => ConfigFile::default(),
    };

    let settings = Settings::resolve(&args, &file_config)?;

    let log = &settings.logging;
    logging::init_logging(&log.log_dir, log.retention_days, log.verbose, log.level.as_deref())?;

    info!("trackersim v{}", env!("CARGO_PKG_VERSION"));
    info!("  Server: {} ({:?})", settings.server_addr(), settings.transport);
    info!("  Protocol: {:?}", settings.protocol);
    info!("  Devices: {}", settings.devices);
    let source: Arc<dyn TrajectorySource> = settings.trajectory();
    match &settings.track {
        Some(track) => info!(
            "  Route: recorded track of {} samples every {:?}",
            track.samples.len(),
            settings.interval
        ),
        None => info!(
            "  Route: {} samples at {} km/h every {:?}",
            settings.route.iterations + 1,
            settings.route.speed_kmh,
            settings.interval
        ),
    }

    let configs = settings.session_configs()?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping sessions");
            let _ = cancel_tx.send(true);
        }
    });

    let outcomes = runner::run_fleet(configs, source, cancel_rx).await;

    let total = outcomes.len();
    let failed = outcomes.iter().filter(|outcome| !outcome.is_ok()).count();
    for outcome in &outcomes {
        match &outcome.result {
            Ok(summary) => info!(
                "Device {} ({}): {}",
                outcome.device_index + 1,
                outcome.device_id,
                summary
            ),
            Err(e) => error!(
                "Device {} ({}) failed: {}",
                outcome.device_index + 1,
                outcome.device_id,
                e
            ),
        }
    }

    if failed > 0 {
        return Err(format!("{} of {} session(s) failed", failed, total).into());
    }
    info!("All {} session(s) finished", total);
    Ok(())
}
