//! MQTT bridge for line-oriented serial devices.
//!
//! Forwards newline-terminated serial messages to MQTT and publishes host
//! telemetry (CPU temperature, process uptime) on a fixed interval.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use mqtt_bridge_serial::config::BridgeConfig;
use mqtt_bridge_serial::scheduler;

/// MQTT bridge for line-oriented serial devices.
#[derive(Parser, Debug)]
#[command(name = "mqtt-bridge-serial")]
#[command(about = "Forwards serial lines to MQTT and publishes host telemetry")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format); environment variables
    /// override values from the file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = BridgeConfig::load(args.config.as_deref()).with_context(|| {
        match &args.config {
            Some(path) => format!("Failed to load config from {:?}", path),
            None => "Failed to load configuration".to_string(),
        }
    })?;

    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    lorabridge_common::init_tracing(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting mqtt-bridge-serial"
    );

    scheduler::run(config, shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    Ok(())
}

/// Resolves when the process receives an interrupt.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
    }
}
