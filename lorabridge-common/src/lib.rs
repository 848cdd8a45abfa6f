//! LoRa Bridge Common Library
//!
//! This crate provides shared types and utilities for the serial-to-MQTT
//! bridge:
//!
//! - [`config`] - MQTT and logging configuration (JSON5 format)
//! - [`session`] - MQTT session management and the publisher abstraction
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod session;

// Re-export commonly used types at the crate root
pub use config::{LogFormat, LoggingConfig, MqttConfig, load_config, parse_config};
pub use error::{Error, Result};
pub use session::{BusSession, MqttPublisher, MqttSession, Publisher, connect};

/// Initialize tracing with the given configuration.
///
/// Log lines go to the console and, when configured, to an append-mode log
/// file. A log file that cannot be opened degrades to console-only logging
/// with a warning; it never prevents startup.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use std::sync::Arc;
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (file_writer, file_error) = match &config.file {
        Some(path) => match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => (Some(Arc::new(file)), None),
            Err(e) => (None, Some(format!("{}: {}", path.display(), e))),
        },
        None => (None, None),
    };

    match config.format {
        LogFormat::Text => {
            let file_layer = file_writer
                .map(|writer| fmt::layer().with_ansi(false).with_writer(writer));
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(file_layer)
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            let file_layer = file_writer
                .map(|writer| fmt::layer().json().with_ansi(false).with_writer(writer));
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(file_layer)
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    if let Some(reason) = file_error {
        tracing::warn!(%reason, "Could not open log file, logging to console only");
    }

    Ok(())
}
