//! MQTT bridge for line-oriented serial devices.
//!
//! Every newline-terminated message received on the serial link is forwarded
//! verbatim to a fixed topic, while a separate periodic task publishes host
//! telemetry (CPU temperature, process uptime) to dedicated topics.
//!
//! # Topics
//!
//! ```text
//! lora/                decoded serial lines, verbatim
//! bridge/temperature   "Temperature: {celsius} °C"
//! bridge/uptime        "Uptime: HH:MM:SS"
//! bridge/status        bridge status (running/offline)
//! ```
//!
//! All topics and the serial/broker endpoints are configurable through a
//! JSON5 file and environment variables (environment wins).

pub mod config;
pub mod scheduler;
pub mod serial;
pub mod telemetry;
