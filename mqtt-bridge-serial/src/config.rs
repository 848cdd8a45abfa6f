//! Configuration for the serial bridge.
//!
//! Settings are layered: built-in defaults, then the optional JSON5 config
//! file, then environment variables. The environment wins, so a container
//! deployment can run without any config file at all.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use lorabridge_common::config::{LoggingConfig, MqttConfig};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid value for {key}: {message}")]
    Env { key: String, message: String },
}

/// Complete bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// MQTT broker connection settings.
    #[serde(default)]
    pub mqtt: MqttConfig,

    /// Serial device settings.
    #[serde(default)]
    pub serial: SerialConfig,

    /// Forwarding of decoded serial lines.
    #[serde(default)]
    pub forward: ForwardConfig,

    /// Periodic host telemetry.
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial device configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Serial device path (e.g., "/dev/ttyS0" or "/dev/ttyUSB0").
    #[serde(default = "default_serial_url")]
    pub url: String,

    /// Baud rate.
    #[serde(default = "default_baudrate")]
    pub baudrate: u32,
}

fn default_serial_url() -> String {
    "/dev/ttyS0".to_string()
}

fn default_baudrate() -> u32 {
    9600
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            url: default_serial_url(),
            baudrate: default_baudrate(),
        }
    }
}

/// Configuration for the line forwarding task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardConfig {
    /// Topic that decoded serial lines are published to.
    #[serde(default = "default_forward_topic")]
    pub topic: String,

    /// Topic for bridge status messages (running/offline).
    #[serde(default = "default_status_topic")]
    pub status_topic: String,
}

fn default_forward_topic() -> String {
    "lora/".to_string()
}

fn default_status_topic() -> String {
    "bridge/status".to_string()
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            topic: default_forward_topic(),
            status_topic: default_status_topic(),
        }
    }
}

/// Configuration for the telemetry task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Seconds between telemetry cycles.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Topic for temperature readings.
    #[serde(default = "default_temperature_topic")]
    pub temperature_topic: String,

    /// Topic for uptime readings.
    #[serde(default = "default_uptime_topic")]
    pub uptime_topic: String,

    /// Sysfs file holding the CPU temperature in millidegrees Celsius.
    #[serde(default = "default_thermal_zone")]
    pub thermal_zone: PathBuf,

    /// Directory whose creation time marks process start (procfs entry).
    #[serde(default = "default_init_process")]
    pub init_process: PathBuf,
}

fn default_interval() -> u64 {
    60
}

fn default_temperature_topic() -> String {
    "bridge/temperature".to_string()
}

fn default_uptime_topic() -> String {
    "bridge/uptime".to_string()
}

fn default_thermal_zone() -> PathBuf {
    PathBuf::from("/sys/class/thermal/thermal_zone0/temp")
}

fn default_init_process() -> PathBuf {
    PathBuf::from("/proc/1")
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            temperature_topic: default_temperature_topic(),
            uptime_topic: default_uptime_topic(),
            thermal_zone: default_thermal_zone(),
            init_process: default_init_process(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from the optional JSON5 file, then apply
    /// environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config: Self = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                json5::from_str(&content)?
            }
            None => Self::default(),
        };

        config.apply_env_from(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment-style overrides from a lookup function.
    fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup("MQTT_SERVER") {
            self.mqtt.server = value;
        }
        if let Some(value) = lookup("MQTT_PORT") {
            self.mqtt.port = parse_env("MQTT_PORT", &value)?;
        }
        if let Some(value) = lookup("MQTT_TOPIC") {
            self.forward.topic = value;
        }
        if let Some(value) = lookup("STATUS_TOPIC") {
            self.forward.status_topic = value;
        }
        if let Some(value) = lookup("TEMPERATURE_TOPIC") {
            self.telemetry.temperature_topic = value;
        }
        if let Some(value) = lookup("UPTIME_TOPIC") {
            self.telemetry.uptime_topic = value;
        }
        if let Some(value) = lookup("SLEEP_INTERVAL") {
            self.telemetry.interval_secs = parse_env("SLEEP_INTERVAL", &value)?;
        }
        if let Some(value) = lookup("SERIAL_URL") {
            self.serial.url = value;
        }
        if let Some(value) = lookup("SERIAL_BAUDRATE") {
            self.serial.baudrate = parse_env("SERIAL_BAUDRATE", &value)?;
        }
        if let Some(value) = lookup("LOG_FILE") {
            // An empty LOG_FILE disables the file sink.
            self.logging.file = if value.is_empty() {
                None
            } else {
                Some(PathBuf::from(value))
            };
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.server.is_empty() {
            return Err(ConfigError::Validation(
                "MQTT server cannot be empty".to_string(),
            ));
        }
        if self.serial.baudrate == 0 {
            return Err(ConfigError::Validation(
                "Serial baud rate must be non-zero".to_string(),
            ));
        }
        if self.telemetry.interval_secs == 0 {
            return Err(ConfigError::Validation(
                "Telemetry interval must be non-zero".to_string(),
            ));
        }
        for (name, topic) in [
            ("forward topic", &self.forward.topic),
            ("status topic", &self.forward.status_topic),
            ("temperature topic", &self.telemetry.temperature_topic),
            ("uptime topic", &self.telemetry.uptime_topic),
        ] {
            if topic.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "{} cannot be empty",
                    name
                )));
            }
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e| ConfigError::Env {
        key: key.to_string(),
        message: format!("'{}': {}", value, e),
    })
}
