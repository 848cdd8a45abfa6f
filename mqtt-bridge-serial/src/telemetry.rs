//! Host telemetry collection and periodic publishing.
//!
//! Every cycle reads the CPU temperature and the process uptime and publishes
//! each to its own topic. A failed sensor read skips that metric for the
//! current cycle only; sensor failure is never telemetry-task failure.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use lorabridge_common::Publisher;

use crate::config::TelemetryConfig;

/// Errors produced by sensor reads.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected contents in {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// On-demand access to the host sensors.
///
/// Injected into [`TelemetryPublisher`] so tests can substitute fixed
/// readings for the real sysfs/procfs sources.
pub trait TelemetrySource: Send + 'static {
    /// Current CPU temperature in millidegrees Celsius.
    fn temperature_millis(&mut self) -> Result<i64, SensorError>;

    /// Time elapsed since the monitored process started.
    fn process_uptime(&mut self) -> Result<Duration, SensorError>;
}

/// Sensor reads backed by the host's sysfs thermal zone and procfs.
pub struct HostTelemetry {
    thermal_zone: PathBuf,
    init_process: PathBuf,
}

impl HostTelemetry {
    pub fn new(config: &TelemetryConfig) -> Self {
        Self {
            thermal_zone: config.thermal_zone.clone(),
            init_process: config.init_process.clone(),
        }
    }
}

impl TelemetrySource for HostTelemetry {
    fn temperature_millis(&mut self) -> Result<i64, SensorError> {
        let text = std::fs::read_to_string(&self.thermal_zone).map_err(|e| SensorError::Io {
            path: self.thermal_zone.clone(),
            source: e,
        })?;

        text.trim().parse().map_err(|e| SensorError::Parse {
            path: self.thermal_zone.clone(),
            message: format!("'{}': {}", text.trim(), e),
        })
    }

    fn process_uptime(&mut self) -> Result<Duration, SensorError> {
        use std::os::unix::fs::MetadataExt;

        let meta = std::fs::metadata(&self.init_process).map_err(|e| SensorError::Io {
            path: self.init_process.clone(),
            source: e,
        })?;

        let started = meta.ctime();
        let now = chrono::Utc::now().timestamp();
        Ok(Duration::from_secs(now.saturating_sub(started).max(0) as u64))
    }
}

/// Render a temperature payload from a millidegree reading.
///
/// The value always carries at least one decimal place: `42000` becomes
/// `Temperature: 42.0 °C`.
pub fn format_temperature(millis: i64) -> String {
    let celsius = millis as f64 / 1000.0;
    if celsius.fract() == 0.0 {
        format!("Temperature: {:.1} °C", celsius)
    } else {
        format!("Temperature: {} °C", celsius)
    }
}

/// Render an uptime payload as `Uptime: HH:MM:SS`.
///
/// Hours are not wrapped at 24, so long-running processes keep counting up.
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!(
        "Uptime: {:02}:{:02}:{:02}",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

/// Periodic publisher for host telemetry.
pub struct TelemetryPublisher<S, P> {
    source: S,
    publisher: P,
    config: TelemetryConfig,
}

impl<S: TelemetrySource, P: Publisher> TelemetryPublisher<S, P> {
    pub fn new(source: S, publisher: P, config: TelemetryConfig) -> Self {
        Self {
            source,
            publisher,
            config,
        }
    }

    /// Run the telemetry loop forever.
    ///
    /// Each cycle suspends for the configured interval first, then publishes.
    /// The ticker keeps the cadence fixed even when a cycle runs long.
    pub async fn run(mut self) {
        let period = Duration::from_secs(self.config.interval_secs);

        info!(
            interval_secs = self.config.interval_secs,
            "Starting telemetry publisher"
        );

        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    /// One telemetry cycle: read and publish each metric independently.
    pub async fn tick(&mut self) {
        match self.source.temperature_millis() {
            Ok(millis) => {
                let payload = format_temperature(millis);
                match self
                    .publisher
                    .publish(&self.config.temperature_topic, &payload)
                    .await
                {
                    Ok(()) => info!(
                        topic = %self.config.temperature_topic,
                        payload = %payload,
                        "Temperature published"
                    ),
                    Err(e) => warn!(error = %e, "Failed to publish temperature"),
                }
            }
            Err(e) => error!(error = %e, "Error reading temperature"),
        }

        match self.source.process_uptime() {
            Ok(uptime) => {
                let payload = format_uptime(uptime);
                match self
                    .publisher
                    .publish(&self.config.uptime_topic, &payload)
                    .await
                {
                    Ok(()) => info!(
                        topic = %self.config.uptime_topic,
                        payload = %payload,
                        "Uptime published"
                    ),
                    Err(e) => warn!(error = %e, "Failed to publish uptime"),
                }
            }
            Err(e) => error!(error = %e, "Error reading uptime"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    use lorabridge_common::Result;

    #[derive(Clone, Default)]
    struct MockPublisher {
        records: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl MockPublisher {
        fn recorded(&self) -> Vec<(String, String)> {
            self.records.lock().unwrap().clone()
        }
    }

    impl Publisher for MockPublisher {
        fn publish(
            &self,
            topic: &str,
            payload: &str,
        ) -> impl std::future::Future<Output = Result<()>> + Send {
            let records = self.records.clone();
            let entry = (topic.to_string(), payload.to_string());
            async move {
                records.lock().unwrap().push(entry);
                Ok(())
            }
        }
    }

    struct MockSource {
        temperature: Option<i64>,
        uptime: Option<u64>,
    }

    impl TelemetrySource for MockSource {
        fn temperature_millis(&mut self) -> std::result::Result<i64, SensorError> {
            self.temperature.ok_or_else(|| SensorError::Parse {
                path: PathBuf::from("temp"),
                message: "unavailable".to_string(),
            })
        }

        fn process_uptime(&mut self) -> std::result::Result<Duration, SensorError> {
            self.uptime
                .map(Duration::from_secs)
                .ok_or_else(|| SensorError::Parse {
                    path: PathBuf::from("uptime"),
                    message: "unavailable".to_string(),
                })
        }
    }

    #[test]
    fn test_format_temperature_whole_degrees() {
        assert_eq!(format_temperature(42000), "Temperature: 42.0 °C");
    }

    #[test]
    fn test_format_temperature_fractional() {
        assert_eq!(format_temperature(42500), "Temperature: 42.5 °C");
        assert_eq!(format_temperature(42055), "Temperature: 42.055 °C");
    }

    #[test]
    fn test_format_temperature_negative() {
        assert_eq!(format_temperature(-5000), "Temperature: -5.0 °C");
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "Uptime: 00:00:00");
        assert_eq!(format_uptime(Duration::from_secs(3661)), "Uptime: 01:01:01");
        assert_eq!(
            format_uptime(Duration::from_secs(100 * 3600 + 59)),
            "Uptime: 100:00:59"
        );
    }

    #[tokio::test]
    async fn test_tick_publishes_both_metrics() {
        let publisher = MockPublisher::default();
        let source = MockSource {
            temperature: Some(42000),
            uptime: Some(3661),
        };
        let mut telemetry =
            TelemetryPublisher::new(source, publisher.clone(), TelemetryConfig::default());

        telemetry.tick().await;

        assert_eq!(
            publisher.recorded(),
            vec![
                (
                    "bridge/temperature".to_string(),
                    "Temperature: 42.0 °C".to_string()
                ),
                ("bridge/uptime".to_string(), "Uptime: 01:01:01".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_tick_skips_absent_uptime() {
        let publisher = MockPublisher::default();
        let source = MockSource {
            temperature: Some(42000),
            uptime: None,
        };
        let mut telemetry =
            TelemetryPublisher::new(source, publisher.clone(), TelemetryConfig::default());

        telemetry.tick().await;

        assert_eq!(
            publisher.recorded(),
            vec![(
                "bridge/temperature".to_string(),
                "Temperature: 42.0 °C".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_tick_skips_absent_temperature() {
        let publisher = MockPublisher::default();
        let source = MockSource {
            temperature: None,
            uptime: Some(60),
        };
        let mut telemetry =
            TelemetryPublisher::new(source, publisher.clone(), TelemetryConfig::default());

        telemetry.tick().await;

        assert_eq!(
            publisher.recorded(),
            vec![("bridge/uptime".to_string(), "Uptime: 00:01:00".to_string())]
        );
    }

    #[tokio::test]
    async fn test_tick_all_sensors_failed() {
        let publisher = MockPublisher::default();
        let source = MockSource {
            temperature: None,
            uptime: None,
        };
        let mut telemetry =
            TelemetryPublisher::new(source, publisher.clone(), TelemetryConfig::default());

        telemetry.tick().await;

        assert!(publisher.recorded().is_empty());
    }

    #[test]
    fn test_host_temperature_reads_millidegrees() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "42000").unwrap();

        let mut source = HostTelemetry {
            thermal_zone: file.path().to_path_buf(),
            init_process: PathBuf::from("/proc/1"),
        };

        assert_eq!(source.temperature_millis().unwrap(), 42000);
    }

    #[test]
    fn test_host_temperature_garbage_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not-a-number").unwrap();

        let mut source = HostTelemetry {
            thermal_zone: file.path().to_path_buf(),
            init_process: PathBuf::from("/proc/1"),
        };

        assert!(matches!(
            source.temperature_millis(),
            Err(SensorError::Parse { .. })
        ));
    }

    #[test]
    fn test_host_temperature_missing_file() {
        let mut source = HostTelemetry {
            thermal_zone: PathBuf::from("/nonexistent/thermal"),
            init_process: PathBuf::from("/proc/1"),
        };

        assert!(matches!(
            source.temperature_millis(),
            Err(SensorError::Io { .. })
        ));
    }

    #[test]
    fn test_host_uptime_from_directory_ctime() {
        let dir = tempfile::tempdir().unwrap();

        let mut source = HostTelemetry {
            thermal_zone: PathBuf::from("/nonexistent/thermal"),
            init_process: dir.path().to_path_buf(),
        };

        // A freshly created directory has effectively zero uptime.
        let uptime = source.process_uptime().unwrap();
        assert!(uptime < Duration::from_secs(60));
    }
}
