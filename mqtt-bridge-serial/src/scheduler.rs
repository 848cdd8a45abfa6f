//! Bridge lifecycle management.
//!
//! The scheduler establishes the bus connection once, runs the serial-forward
//! task and the telemetry task concurrently, and guarantees that the bus
//! connection is released exactly once on every exit path. The two tasks are
//! isolated: a fatal serial failure ends only the serial task, so host
//! telemetry stays observable even when the peripheral is unreachable.

use std::future::Future;
use std::time::Duration;

use tracing::{error, info, warn};

use lorabridge_common::{BusSession, Publisher, Result, session};

use crate::config::BridgeConfig;
use crate::serial;
use crate::telemetry::{HostTelemetry, TelemetryPublisher, TelemetrySource};

const DRAIN_GRACE: Duration = Duration::from_millis(100);

/// Connect to the MQTT broker and run the bridge until `shutdown` resolves.
///
/// A connection failure here is fatal to the whole process; neither task can
/// operate without the bus.
pub async fn run(config: BridgeConfig, shutdown: impl Future<Output = ()> + Send) -> Result<()> {
    let session = match session::connect(&config.mqtt).await {
        Ok(session) => session,
        Err(e) => {
            error!(error = %e, "MQTT connection could not be established");
            return Err(e);
        }
    };
    info!("HEALTHCHECK: MQTT connection successfully established");

    let source = HostTelemetry::new(&config.telemetry);
    run_with(session, source, config, shutdown).await
}

/// Run the bridge tasks over an established session.
///
/// Draining is triggered by the shutdown future or by both tasks having
/// terminated; either way the session is closed exactly once (`close`
/// consumes it).
pub async fn run_with<S>(
    session: S,
    source: impl TelemetrySource,
    config: BridgeConfig,
    shutdown: impl Future<Output = ()> + Send,
) -> Result<()>
where
    S: BusSession,
{
    let publisher = session.publisher();

    publish_status(&publisher, &config, "running").await;

    let mut serial_task = tokio::spawn(serial::run_forwarder(
        config.serial.clone(),
        config.forward.topic.clone(),
        publisher.clone(),
    ));
    let mut telemetry_task = tokio::spawn(
        TelemetryPublisher::new(source, publisher.clone(), config.telemetry.clone()).run(),
    );

    info!("Bridge running");

    tokio::pin!(shutdown);
    tokio::select! {
        _ = &mut shutdown => {
            info!("Program terminated by user");
        }
        _ = async {
            let _ = (&mut serial_task).await;
            let _ = (&mut telemetry_task).await;
        } => {
            info!("All bridge tasks terminated");
        }
    }

    // Draining: stop both tasks and give in-flight publishes a moment.
    serial_task.abort();
    telemetry_task.abort();
    tokio::time::sleep(DRAIN_GRACE).await;

    publish_status(&publisher, &config, "offline").await;

    session.close().await?;
    info!("Bridge stopped");

    Ok(())
}

/// Publish a bridge status message; failures are logged, never fatal.
async fn publish_status<P: Publisher>(publisher: &P, config: &BridgeConfig, status: &str) {
    let payload = serde_json::json!({
        "bridge": "serial",
        "version": env!("CARGO_PKG_VERSION"),
        "status": status,
    });

    if let Err(e) = publisher
        .publish(&config.forward.status_topic, &payload.to_string())
        .await
    {
        warn!(error = %e, "Failed to publish bridge status");
    }
}

#[cfg(test)]
mod tests {
    // The scheduler is exercised end-to-end in tests/bridge_tests.rs with a
    // mock BusSession; connecting to a real broker is out of scope here.
}
