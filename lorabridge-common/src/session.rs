use std::future::Future;
use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
};
use tokio::task::JoinHandle;

use crate::config::MqttConfig;
use crate::error::{Error, Result};

const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Something that can publish a text payload to a topic.
///
/// Both bridge tasks hold a clone of the publisher; the MQTT implementation
/// is backed by [`AsyncClient`], which is internally thread-safe.
pub trait Publisher: Clone + Send + Sync + 'static {
    fn publish(&self, topic: &str, payload: &str) -> impl Future<Output = Result<()>> + Send;
}

/// An established bus connection.
///
/// `close` consumes the session, so teardown can only ever happen once.
pub trait BusSession: Send + 'static {
    type Publisher: Publisher;

    fn publisher(&self) -> Self::Publisher;

    fn close(self) -> impl Future<Output = Result<()>> + Send;
}

/// Publisher handle backed by the shared MQTT client.
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl Publisher for MqttPublisher {
    fn publish(&self, topic: &str, payload: &str) -> impl Future<Output = Result<()>> + Send {
        let client = self.client.clone();
        let topic = topic.to_string();
        let payload = payload.to_string();

        async move {
            client
                .publish(topic.as_str(), QoS::AtMostOnce, false, payload.into_bytes())
                .await
                .map_err(|e| Error::Publish {
                    topic,
                    message: e.to_string(),
                })
        }
    }
}

/// An MQTT session: the client handle plus the background event loop driver.
pub struct MqttSession {
    client: AsyncClient,
    driver: JoinHandle<()>,
}

impl BusSession for MqttSession {
    type Publisher = MqttPublisher;

    fn publisher(&self) -> MqttPublisher {
        MqttPublisher {
            client: self.client.clone(),
        }
    }

    fn close(self) -> impl Future<Output = Result<()>> + Send {
        async move {
            if let Err(e) = self.client.disconnect().await {
                tracing::warn!(error = %e, "MQTT disconnect request failed");
            }

            // Reap the driver; abort it if the disconnect never flushes.
            let abort = self.driver.abort_handle();
            if tokio::time::timeout(SHUTDOWN_GRACE, self.driver)
                .await
                .is_err()
            {
                abort.abort();
            }

            tracing::info!("MQTT connection closed");
            Ok(())
        }
    }
}

/// Connect to the MQTT broker using the provided configuration.
///
/// The connection is only considered established once the broker has
/// acknowledged it; anything short of a successful CONNACK is an error.
pub async fn connect(config: &MqttConfig) -> Result<MqttSession> {
    let mut options = MqttOptions::new(&config.client_id, &config.server, config.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

    tracing::info!(
        server = %config.server,
        port = config.port,
        client_id = %config.client_id,
        "Connecting to MQTT broker"
    );

    let (client, mut eventloop) = AsyncClient::new(options, 64);

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code != ConnectReturnCode::Success {
                    return Err(Error::Connect(format!(
                        "broker refused connection: {:?}",
                        ack.code
                    )));
                }
                break;
            }
            Ok(_) => continue,
            Err(e) => return Err(Error::Connect(e.to_string())),
        }
    }

    tracing::info!("Connected to MQTT broker");

    let driver = tokio::spawn(drive(eventloop));

    Ok(MqttSession { client, driver })
}

/// Drive the MQTT event loop until the client disconnects.
///
/// rumqttc reconnects by re-polling after an error; the backoff keeps a dead
/// broker from turning this loop into a busy spin.
async fn drive(mut eventloop: EventLoop) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                tracing::debug!("MQTT disconnect sent, stopping event loop");
                break;
            }
            Ok(event) => {
                tracing::trace!(?event, "MQTT event");
            }
            Err(e) => {
                tracing::error!(error = %e, "MQTT connection error");
                tokio::time::sleep(RECONNECT_BACKOFF).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    // Session tests require a live MQTT broker, which we can't easily mock at
    // this level. The scheduler tests cover publish and teardown semantics
    // against a mock BusSession implementation.
}
