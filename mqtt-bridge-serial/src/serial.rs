//! Serial line source and the line forwarding task.
//!
//! The serial device produces an unbounded stream of newline-terminated
//! messages. Each decoded line is forwarded verbatim to the configured topic.
//! Truncated or undecodable lines are logged and skipped; any other I/O
//! failure permanently stops this task without touching the telemetry task.

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_serial::SerialStream;
use tracing::{error, info, warn};

use lorabridge_common::Publisher;

use crate::config::SerialConfig;

/// Errors produced while reading lines from the serial stream.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The stream ended before a newline arrived.
    #[error("incomplete read: stream ended before a newline")]
    Incomplete,

    /// The received bytes are not valid UTF-8.
    #[error("invalid UTF-8 in received data: {0}")]
    Decode(#[from] std::str::Utf8Error),

    /// Any other I/O failure. Fatal for the connection.
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReadError {
    /// Recoverable errors are logged and the read loop continues; the
    /// connection is not torn down.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ReadError::Incomplete | ReadError::Decode(_))
    }
}

/// Buffered reader yielding decoded lines from a byte stream.
///
/// Generic over the underlying stream so tests can drive it with an in-memory
/// pipe instead of a serial device.
pub struct LineReader<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
        }
    }

    /// Read the next line, suspending until a newline byte is observed.
    ///
    /// Returns the bytes up to and excluding the newline, decoded as UTF-8,
    /// with a trailing carriage return removed.
    pub async fn next_line(&mut self) -> Result<String, ReadError> {
        let mut buf = Vec::new();
        self.reader.read_until(b'\n', &mut buf).await?;

        if buf.last() != Some(&b'\n') {
            return Err(ReadError::Incomplete);
        }
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }

        let text = std::str::from_utf8(&buf)?;
        Ok(text.to_owned())
    }
}

/// Forward decoded lines from `reader` to `topic` until a fatal read error.
pub async fn forward_lines<R, P>(reader: R, topic: &str, publisher: &P)
where
    R: AsyncRead + Unpin,
    P: Publisher,
{
    let mut lines = LineReader::new(reader);

    loop {
        match lines.next_line().await {
            Ok(line) => {
                info!(line = %line, "Received message");
                match publisher.publish(topic, &line).await {
                    Ok(()) => info!(topic = %topic, "Message published"),
                    Err(e) => warn!(error = %e, "Failed to publish message"),
                }
            }
            Err(e) if e.is_recoverable() => {
                error!(error = %e, "Serial read failed, retrying");
            }
            Err(e) => {
                error!(error = %e, "Unexpected serial error, stopping forwarder");
                break;
            }
        }
    }
}

/// Open the serial device and run the forward loop until a fatal error.
///
/// An open failure is fatal to this task only; the telemetry task is
/// unaffected and the bridge keeps running degraded.
pub async fn run_forwarder<P: Publisher>(config: SerialConfig, topic: String, publisher: P) {
    let builder = tokio_serial::new(&config.url, config.baudrate);
    let stream = match SerialStream::open(&builder) {
        Ok(stream) => stream,
        Err(e) => {
            error!(
                url = %config.url,
                error = %e,
                "Serial connection could not be established"
            );
            return;
        }
    };

    info!(url = %config.url, baudrate = config.baudrate, "Serial connection opened");
    info!("HEALTHCHECK: serial connection successfully established");

    forward_lines(stream, &topic, &publisher).await;
}
