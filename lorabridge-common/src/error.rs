use thiserror::Error;

/// Common error type for bridge components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("MQTT connection error: {0}")]
    Connect(String),

    #[error("Failed to publish to '{topic}': {message}")]
    Publish { topic: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the bridge's common [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
