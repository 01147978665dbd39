//! The `error` module defines the error types used within `chanbroker`.
//!
//! Errors are split by the layer that produces them:
//!
//! - [`BrokerError`]: rejections coming from the channel registry. These are
//!   recoverable and reported back to the offending client as `ERROR` frames.
//! - [`FrameError`]: inbound text that is not a valid client frame.
//! - [`ServerError`]: process-level failures (binding, configuration).

use crate::client::ConnectionId;

/// Result alias for registry operations.
pub type BrokerResult<T> = std::result::Result<T, BrokerError>;

/// Errors raised by the channel registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    /// Channel name is empty or contains non-alphanumeric characters.
    #[error("invalid channel name: {0}")]
    InvalidChannelName(String),

    /// The publisher has no active subscription on the channel.
    #[error("not subscribed to {0}")]
    NotSubscribed(String),

    /// A single subscriber could not be reached. Never surfaced to publishers.
    #[error("delivery to connection {0} failed")]
    DeliveryFailure(ConnectionId),
}

impl BrokerError {
    /// Numeric code carried in the `ERROR:<code>:<message>` frame.
    pub fn code(&self) -> u16 {
        match self {
            BrokerError::InvalidChannelName(_) => 400,
            BrokerError::NotSubscribed(_) => 401,
            BrokerError::DeliveryFailure(_) => 500,
        }
    }
}

/// Errors produced while parsing a text frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("malformed {0} frame")]
    Malformed(&'static str),
}

impl FrameError {
    pub fn code(&self) -> u16 {
        400
    }
}

/// Errors that stop the server process.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("websocket handshake timed out after {0:?}")]
    HandshakeTimeout(std::time::Duration),

    #[error("unexpected frame from server: {0}")]
    UnexpectedFrame(String),
}
