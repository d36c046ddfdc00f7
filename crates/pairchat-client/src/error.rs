//! Client error types.

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The relay could not be reached or resolved.
    #[error("connection error: {0}")]
    Connection(String),

    /// A datagram could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] pairchat_protocol::ProtocolError),

    /// The relay stopped answering.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The console input was closed.
    #[error("input closed")]
    Closed,

    /// The relay failed to start or stopped with an error.
    #[error("relay error: {0}")]
    Relay(#[from] pairchat_server::ServerError),
}
