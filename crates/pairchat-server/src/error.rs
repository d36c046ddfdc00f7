//! Relay error types.

use std::io;

use pairchat_core::PeerId;
use thiserror::Error;

/// Result type for relay operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the relay.
#[derive(Debug, Error)]
pub enum ServerError {
    /// IO error (bind, send, receive).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Every slot is assigned.
    #[error("Relay is full ({capacity} slots in use)")]
    CapacityExceeded { capacity: usize },

    /// The peer id is not assigned to a registered peer.
    #[error("Unknown peer: {0}")]
    UnknownPeer(PeerId),

    /// A peer asked to pair with itself.
    #[error("{0} cannot pair with itself")]
    SelfPairing(PeerId),

    /// The peer is already negotiating or chatting with someone else.
    #[error("{0} is busy")]
    Busy(PeerId),

    /// The peer has no pairing offer to answer.
    #[error("{0} has no pending pairing request")]
    NoPendingRequest(PeerId),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl ServerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
