//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding datagrams.
///
/// Every variant describes a malformed message: callers fail closed on any
/// of them rather than guessing at intent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Datagram carried no text.
    #[error("empty datagram")]
    Empty,

    /// Datagram exceeds the transport limit.
    #[error("datagram too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },

    /// Datagram is not valid UTF-8.
    #[error("datagram is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// Leading command token is not part of the protocol.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A command is missing a required argument.
    #[error("missing argument <{argument}> for {command}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    /// A command argument could not be parsed.
    #[error("invalid argument for {command}: {value:?}")]
    InvalidArgument { command: &'static str, value: String },

    /// A display name breaks the nickname rules.
    #[error("invalid nickname {name:?}: {reason}")]
    InvalidNickname { name: String, reason: &'static str },
}

impl ProtocolError {
    pub(crate) fn missing(command: &'static str, argument: &'static str) -> Self {
        Self::MissingArgument { command, argument }
    }

    pub(crate) fn invalid(command: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidArgument {
            command,
            value: value.into(),
        }
    }
}
