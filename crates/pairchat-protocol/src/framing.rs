//! Datagram framing.
//!
//! A datagram is one UTF-8 text message with no length prefix and no
//! terminator. Trailing line endings are tolerated on input so that peers
//! typing into `nc -u` interoperate.

use std::fmt::Display;

use crate::MAX_DATAGRAM_SIZE;
use crate::error::{ProtocolError, ProtocolResult};
use crate::types::{Reply, Request};

/// Encodes a message into datagram bytes.
///
/// # Example
///
/// ```rust
/// use pairchat_protocol::{encode_datagram, Reply};
///
/// let bytes = encode_datagram(&Reply::AckSent).unwrap();
/// assert_eq!(bytes, b"ack_sent");
/// ```
pub fn encode_datagram<T: Display>(message: &T) -> ProtocolResult<Vec<u8>> {
    let bytes = message.to_string().into_bytes();
    if bytes.len() > MAX_DATAGRAM_SIZE {
        return Err(ProtocolError::TooLarge {
            size: bytes.len(),
            max: MAX_DATAGRAM_SIZE,
        });
    }
    Ok(bytes)
}

/// Decodes a datagram received by the relay.
pub fn decode_request(data: &[u8]) -> ProtocolResult<Request> {
    datagram_text(data)?.parse()
}

/// Decodes a datagram received by a peer.
pub fn decode_reply(data: &[u8]) -> ProtocolResult<Reply> {
    datagram_text(data)?.parse()
}

fn datagram_text(data: &[u8]) -> ProtocolResult<&str> {
    if data.len() > MAX_DATAGRAM_SIZE {
        return Err(ProtocolError::TooLarge {
            size: data.len(),
            max: MAX_DATAGRAM_SIZE,
        });
    }

    let text = std::str::from_utf8(data)?.trim_end_matches(['\r', '\n']);
    if text.is_empty() {
        return Err(ProtocolError::Empty);
    }
    Ok(text)
}
