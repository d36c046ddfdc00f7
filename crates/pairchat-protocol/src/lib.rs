//! Datagram text codec and request/reply types for pairchat.
//!
//! Peers and the relay exchange UTF-8 text datagrams of at most
//! [`MAX_DATAGRAM_SIZE`] bytes. Each datagram is a space-delimited command
//! token followed by its arguments.
//!
//! # Message Types
//!
//! - [`Request`]: everything a peer sends to the relay.
//! - [`Reply`]: everything the relay sends to a peer, whether a direct
//!   response or a forward from the paired partner.
//!
//! Text is parsed exactly once, at the transport boundary, into one of these
//! tagged variants. Nothing downstream re-splits strings.
//!
//! # Example
//!
//! ```rust
//! use pairchat_protocol::{Request, decode_request, encode_datagram};
//!
//! let bytes = encode_datagram(&Request::message_ack(0, "hello")).unwrap();
//! assert_eq!(bytes, b"message_ack 0 hello");
//! let decoded = decode_request(&bytes).unwrap();
//! assert_eq!(decoded, Request::message_ack(0, "hello"));
//! ```

mod error;
mod framing;
mod types;

pub use error::{ProtocolError, ProtocolResult};
pub use framing::{decode_reply, decode_request, encode_datagram};
pub use types::{MessageKind, NicknameChoice, Nickname, Reply, Request, RosterEntry};

/// Maximum datagram size in bytes, both directions.
pub const MAX_DATAGRAM_SIZE: usize = 256;

/// Default UDP port of the relay.
pub const DEFAULT_RELAY_PORT: u16 = 7070;

/// Roster sentinel sent when no other peer is registered.
pub const NOBODY_ONLINE: &str = "Nobody Is Online";

/// Nickname sentinel meaning "use my peer id as my name".
pub const NULL_NICKNAME: &str = "_null";

/// Leave sentinel: as a bare datagram it leaves the session or server; as a
/// chat payload it asks the partner to end the chat.
pub const EXIT: &str = "_exit";
