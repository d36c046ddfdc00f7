//! Request and reply types for the pairchat protocol.
//!
//! Both enums implement [`Display`](fmt::Display) for encoding and
//! [`FromStr`] for decoding. Relay replies are mostly keywords; the two
//! exceptions are told apart by shape:
//!
//! - the partner nickname sent to an accepted requester is a single token;
//! - a delivered chat payload is `<seq> <text>`.

use std::fmt;
use std::str::FromStr;

use pairchat_core::{PEER_ID_PREFIX, PeerId};

use crate::error::{ProtocolError, ProtocolResult};
use crate::{EXIT, NOBODY_ONLINE, NULL_NICKNAME};

const CONNECTION_REQUEST: &str = "connection_request";
const NICKNAME: &str = "nickname";
const ONLINE_REQUEST: &str = "online_request";
const CLIENT_REQUEST: &str = "client_request";
const CLIENT_ACK_RESPONSE: &str = "client_ack_response";
const MESSAGE_ACK: &str = "message_ack";

const CONNECTION_GRANTED: &str = "connection_granted";
const CONNECTION_DENIED: &str = "connection_denied";
const SUCCESS: &str = "success";
const WAITING: &str = "waiting...";
const CONNECTION_FAILURE: &str = "connection_failure";
const CONNECTION_SUCCESS: &str = "connection_success";
const CLIENT_ACK: &str = "client_ack";
const MESSAGE_REQUEST: &str = "message_request";
const ACK_SENT: &str = "ack_sent";
const ACK_RECEIVED: &str = "ack_received";
const ACK_DENIED: &str = "ack_denied";
const RESET: &str = "reset";

/// Every command and reply keyword. None of these may be used as a nickname,
/// since a bare nickname travels on the wire as a reply of its own.
const KEYWORDS: &[&str] = &[
    CONNECTION_REQUEST,
    NICKNAME,
    ONLINE_REQUEST,
    CLIENT_REQUEST,
    CLIENT_ACK_RESPONSE,
    MESSAGE_ACK,
    CONNECTION_GRANTED,
    CONNECTION_DENIED,
    SUCCESS,
    WAITING,
    CONNECTION_FAILURE,
    CONNECTION_SUCCESS,
    CLIENT_ACK,
    MESSAGE_REQUEST,
    ACK_SENT,
    ACK_RECEIVED,
    ACK_DENIED,
    RESET,
];

/// Roster line separator between peer id and nickname.
const ROSTER_ARROW: &str = " ==> ";

/// Kind of a pending chat payload announced to the recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Ordinary text.
    Basic,
    /// The sender asks to end the chat.
    Exit,
}

impl MessageKind {
    /// Classifies a chat payload.
    pub fn for_payload(text: &str) -> Self {
        if text == EXIT { Self::Exit } else { Self::Basic }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic => f.write_str("basic"),
            Self::Exit => f.write_str(EXIT),
        }
    }
}

impl FromStr for MessageKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> ProtocolResult<Self> {
        match s {
            "basic" => Ok(Self::Basic),
            EXIT => Ok(Self::Exit),
            other => Err(ProtocolError::invalid(MESSAGE_REQUEST, other)),
        }
    }
}

/// A validated display name.
///
/// Nicknames are a single word of at most [`Nickname::MAX_LEN`] bytes that
/// cannot be mistaken for a protocol keyword, a sentinel or a peer id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Nickname(String);

impl Nickname {
    /// Maximum nickname length in bytes.
    pub const MAX_LEN: usize = 32;

    /// Validates a raw name.
    pub fn parse(raw: &str) -> ProtocolResult<Self> {
        let reason = if raw.is_empty() {
            Some("must not be empty")
        } else if raw.len() > Self::MAX_LEN {
            Some("longer than 32 bytes")
        } else if raw.chars().any(char::is_whitespace) {
            Some("must be a single word")
        } else if raw.starts_with('_') {
            Some("must not start with '_'")
        } else if raw.starts_with('[') {
            Some("must not start with '['")
        } else if raw.starts_with(PEER_ID_PREFIX) {
            Some("looks like a peer id")
        } else if KEYWORDS.contains(&raw) {
            Some("is a protocol keyword")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(ProtocolError::InvalidNickname {
                name: raw.to_string(),
                reason,
            }),
            None => Ok(Self(raw.to_string())),
        }
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nickname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name requested by a `nickname` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NicknameChoice {
    /// `_null`: display the peer id instead of a name.
    UsePeerId,
    /// A requested name, not yet validated. The relay decides what to do
    /// with names that fail [`Nickname::parse`].
    Named(String),
}

/// Messages a peer sends to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Ask for a slot.
    ConnectionRequest,
    /// Set the display name.
    Nickname(NicknameChoice),
    /// Ask for the roster of other peers.
    OnlineRequest,
    /// Ask to pair with another peer.
    ClientRequest { target: PeerId },
    /// Accept or reject a pairing offer.
    ClientAckResponse { accept: bool },
    /// Submit a chat payload for acknowledgement.
    MessageAck { seq: u32, text: String },
    /// Accept or reject an announced chat payload.
    Decision { accept: bool },
    /// Leave the chat session, or the relay when not paired.
    Exit,
}

impl Request {
    /// Creates a nickname request; `None` asks to be shown by peer id.
    pub fn nickname(name: Option<&Nickname>) -> Self {
        match name {
            Some(name) => Self::Nickname(NicknameChoice::Named(name.to_string())),
            None => Self::Nickname(NicknameChoice::UsePeerId),
        }
    }

    /// Creates a chat payload submission.
    pub fn message_ack(seq: u32, text: impl Into<String>) -> Self {
        Self::MessageAck {
            seq,
            text: text.into(),
        }
    }

    /// Returns the command token, for logging.
    pub fn command(&self) -> &'static str {
        match self {
            Self::ConnectionRequest => CONNECTION_REQUEST,
            Self::Nickname(_) => NICKNAME,
            Self::OnlineRequest => ONLINE_REQUEST,
            Self::ClientRequest { .. } => CLIENT_REQUEST,
            Self::ClientAckResponse { .. } => CLIENT_ACK_RESPONSE,
            Self::MessageAck { .. } => MESSAGE_ACK,
            Self::Decision { .. } => "decision",
            Self::Exit => EXIT,
        }
    }
}

fn flag(accept: bool) -> &'static str {
    if accept { "1" } else { "0" }
}

fn parse_flag(command: &'static str, value: &str) -> ProtocolResult<bool> {
    match value {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(ProtocolError::invalid(command, other)),
    }
}

fn parse_seq(command: &'static str, value: &str) -> ProtocolResult<u32> {
    value
        .parse()
        .map_err(|_| ProtocolError::invalid(command, value))
}

fn first_token(rest: Option<&str>) -> Option<&str> {
    rest.and_then(|r| r.split_whitespace().next())
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionRequest => f.write_str(CONNECTION_REQUEST),
            Self::Nickname(NicknameChoice::UsePeerId) => {
                write!(f, "{} {}", NICKNAME, NULL_NICKNAME)
            }
            Self::Nickname(NicknameChoice::Named(name)) => write!(f, "{} {}", NICKNAME, name),
            Self::OnlineRequest => f.write_str(ONLINE_REQUEST),
            Self::ClientRequest { target } => write!(f, "{} {}", CLIENT_REQUEST, target),
            Self::ClientAckResponse { accept } => {
                write!(f, "{} {}", CLIENT_ACK_RESPONSE, flag(*accept))
            }
            Self::MessageAck { seq, text } => write!(f, "{} {} {}", MESSAGE_ACK, seq, text),
            Self::Decision { accept } => f.write_str(flag(*accept)),
            Self::Exit => f.write_str(EXIT),
        }
    }
}

impl FromStr for Request {
    type Err = ProtocolError;

    fn from_str(text: &str) -> ProtocolResult<Self> {
        match text {
            "1" => return Ok(Self::Decision { accept: true }),
            "0" => return Ok(Self::Decision { accept: false }),
            EXIT => return Ok(Self::Exit),
            _ => {}
        }

        let (command, rest) = match text.split_once(' ') {
            Some((command, rest)) => (command, Some(rest)),
            None => (text, None),
        };

        match command {
            CONNECTION_REQUEST => Ok(Self::ConnectionRequest),
            ONLINE_REQUEST => Ok(Self::OnlineRequest),
            NICKNAME => {
                let name = first_token(rest).ok_or(ProtocolError::missing(NICKNAME, "name"))?;
                if name == NULL_NICKNAME {
                    Ok(Self::Nickname(NicknameChoice::UsePeerId))
                } else {
                    Ok(Self::Nickname(NicknameChoice::Named(name.to_string())))
                }
            }
            CLIENT_REQUEST => {
                let target =
                    first_token(rest).ok_or(ProtocolError::missing(CLIENT_REQUEST, "id"))?;
                let target = target
                    .parse()
                    .map_err(|_| ProtocolError::invalid(CLIENT_REQUEST, target))?;
                Ok(Self::ClientRequest { target })
            }
            CLIENT_ACK_RESPONSE => {
                let value = first_token(rest)
                    .ok_or(ProtocolError::missing(CLIENT_ACK_RESPONSE, "0|1"))?;
                Ok(Self::ClientAckResponse {
                    accept: parse_flag(CLIENT_ACK_RESPONSE, value)?,
                })
            }
            MESSAGE_ACK => {
                let rest = rest.ok_or(ProtocolError::missing(MESSAGE_ACK, "seq"))?;
                let (seq, text) = rest
                    .split_once(' ')
                    .ok_or(ProtocolError::missing(MESSAGE_ACK, "text"))?;
                Ok(Self::MessageAck {
                    seq: parse_seq(MESSAGE_ACK, seq)?,
                    text: text.to_string(),
                })
            }
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

/// One line of the roster sent in answer to `online_request`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub peer: PeerId,
    pub nickname: String,
}

impl RosterEntry {
    pub fn new(peer: PeerId, nickname: impl Into<String>) -> Self {
        Self {
            peer,
            nickname: nickname.into(),
        }
    }

    fn parse_line(line: &str) -> Option<Self> {
        let (index, rest) = line.strip_prefix('[')?.split_once("] ")?;
        index.parse::<usize>().ok()?;
        let (peer, nickname) = rest.split_once(ROSTER_ARROW)?;
        Some(Self::new(peer.parse().ok()?, nickname))
    }
}

/// Messages the relay sends to a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Slot acquired.
    ConnectionGranted,
    /// Relay is full.
    ConnectionDenied,
    /// Nickname recorded.
    Success,
    /// Other registered peers; empty encodes as [`NOBODY_ONLINE`].
    Roster(Vec<RosterEntry>),
    /// Pairing request forwarded to the target.
    Waiting,
    /// Pairing refused, rejected or unknown.
    ConnectionFailure,
    /// Pairing established (sent to the responder).
    ConnectionSuccess,
    /// Unsolicited pairing offer.
    ClientAck { nickname: String, from: PeerId },
    /// Pairing established (sent to the requester): the partner's name.
    PartnerNickname(String),
    /// A chat payload awaits this peer's decision.
    MessageRequest(MessageKind),
    /// An accepted chat payload.
    Delivery { seq: u32, text: String },
    /// The relay buffered the sender's payload.
    AckSent,
    /// The partner accepted the payload.
    AckReceived,
    /// The partner rejected the payload.
    AckDenied,
    /// The rejected payload was discarded.
    Reset,
}

impl Reply {
    /// Creates a delivery of an accepted chat payload.
    pub fn delivery(seq: u32, text: impl Into<String>) -> Self {
        Self::Delivery {
            seq,
            text: text.into(),
        }
    }

    /// Returns a short label, for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ConnectionGranted => CONNECTION_GRANTED,
            Self::ConnectionDenied => CONNECTION_DENIED,
            Self::Success => SUCCESS,
            Self::Roster(_) => "roster",
            Self::Waiting => WAITING,
            Self::ConnectionFailure => CONNECTION_FAILURE,
            Self::ConnectionSuccess => CONNECTION_SUCCESS,
            Self::ClientAck { .. } => CLIENT_ACK,
            Self::PartnerNickname(_) => "partner_nickname",
            Self::MessageRequest(_) => MESSAGE_REQUEST,
            Self::Delivery { .. } => "delivery",
            Self::AckSent => ACK_SENT,
            Self::AckReceived => ACK_RECEIVED,
            Self::AckDenied => ACK_DENIED,
            Self::Reset => RESET,
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionGranted => f.write_str(CONNECTION_GRANTED),
            Self::ConnectionDenied => f.write_str(CONNECTION_DENIED),
            Self::Success => f.write_str(SUCCESS),
            Self::Roster(entries) if entries.is_empty() => f.write_str(NOBODY_ONLINE),
            Self::Roster(entries) => {
                for (i, entry) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n")?;
                    }
                    write!(f, "[{}] {}{}{}", i + 1, entry.peer, ROSTER_ARROW, entry.nickname)?;
                }
                Ok(())
            }
            Self::Waiting => f.write_str(WAITING),
            Self::ConnectionFailure => f.write_str(CONNECTION_FAILURE),
            Self::ConnectionSuccess => f.write_str(CONNECTION_SUCCESS),
            Self::ClientAck { nickname, from } => write!(f, "{} {} {}", CLIENT_ACK, nickname, from),
            Self::PartnerNickname(name) => f.write_str(name),
            Self::MessageRequest(kind) => write!(f, "{} {}", MESSAGE_REQUEST, kind),
            Self::Delivery { seq, text } => write!(f, "{} {}", seq, text),
            Self::AckSent => f.write_str(ACK_SENT),
            Self::AckReceived => f.write_str(ACK_RECEIVED),
            Self::AckDenied => f.write_str(ACK_DENIED),
            Self::Reset => f.write_str(RESET),
        }
    }
}

impl FromStr for Reply {
    type Err = ProtocolError;

    fn from_str(text: &str) -> ProtocolResult<Self> {
        match text {
            CONNECTION_GRANTED => return Ok(Self::ConnectionGranted),
            CONNECTION_DENIED => return Ok(Self::ConnectionDenied),
            SUCCESS => return Ok(Self::Success),
            NOBODY_ONLINE => return Ok(Self::Roster(Vec::new())),
            WAITING => return Ok(Self::Waiting),
            CONNECTION_FAILURE => return Ok(Self::ConnectionFailure),
            CONNECTION_SUCCESS => return Ok(Self::ConnectionSuccess),
            ACK_SENT => return Ok(Self::AckSent),
            ACK_RECEIVED => return Ok(Self::AckReceived),
            ACK_DENIED => return Ok(Self::AckDenied),
            RESET => return Ok(Self::Reset),
            _ => {}
        }

        let (head, rest) = match text.split_once(' ') {
            Some((head, rest)) => (head, Some(rest)),
            None => (text, None),
        };

        match (head, rest) {
            (CLIENT_ACK, rest) => {
                let mut args = rest.unwrap_or_default().split_whitespace();
                let nickname = args
                    .next()
                    .ok_or(ProtocolError::missing(CLIENT_ACK, "name"))?;
                let from = args.next().ok_or(ProtocolError::missing(CLIENT_ACK, "id"))?;
                let from = from
                    .parse()
                    .map_err(|_| ProtocolError::invalid(CLIENT_ACK, from))?;
                Ok(Self::ClientAck {
                    nickname: nickname.to_string(),
                    from,
                })
            }
            (MESSAGE_REQUEST, rest) => {
                let kind = first_token(rest).ok_or(ProtocolError::missing(MESSAGE_REQUEST, "kind"))?;
                Ok(Self::MessageRequest(kind.parse()?))
            }
            _ if text.starts_with('[') => text
                .lines()
                .map(RosterEntry::parse_line)
                .collect::<Option<Vec<_>>>()
                .map(Self::Roster)
                .ok_or_else(|| ProtocolError::invalid("roster", text)),
            (seq, Some(payload)) => match seq.parse::<u32>() {
                Ok(seq) => Ok(Self::delivery(seq, payload)),
                Err(_) => Err(ProtocolError::UnknownCommand(head.to_string())),
            },
            (name, None) => Ok(Self::PartnerNickname(name.to_string())),
        }
    }
}
