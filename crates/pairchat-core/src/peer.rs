//! Peer identifiers.
//!
//! A peer id is the relay slot a peer occupies. Slots are 1-based and render
//! on the wire as `Client_<slot>`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Wire prefix for peer ids.
pub const PEER_ID_PREFIX: &str = "Client_";

/// Identifier of a registered peer, backed by its relay slot number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(u16);

impl PeerId {
    /// Creates a peer id for the given slot. Returns `None` for slot 0.
    pub const fn new(slot: u16) -> Option<Self> {
        if slot == 0 { None } else { Some(Self(slot)) }
    }

    /// Returns the slot number (1-based).
    pub const fn slot(self) -> u16 {
        self.0
    }

    /// Returns the zero-based index of the slot, for arena lookups.
    pub const fn index(self) -> usize {
        (self.0 - 1) as usize
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", PEER_ID_PREFIX, self.0)
    }
}

/// Errors parsing a peer id from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeerIdError {
    /// Text does not start with `Client_`.
    #[error("peer id must start with 'Client_': {0}")]
    MissingPrefix(String),

    /// Slot part is not a positive integer.
    #[error("invalid peer slot: {0}")]
    InvalidSlot(String),
}

impl FromStr for PeerId {
    type Err = PeerIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let slot = s
            .strip_prefix(PEER_ID_PREFIX)
            .ok_or_else(|| PeerIdError::MissingPrefix(s.to_string()))?;
        slot.parse::<u16>()
            .ok()
            .and_then(PeerId::new)
            .ok_or_else(|| PeerIdError::InvalidSlot(slot.to_string()))
    }
}
