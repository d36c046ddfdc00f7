//! Per-chat bookkeeping on the peer side.

use pairchat_protocol::{Reply, Request};

/// Which side opened the session. The initiator sends first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    Initiator,
    Responder,
}

/// State of one chat session; dropped when the peer returns to the menu.
#[derive(Debug, Clone)]
pub struct ChatSession {
    partner: String,
    role: ChatRole,
    seq: u32,
    last_incoming: Option<Reply>,
}

impl ChatSession {
    pub fn new(partner: impl Into<String>, role: ChatRole) -> Self {
        Self {
            partner: partner.into(),
            role,
            seq: 0,
            last_incoming: None,
        }
    }

    pub fn partner(&self) -> &str {
        &self.partner
    }

    pub fn role(&self) -> ChatRole {
        self.role
    }

    /// Sequence number carried by the next outgoing payload.
    pub fn seq(&self) -> u32 {
        self.seq
    }

    /// Records an incoming datagram. Returns `false` if it exactly repeats
    /// the previous one and should be discarded.
    pub fn observe(&mut self, reply: &Reply) -> bool {
        if self.last_incoming.as_ref() == Some(reply) {
            return false;
        }
        self.last_incoming = Some(reply.clone());
        true
    }

    /// Advances the sequence number past an accepted delivery. Advisory
    /// only: the relay never checks it.
    pub fn accept_delivery(&mut self, seq: u32) {
        self.seq = seq.wrapping_add(1);
    }

    /// Builds the submission for `text`.
    pub fn outgoing(&self, text: &str) -> Request {
        Request::message_ack(self.seq, text)
    }
}
