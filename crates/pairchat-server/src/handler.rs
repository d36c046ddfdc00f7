//! Request dispatch for the relay.
//!
//! [`RelayHandler::handle`] turns one decoded datagram into the datagrams
//! the relay must send in response. It performs no I/O, so the whole
//! protocol can be driven from tests with fabricated addresses and clocks.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use pairchat_core::PeerId;
use pairchat_protocol::{
    MAX_DATAGRAM_SIZE, MessageKind, Nickname, NicknameChoice, Reply, Request, RosterEntry,
};
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::directory::Directory;

/// A reply addressed to a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub to: SocketAddr,
    pub reply: Reply,
}

/// Relay protocol engine.
#[derive(Debug)]
pub struct RelayHandler {
    directory: Directory,
    pending_timeout: Duration,
}

impl RelayHandler {
    /// Creates a handler with an empty directory.
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            directory: Directory::new(config.max_peers),
            pending_timeout: config.pending_timeout,
        }
    }

    /// Returns the directory, for inspection.
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Handles one request from `from`.
    #[tracing::instrument(level = "debug", skip(self, request, now), fields(command = request.command()))]
    pub fn handle(&mut self, from: SocketAddr, request: Request, now: Instant) -> Vec<Outbound> {
        self.directory.expire_pending(now, self.pending_timeout);

        let Some(peer) = self.directory.lookup(from) else {
            return match request {
                Request::ConnectionRequest => self.connect(from, now),
                other => {
                    warn!(addr = %from, command = other.command(), "Request from unregistered address ignored");
                    Vec::new()
                }
            };
        };

        if let Some(partner) = self.directory.partner(peer) {
            return self.chat(peer, partner, request);
        }

        match request {
            Request::ConnectionRequest => {
                debug!(peer = %peer, "Repeated connection request");
                self.reply(peer, Reply::ConnectionGranted)
            }
            Request::Nickname(choice) => self.set_nickname(peer, choice),
            Request::OnlineRequest => {
                let roster = fit_roster(self.directory.roster_for(peer));
                self.reply(peer, Reply::Roster(roster))
            }
            Request::ClientRequest { target } => self.request_pairing(peer, target, now),
            Request::ClientAckResponse { accept } => self.answer_pairing(peer, accept),
            Request::Exit => self.leave(peer),
            other @ (Request::MessageAck { .. } | Request::Decision { .. }) => {
                warn!(peer = %peer, command = other.command(), "Chat message outside a session ignored");
                Vec::new()
            }
        }
    }

    fn connect(&mut self, from: SocketAddr, now: Instant) -> Vec<Outbound> {
        let reply = match self.directory.register(from, now) {
            Ok(_) => Reply::ConnectionGranted,
            Err(e) => {
                info!(addr = %from, error = %e, "Connection denied");
                Reply::ConnectionDenied
            }
        };
        vec![Outbound { to: from, reply }]
    }

    fn set_nickname(&mut self, peer: PeerId, choice: NicknameChoice) -> Vec<Outbound> {
        let nickname = match choice {
            NicknameChoice::UsePeerId => None,
            NicknameChoice::Named(raw) => match Nickname::parse(&raw) {
                Ok(nickname) => Some(nickname),
                Err(e) => {
                    warn!(peer = %peer, error = %e, "Rejected nickname, using peer id");
                    None
                }
            },
        };

        match self.directory.set_nickname(peer, nickname) {
            Ok(()) => debug!(peer = %peer, name = %self.directory.display_name(peer), "Nickname set"),
            Err(e) => warn!(peer = %peer, error = %e, "Failed to set nickname"),
        }
        self.reply(peer, Reply::Success)
    }

    fn request_pairing(&mut self, peer: PeerId, target: PeerId, now: Instant) -> Vec<Outbound> {
        match self.directory.request_pairing(peer, target, now) {
            Ok(()) => {
                let offer = Reply::ClientAck {
                    nickname: self.directory.display_name(peer),
                    from: peer,
                };
                let mut out = self.reply(target, offer);
                out.extend(self.reply(peer, Reply::Waiting));
                out
            }
            Err(e) => {
                info!(peer = %peer, target = %target, error = %e, "Pairing request refused");
                self.reply(peer, Reply::ConnectionFailure)
            }
        }
    }

    fn answer_pairing(&mut self, peer: PeerId, accept: bool) -> Vec<Outbound> {
        match self.directory.resolve_pairing(peer, accept) {
            Ok(requester) if accept => {
                let name = Reply::PartnerNickname(self.directory.display_name(peer));
                let mut out = self.reply(requester, name);
                out.extend(self.reply(peer, Reply::ConnectionSuccess));
                out
            }
            Ok(requester) => {
                let mut out = self.reply(requester, Reply::ConnectionFailure);
                out.extend(self.reply(peer, Reply::ConnectionFailure));
                out
            }
            Err(e) => {
                info!(peer = %peer, error = %e, "Pairing answer without an offer");
                self.reply(peer, Reply::ConnectionFailure)
            }
        }
    }

    fn leave(&mut self, peer: PeerId) -> Vec<Outbound> {
        match self.directory.unregister(peer) {
            Ok(departure) => departure
                .stranded_requester
                .map(|requester| self.reply(requester, Reply::ConnectionFailure))
                .unwrap_or_default(),
            Err(e) => {
                warn!(peer = %peer, error = %e, "Failed to unregister peer");
                Vec::new()
            }
        }
    }

    fn chat(&mut self, peer: PeerId, partner: PeerId, request: Request) -> Vec<Outbound> {
        match request {
            Request::MessageAck { seq, text } => {
                let kind = MessageKind::for_payload(&text);
                debug!(peer = %peer, partner = %partner, seq, ?kind, "Message buffered");
                self.directory.store_message(peer, seq, text);
                let mut out = self.reply(peer, Reply::AckSent);
                out.extend(self.reply(partner, Reply::MessageRequest(kind)));
                out
            }
            Request::Decision { accept } => {
                let Some(message) = self.directory.take_message(partner) else {
                    warn!(peer = %peer, partner = %partner, "Decision without a pending message ignored");
                    return Vec::new();
                };

                if !accept {
                    debug!(peer = %peer, seq = message.seq, "Message rejected");
                    let mut out = self.reply(peer, Reply::Reset);
                    out.extend(self.reply(partner, Reply::AckDenied));
                    return out;
                }

                let kind = message.kind();
                let mut out = self.reply(peer, Reply::delivery(message.seq, message.text));
                out.extend(self.reply(partner, Reply::AckReceived));
                if kind == MessageKind::Exit {
                    self.directory.dissolve(peer);
                }
                out
            }
            Request::Exit => {
                info!(peer = %peer, partner = %partner, "Peer left the chat");
                self.directory.dissolve(peer);
                self.reply(partner, Reply::ConnectionFailure)
            }
            other => {
                warn!(peer = %peer, command = other.command(), "Non-chat request during a session ignored");
                Vec::new()
            }
        }
    }

    fn reply(&self, to: PeerId, reply: Reply) -> Vec<Outbound> {
        match self.directory.addr_of(to) {
            Some(to) => vec![Outbound { to, reply }],
            None => {
                warn!(peer = %to, "Reply to unknown peer dropped");
                Vec::new()
            }
        }
    }
}

/// Drops trailing roster lines until the roster fits in one datagram.
fn fit_roster(mut roster: Vec<RosterEntry>) -> Vec<RosterEntry> {
    while !roster.is_empty() && Reply::Roster(roster.clone()).to_string().len() > MAX_DATAGRAM_SIZE {
        roster.pop();
    }
    roster
}
