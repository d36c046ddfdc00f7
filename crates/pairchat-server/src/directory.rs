//! Pairing directory.
//!
//! The directory is the relay's only state: which addresses hold which
//! slots, their nicknames, who is negotiating or chatting with whom, and
//! the payloads awaiting a decision. Peers are stored in an arena indexed
//! by slot, so a [`PeerId`] is a direct lookup.
//!
//! Link states are kept symmetric: `RequestPendingOut { target }` on the
//! requester always pairs with `RequestPendingIn { from }` on the target,
//! and `Paired` is mutual. Every method that changes a link updates both
//! ends.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use pairchat_core::PeerId;
use pairchat_protocol::{Nickname, RosterEntry};
use tracing::{debug, info};

use crate::buffer::{MessageBuffer, PendingMessage};
use crate::error::{ServerError, ServerResult};
use crate::slots::SlotAllocator;

/// Negotiation or chat state of one registered peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    RequestPendingOut { target: PeerId, since: Instant },
    RequestPendingIn { from: PeerId, since: Instant },
    Paired { partner: PeerId },
}

/// A registered peer.
#[derive(Debug, Clone)]
pub struct PeerSlot {
    pub addr: SocketAddr,
    pub nickname: Option<Nickname>,
    pub link: LinkState,
    pub registered_at: Instant,
}

/// Outcome of removing a peer from the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub addr: SocketAddr,
    /// A requester that was waiting on the departed peer's answer.
    pub stranded_requester: Option<PeerId>,
}

/// Registrations, link states and buffered payloads.
#[derive(Debug)]
pub struct Directory {
    slots: SlotAllocator,
    peers: Vec<Option<PeerSlot>>,
    by_addr: HashMap<SocketAddr, PeerId>,
    buffer: MessageBuffer,
}

impl Directory {
    /// Creates an empty directory with room for `capacity` peers.
    pub fn new(capacity: u16) -> Self {
        Self {
            slots: SlotAllocator::new(capacity),
            peers: vec![None; capacity as usize],
            by_addr: HashMap::new(),
            buffer: MessageBuffer::new(),
        }
    }

    /// Registers an address, or returns its existing id.
    pub fn register(&mut self, addr: SocketAddr, now: Instant) -> ServerResult<PeerId> {
        if let Some(&id) = self.by_addr.get(&addr) {
            debug!(peer = %id, addr = %addr, "Address already registered");
            return Ok(id);
        }

        let id = self.slots.acquire()?;
        self.peers[id.index()] = Some(PeerSlot {
            addr,
            nickname: None,
            link: LinkState::Idle,
            registered_at: now,
        });
        self.by_addr.insert(addr, id);
        info!(peer = %id, addr = %addr, in_use = self.slots.in_use(), "Peer registered");
        Ok(id)
    }

    /// Removes a peer, releasing its slot and any pending request.
    ///
    /// A pairing is dissolved first if present.
    pub fn unregister(&mut self, id: PeerId) -> ServerResult<Departure> {
        let link = self.slot(id)?.link;
        let mut stranded_requester = None;
        match link {
            LinkState::Idle => {}
            LinkState::RequestPendingOut { target, .. } => self.set_link(target, LinkState::Idle),
            LinkState::RequestPendingIn { from, .. } => {
                self.set_link(from, LinkState::Idle);
                stranded_requester = Some(from);
            }
            LinkState::Paired { .. } => {
                self.dissolve(id);
            }
        }

        self.buffer.take(id);
        let slot = self.peers[id.index()]
            .take()
            .ok_or(ServerError::UnknownPeer(id))?;
        self.by_addr.remove(&slot.addr);
        self.slots.release(id)?;

        info!(
            peer = %id,
            addr = %slot.addr,
            registered_for = ?slot.registered_at.elapsed(),
            "Peer left"
        );
        Ok(Departure {
            addr: slot.addr,
            stranded_requester,
        })
    }

    /// Returns the id registered for an address.
    pub fn lookup(&self, addr: SocketAddr) -> Option<PeerId> {
        self.by_addr.get(&addr).copied()
    }

    /// Returns a registered peer.
    pub fn peer(&self, id: PeerId) -> Option<&PeerSlot> {
        self.peers.get(id.index()).and_then(Option::as_ref)
    }

    /// Returns the transport address of a registered peer.
    pub fn addr_of(&self, id: PeerId) -> Option<SocketAddr> {
        self.peer(id).map(|p| p.addr)
    }

    /// Returns the link state of a registered peer.
    pub fn link(&self, id: PeerId) -> Option<LinkState> {
        self.peer(id).map(|p| p.link)
    }

    /// Sets or clears a peer's nickname.
    pub fn set_nickname(&mut self, id: PeerId, nickname: Option<Nickname>) -> ServerResult<()> {
        let slot = self.slot_mut(id)?;
        slot.nickname = nickname;
        Ok(())
    }

    /// Name shown to other peers: the nickname, or the id when unset.
    pub fn display_name(&self, id: PeerId) -> String {
        match self.peer(id).and_then(|p| p.nickname.as_ref()) {
            Some(nickname) => nickname.to_string(),
            None => id.to_string(),
        }
    }

    /// Every registered peer except `viewer`, ordered by slot.
    pub fn roster_for(&self, viewer: PeerId) -> Vec<RosterEntry> {
        self.registered_ids()
            .filter(|&id| id != viewer)
            .map(|id| RosterEntry::new(id, self.display_name(id)))
            .collect()
    }

    /// Records a pairing request from `from` to `target`.
    ///
    /// Repeating the same request while it is still pending is accepted
    /// and refreshes its age.
    pub fn request_pairing(&mut self, from: PeerId, target: PeerId, now: Instant) -> ServerResult<()> {
        if from == target {
            return Err(ServerError::SelfPairing(from));
        }
        let target_link = self.peer(target).ok_or(ServerError::UnknownPeer(target))?.link;
        let from_link = self.slot(from)?.link;

        match (from_link, target_link) {
            (LinkState::Idle, LinkState::Idle) => {}
            (
                LinkState::RequestPendingOut { target: pending, .. },
                LinkState::RequestPendingIn { from: requester, .. },
            ) if pending == target && requester == from => {
                debug!(peer = %from, target = %target, "Repeated pairing request");
            }
            (LinkState::Idle, _) => return Err(ServerError::Busy(target)),
            _ => return Err(ServerError::Busy(from)),
        }

        self.set_link(from, LinkState::RequestPendingOut { target, since: now });
        self.set_link(target, LinkState::RequestPendingIn { from, since: now });
        info!(peer = %from, target = %target, "Pairing requested");
        Ok(())
    }

    /// Resolves the pairing offer held by `responder`. Returns the requester.
    pub fn resolve_pairing(&mut self, responder: PeerId, accept: bool) -> ServerResult<PeerId> {
        let LinkState::RequestPendingIn { from, .. } = self.slot(responder)?.link else {
            return Err(ServerError::NoPendingRequest(responder));
        };

        if accept {
            self.set_link(from, LinkState::Paired { partner: responder });
            self.set_link(responder, LinkState::Paired { partner: from });
            info!(peer = %responder, partner = %from, "Peers paired");
        } else {
            self.set_link(from, LinkState::Idle);
            self.set_link(responder, LinkState::Idle);
            info!(peer = %responder, requester = %from, "Pairing rejected");
        }
        Ok(from)
    }

    /// Returns the chat partner of a paired peer.
    pub fn partner(&self, id: PeerId) -> Option<PeerId> {
        match self.link(id)? {
            LinkState::Paired { partner } => Some(partner),
            _ => None,
        }
    }

    /// Ends a pairing, dropping both sides' buffered payloads. Returns the
    /// former partner.
    pub fn dissolve(&mut self, id: PeerId) -> Option<PeerId> {
        let partner = self.partner(id)?;
        self.set_link(id, LinkState::Idle);
        self.set_link(partner, LinkState::Idle);
        self.buffer.take(id);
        self.buffer.take(partner);
        info!(peer = %id, partner = %partner, "Pairing dissolved");
        Some(partner)
    }

    /// Drops pairing requests older than `timeout`. Returns the
    /// `(requester, target)` pairs that were dropped.
    pub fn expire_pending(&mut self, now: Instant, timeout: Duration) -> Vec<(PeerId, PeerId)> {
        let expired: Vec<_> = self
            .peers
            .iter()
            .flatten()
            .filter_map(|slot| match slot.link {
                LinkState::RequestPendingIn { from, since }
                    if now.saturating_duration_since(since) >= timeout =>
                {
                    self.by_addr.get(&slot.addr).map(|&target| (from, target))
                }
                _ => None,
            })
            .collect();

        for &(from, target) in &expired {
            self.set_link(from, LinkState::Idle);
            self.set_link(target, LinkState::Idle);
            info!(peer = %from, target = %target, "Pairing request expired");
        }
        expired
    }

    /// Buffers a chat payload from `sender`.
    pub fn store_message(&mut self, sender: PeerId, seq: u32, text: String) {
        self.buffer.store(sender, seq, text);
    }

    /// Removes the payload buffered by `sender`.
    pub fn take_message(&mut self, sender: PeerId) -> Option<PendingMessage> {
        self.buffer.take(sender)
    }

    /// Returns the payload buffered by `sender`.
    pub fn pending_message(&self, sender: PeerId) -> Option<&PendingMessage> {
        self.buffer.get(sender)
    }

    /// Number of registered peers.
    pub fn len(&self) -> usize {
        self.by_addr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_addr.is_empty()
    }

    /// Size of the slot pool.
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    fn registered_ids(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.peers
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .filter_map(|(index, _)| PeerId::new(index as u16 + 1))
    }

    fn slot(&self, id: PeerId) -> ServerResult<&PeerSlot> {
        self.peer(id).ok_or(ServerError::UnknownPeer(id))
    }

    fn slot_mut(&mut self, id: PeerId) -> ServerResult<&mut PeerSlot> {
        self.peers
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(ServerError::UnknownPeer(id))
    }

    fn set_link(&mut self, id: PeerId, link: LinkState) {
        if let Ok(slot) = self.slot_mut(id) {
            slot.link = link;
        }
    }

    #[cfg(test)]
    fn links_are_symmetric(&self) -> bool {
        self.registered_ids().all(|id| match self.link(id) {
            Some(LinkState::Idle) => true,
            Some(LinkState::RequestPendingOut { target, .. }) => matches!(
                self.link(target),
                Some(LinkState::RequestPendingIn { from, .. }) if from == id
            ),
            Some(LinkState::RequestPendingIn { from, .. }) => matches!(
                self.link(from),
                Some(LinkState::RequestPendingOut { target, .. }) if target == id
            ),
            Some(LinkState::Paired { partner }) => self.partner(partner) == Some(id),
            None => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn directory_with(n: u16) -> (Directory, Vec<PeerId>) {
        let mut directory = Directory::new(4);
        let now = Instant::now();
        let ids = (0..n)
            .map(|i| directory.register(addr(5000 + i), now).unwrap())
            .collect();
        (directory, ids)
    }

    #[test]
    fn register_is_idempotent_per_address() {
        let mut directory = Directory::new(4);
        let now = Instant::now();
        let a = directory.register(addr(1), now).unwrap();
        assert_eq!(directory.register(addr(1), now).unwrap(), a);
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn full_directory_is_capacity_exceeded() {
        let (mut directory, _) = directory_with(4);
        assert!(matches!(
            directory.register(addr(9), Instant::now()),
            Err(ServerError::CapacityExceeded { capacity: 4 })
        ));
    }

    #[test]
    fn roster_excludes_viewer_and_falls_back_to_id() {
        let (mut directory, ids) = directory_with(3);
        directory
            .set_nickname(ids[2], Some(Nickname::parse("carol").unwrap()))
            .unwrap();

        let roster = directory.roster_for(ids[0]);
        assert_eq!(
            roster,
            vec![
                RosterEntry::new(ids[1], "Client_2"),
                RosterEntry::new(ids[2], "carol"),
            ]
        );
    }

    #[test]
    fn pairing_request_and_accept() {
        let (mut directory, ids) = directory_with(2);
        let (a, b) = (ids[0], ids[1]);
        directory.request_pairing(a, b, Instant::now()).unwrap();
        assert!(directory.links_are_symmetric());

        assert_eq!(directory.resolve_pairing(b, true).unwrap(), a);
        assert_eq!(directory.partner(a), Some(b));
        assert_eq!(directory.partner(b), Some(a));
        assert!(directory.links_are_symmetric());
    }

    #[test]
    fn pairing_reject_returns_both_to_idle() {
        let (mut directory, ids) = directory_with(2);
        directory.request_pairing(ids[0], ids[1], Instant::now()).unwrap();
        directory.resolve_pairing(ids[1], false).unwrap();
        assert_eq!(directory.link(ids[0]), Some(LinkState::Idle));
        assert_eq!(directory.link(ids[1]), Some(LinkState::Idle));
    }

    #[test]
    fn pairing_refusals() {
        let (mut directory, ids) = directory_with(3);
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        let now = Instant::now();

        assert!(matches!(directory.request_pairing(a, a, now), Err(ServerError::SelfPairing(_))));
        let ghost = PeerId::new(4).unwrap();
        assert!(matches!(directory.request_pairing(a, ghost, now), Err(ServerError::UnknownPeer(_))));

        directory.request_pairing(a, b, now).unwrap();
        assert!(matches!(directory.request_pairing(c, b, now), Err(ServerError::Busy(id)) if id == b));
        assert!(matches!(directory.request_pairing(a, c, now), Err(ServerError::Busy(id)) if id == a));
        // Retrying the same request is allowed.
        assert!(directory.request_pairing(a, b, now).is_ok());
        assert!(directory.links_are_symmetric());
    }

    #[test]
    fn resolve_without_offer() {
        let (mut directory, ids) = directory_with(1);
        assert!(matches!(
            directory.resolve_pairing(ids[0], true),
            Err(ServerError::NoPendingRequest(_))
        ));
    }

    #[test]
    fn unregister_strands_waiting_requester() {
        let (mut directory, ids) = directory_with(2);
        directory.request_pairing(ids[0], ids[1], Instant::now()).unwrap();

        let departure = directory.unregister(ids[1]).unwrap();
        assert_eq!(departure.stranded_requester, Some(ids[0]));
        assert_eq!(directory.link(ids[0]), Some(LinkState::Idle));
        assert!(directory.lookup(addr(5001)).is_none());
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn unregister_frees_slot_for_reuse() {
        let (mut directory, ids) = directory_with(2);
        directory.unregister(ids[1]).unwrap();
        directory.unregister(ids[0]).unwrap();
        let now = Instant::now();
        assert_eq!(directory.register(addr(7000), now).unwrap(), ids[0]);
        assert_eq!(directory.register(addr(7001), now).unwrap(), ids[1]);
    }

    #[test]
    fn dissolve_clears_both_buffers() {
        let (mut directory, ids) = directory_with(2);
        let (a, b) = (ids[0], ids[1]);
        directory.request_pairing(a, b, Instant::now()).unwrap();
        directory.resolve_pairing(b, true).unwrap();
        directory.store_message(a, 0, "hi".into());
        directory.store_message(b, 0, "yo".into());

        assert_eq!(directory.dissolve(b), Some(a));
        assert!(directory.pending_message(a).is_none());
        assert!(directory.pending_message(b).is_none());
        assert!(directory.partner(a).is_none());
    }

    #[test]
    fn stale_requests_expire() {
        let (mut directory, ids) = directory_with(2);
        let start = Instant::now();
        directory.request_pairing(ids[0], ids[1], start).unwrap();

        let timeout = Duration::from_secs(30);
        assert!(directory.expire_pending(start + Duration::from_secs(10), timeout).is_empty());
        let expired = directory.expire_pending(start + timeout, timeout);
        assert_eq!(expired, vec![(ids[0], ids[1])]);
        assert_eq!(directory.link(ids[1]), Some(LinkState::Idle));
    }
}
