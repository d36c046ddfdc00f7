//! Bounded pool of peer slots.
//!
//! Free ids live on a stack. The pool starts with every id pushed in
//! descending order, so the first acquisition yields `Client_1`, and a
//! released id is the next one handed out.

use pairchat_core::PeerId;
use tracing::trace;

use crate::error::{ServerError, ServerResult};

/// Free-list allocator for peer ids.
#[derive(Debug)]
pub struct SlotAllocator {
    capacity: u16,
    free: Vec<PeerId>,
}

impl SlotAllocator {
    /// Creates an allocator with `capacity` free slots.
    pub fn new(capacity: u16) -> Self {
        let free = (1..=capacity).rev().filter_map(PeerId::new).collect();
        Self { capacity, free }
    }

    /// Takes the most recently freed slot.
    pub fn acquire(&mut self) -> ServerResult<PeerId> {
        let id = self.free.pop().ok_or(ServerError::CapacityExceeded {
            capacity: self.capacity as usize,
        })?;
        trace!(peer = %id, free = self.free.len(), "Slot acquired");
        Ok(id)
    }

    /// Returns a slot to the pool.
    ///
    /// Ids outside the pool or already free are refused, leaving the pool
    /// untouched.
    pub fn release(&mut self, id: PeerId) -> ServerResult<()> {
        if id.slot() > self.capacity || self.is_free(id) {
            return Err(ServerError::UnknownPeer(id));
        }
        self.free.push(id);
        trace!(peer = %id, free = self.free.len(), "Slot released");
        Ok(())
    }

    /// Returns true if the slot is in the pool.
    pub fn is_free(&self, id: PeerId) -> bool {
        self.free.contains(&id)
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Number of assigned slots.
    pub fn in_use(&self) -> usize {
        self.capacity as usize - self.free.len()
    }
}
