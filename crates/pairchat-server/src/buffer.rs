//! Per-sender holding area for unacknowledged chat payloads.

use std::collections::HashMap;

use pairchat_core::PeerId;
use pairchat_protocol::MessageKind;
use tracing::debug;

/// A chat payload waiting for the recipient's decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    pub seq: u32,
    pub text: String,
}

impl PendingMessage {
    pub fn kind(&self) -> MessageKind {
        MessageKind::for_payload(&self.text)
    }
}

/// At most one pending payload per sender.
#[derive(Debug, Default)]
pub struct MessageBuffer {
    entries: HashMap<PeerId, PendingMessage>,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a payload, replacing any earlier one from the same sender.
    pub fn store(&mut self, sender: PeerId, seq: u32, text: String) -> Option<PendingMessage> {
        let replaced = self.entries.insert(sender, PendingMessage { seq, text });
        if let Some(ref old) = replaced {
            debug!(peer = %sender, old_seq = old.seq, new_seq = seq, "Replaced pending message");
        }
        replaced
    }

    /// Removes and returns the sender's payload.
    pub fn take(&mut self, sender: PeerId) -> Option<PendingMessage> {
        self.entries.remove(&sender)
    }

    pub fn get(&self, sender: PeerId) -> Option<&PendingMessage> {
        self.entries.get(&sender)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(slot: u16) -> PeerId {
        PeerId::new(slot).unwrap()
    }

    #[test]
    fn one_entry_per_sender() {
        let mut buffer = MessageBuffer::new();
        assert!(buffer.store(id(1), 0, "hello".into()).is_none());
        let replaced = buffer.store(id(1), 0, "hello again".into());
        assert_eq!(replaced.unwrap().text, "hello");
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.get(id(1)).unwrap().text, "hello again");
    }

    #[test]
    fn take_clears_entry() {
        let mut buffer = MessageBuffer::new();
        buffer.store(id(2), 5, "_exit".into());
        let message = buffer.take(id(2)).unwrap();
        assert_eq!(message.seq, 5);
        assert_eq!(message.kind(), MessageKind::Exit);
        assert!(buffer.take(id(2)).is_none());
        assert!(buffer.is_empty());
    }
}
