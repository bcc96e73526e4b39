//! Append-only per-room message log.

use std::sync::Arc;

use crate::types::ChatMessage;

/// Ordered log of one room's messages.
///
/// The visible log only ever grows: live arrivals that race the startup
/// history fetch are buffered until the fetch resolves, then appended after
/// the history batch. Nothing an observer has seen is ever removed or
/// reordered.
#[derive(Debug, Default)]
pub struct MessageLog {
    entries: Vec<ChatMessage>,
    /// Live arrivals held back until the history batch lands.
    buffered: Vec<ChatMessage>,
    history_resolved: bool,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one live arrival. The sole mutator during a live session.
    pub fn append(&mut self, msg: ChatMessage) {
        if self.history_resolved {
            self.entries.push(msg);
        } else {
            self.buffered.push(msg);
        }
    }

    /// Install the startup history batch and release any buffered live
    /// arrivals after it. Applied at most once; later calls are ignored.
    /// A failed fetch resolves with an empty batch.
    pub fn resolve_history(&mut self, batch: Vec<ChatMessage>) {
        if self.history_resolved {
            return;
        }
        self.history_resolved = true;
        self.entries = batch;
        self.entries.append(&mut self.buffered);
    }

    /// Number of visible entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cheap snapshot for publication to observers.
    pub fn snapshot(&self) -> Arc<[ChatMessage]> {
        self.entries.as_slice().into()
    }
}
