use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::models::{derive_status, Aggregate, ConversationCounters, ConversationKind, StatusLevel};

/// Thread-safe owner of the per-conversation counters.
///
/// The map is never handed out; every read and write goes through one of the
/// methods below and holds the lock only for that single operation.
#[derive(Debug, Clone, Default)]
pub struct AggregateStore {
    inner: Arc<Mutex<Aggregate>>,
}

impl AggregateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a freshly reconciled aggregate, discarding the old one.
    pub fn replace_all(&self, aggregate: Aggregate) {
        let mut counts = self.inner.lock();
        debug!(
            before = counts.len(),
            after = aggregate.len(),
            "Replacing unread counts"
        );
        *counts = aggregate;
    }

    /// Count one new message. Returns the counters after the update.
    ///
    /// Exactly one kind bucket grows (none for `Other`); reply and mention
    /// counts grow independently of it.
    pub fn apply_post(
        &self,
        conversation_id: &str,
        kind: ConversationKind,
        is_reply: bool,
        is_mentioned: bool,
    ) -> ConversationCounters {
        let mut counts = self.inner.lock();
        let entry = counts.entry(conversation_id.to_string()).or_default();
        let before = *entry;

        entry.add_unread(kind, 1);
        if is_reply {
            entry.reply_unread += 1;
        }
        if is_mentioned {
            entry.mention_unread += 1;
        }

        debug!(
            conversation = conversation_id,
            before = %before,
            after = %entry,
            "Processed post"
        );
        *entry
    }

    /// Reset every listed conversation to all-zero, creating missing entries.
    /// Returns how many conversations were touched.
    pub fn apply_viewed<I, S>(&self, conversation_ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut counts = self.inner.lock();
        let mut touched = 0;
        for id in conversation_ids {
            let id = id.as_ref();
            if let Some(before) = counts.get(id) {
                debug!(conversation = id, before = %before, "Conversation viewed, clearing");
            }
            counts.insert(id.to_string(), ConversationCounters::default());
            touched += 1;
        }
        touched
    }

    /// Copy of the current aggregate, taken under the lock.
    pub fn snapshot(&self) -> Aggregate {
        self.inner.lock().clone()
    }

    pub fn get(&self, conversation_id: &str) -> Option<ConversationCounters> {
        self.inner.lock().get(conversation_id).copied()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Derive the status from a snapshot. The lock is released before the
    /// derivation runs.
    pub fn status(&self) -> StatusLevel {
        let snapshot = self.snapshot();
        derive_status(snapshot.values())
    }
}
