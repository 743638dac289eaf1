//! Offline outbox: messages the server never confirmed, kept per
//! conversation for a later resend.

use fitchat_shared::{ConversationId, Message};

use crate::keys;
use crate::store::{ChatStore, WriteOutcome};

impl ChatStore {
    /// Queue a message, dropping the oldest entries beyond the outbox
    /// capacity. Re-queuing an entry with the same temporary id replaces it.
    pub fn enqueue(&self, id: &ConversationId, message: Message) -> WriteOutcome {
        let mut queue = self.outbox(id);
        if message.temp_id.is_some() {
            queue.retain(|m| m.temp_id != message.temp_id);
        }
        queue.push(message);

        let max = self.limits().max_outbox_entries;
        if queue.len() > max {
            let excess = queue.len() - max;
            queue.drain(..excess);
            tracing::debug!(conversation = %id, dropped = excess, "outbox full, dropped oldest entries");
        }

        let outcome = self.write_list(id, &keys::outbox_key(id), &queue);
        tracing::debug!(conversation = %id, queued = queue.len(), ?outcome, "queued offline message");
        outcome
    }

    /// Queued messages, in the order they were enqueued.
    pub fn outbox(&self, id: &ConversationId) -> Vec<Message> {
        match self.kv().get(&keys::outbox_key(id)) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::debug!(conversation = %id, error = %e, "ignoring corrupt outbox");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::debug!(conversation = %id, error = %e, "outbox read failed");
                Vec::new()
            }
        }
    }

    pub fn outbox_len(&self, id: &ConversationId) -> usize {
        self.outbox(id).len()
    }

    /// Remove one delivered entry. Entries are matched by temporary id, or
    /// by full equality when the entry has none. Returns whether an entry was
    /// removed.
    pub fn acknowledge(&self, id: &ConversationId, delivered: &Message) -> bool {
        let mut queue = self.outbox(id);
        let position = queue.iter().position(|m| match (&m.temp_id, &delivered.temp_id) {
            (Some(a), Some(b)) => a == b,
            _ => m == delivered,
        });

        let Some(position) = position else {
            return false;
        };
        queue.remove(position);

        if queue.is_empty() {
            self.clear_outbox(id);
        } else {
            self.write_list(id, &keys::outbox_key(id), &queue);
        }
        true
    }

    pub fn clear_outbox(&self, id: &ConversationId) {
        if let Err(e) = self.kv().remove(&keys::outbox_key(id)) {
            tracing::debug!(conversation = %id, error = %e, "failed to clear outbox");
        }
    }
}
