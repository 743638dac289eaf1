//! Persistent per-conversation message cache.
//!
//! Each conversation stores its message list (ascending by timestamp, newest
//! last) under one key and the time of the last successful sync under
//! another. Nothing in this module returns an error to the caller: a
//! missing or corrupt entry reads as an empty list, and failed writes are
//! handled by the recovery cascade.

use fitchat_shared::message::sort_chronologically;
use fitchat_shared::{ConversationId, Message};

use crate::keys;
use crate::store::{ChatStore, WriteOutcome};

impl ChatStore {
    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Cached messages for a conversation, oldest first.
    pub fn load(&self, id: &ConversationId) -> Vec<Message> {
        let key = keys::cache_key(id);
        let raw = match self.kv().get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::debug!(conversation = %id, error = %e, "cache read failed");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Message>>(&raw) {
            Ok(mut messages) => {
                sort_chronologically(&mut messages);
                messages
            }
            Err(e) => {
                tracing::debug!(conversation = %id, error = %e, "ignoring corrupt cache entry");
                Vec::new()
            }
        }
    }

    /// Epoch milliseconds of the last successful save, 0 if never synced.
    pub fn last_sync(&self, id: &ConversationId) -> i64 {
        self.kv()
            .get(&keys::sync_key(id))
            .ok()
            .flatten()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or(0)
    }

    /// Conversations with a cache entry, oldest sync first.
    pub fn cached_conversations(&self) -> Vec<(ConversationId, i64)> {
        let mut cached: Vec<(ConversationId, i64)> = self
            .conversations_with_artifacts()
            .into_iter()
            .filter(|id| matches!(self.kv().get(&keys::cache_key(id)), Ok(Some(_))))
            .map(|id| {
                let synced = self.last_sync(&id);
                (id, synced)
            })
            .collect();
        cached.sort_by_key(|(_, synced)| *synced);
        cached
    }

    // ------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------

    /// Persist a conversation's message list as synced from the server and
    /// stamp the sync marker.
    ///
    /// The list is sorted, de-duplicated by message id and pruned to the
    /// byte budget and then the count budget (oldest dropped first) before
    /// it is written.
    pub fn save(&self, id: &ConversationId, messages: &[Message]) -> WriteOutcome {
        self.store_messages(id, messages, true)
    }

    /// Add a locally created message (not yet on the server). The sync
    /// marker is left alone, so a conversation never fetched stays stale.
    pub fn add_pending(&self, id: &ConversationId, message: Message) -> WriteOutcome {
        let mut messages = self.load(id);
        messages.push(message);
        self.store_messages(id, &messages, false)
    }

    fn store_messages(&self, id: &ConversationId, messages: &[Message], mark_synced: bool) -> WriteOutcome {
        let limits = self.limits();
        let messages = normalize(messages);
        let messages = prune_to_bytes(messages, limits.max_cache_bytes);
        let messages = prune_to_count(messages, limits.max_cached_messages);

        let key = keys::cache_key(id);
        self.reserve_store_budget(id, &key, &messages);

        let outcome = self.write_list(id, &key, &messages);
        match outcome {
            WriteOutcome::Written { .. } | WriteOutcome::Shrunk { .. } if mark_synced => {
                let now = self.now().timestamp_millis().to_string();
                if let Err(e) = self.kv().set(&keys::sync_key(id), &now) {
                    tracing::debug!(conversation = %id, error = %e, "failed to stamp sync marker");
                }
            }
            WriteOutcome::Dropped => {
                if let Err(e) = self.kv().remove(&keys::sync_key(id)) {
                    tracing::debug!(conversation = %id, error = %e, "failed to clear sync marker");
                }
            }
            _ => {}
        }
        outcome
    }

    /// Replace an optimistic entry (matched by `temp_id`) with its
    /// server-confirmed copy, or insert the copy if no entry matches. This is
    /// not a full sync, so the sync marker is not touched.
    pub fn merge_confirmed(
        &self,
        id: &ConversationId,
        confirmed: Message,
        temp_id: Option<&str>,
    ) -> WriteOutcome {
        let mut messages = self.load(id);
        messages.retain(|m| {
            let same_temp = temp_id.is_some() && m.temp_id.as_deref() == temp_id;
            let same_id = confirmed.id.is_some() && m.id == confirmed.id;
            !(same_temp || same_id)
        });
        messages.push(confirmed);
        self.store_messages(id, &messages, false)
    }

    /// Add messages that are not cached yet (by id) and re-save.
    pub fn append_messages(&self, id: &ConversationId, newer: &[Message]) -> WriteOutcome {
        let mut messages = self.load(id);
        for message in newer {
            let known = message.id.is_some() && messages.iter().any(|m| m.id == message.id);
            if !known {
                messages.push(message.clone());
            }
        }
        self.save(id, &messages)
    }

    /// If the store has an overall budget and this write would exceed it,
    /// make room by evicting other conversations first.
    fn reserve_store_budget(&self, id: &ConversationId, key: &str, messages: &[Message]) {
        let Some(budget) = self.limits().store_budget_bytes else {
            return;
        };

        let incoming = serialized_len(messages) + key.len();
        let existing = match self.kv().get(key) {
            Ok(Some(raw)) => raw.len() + key.len(),
            _ => 0,
        };
        let used = self.kv().usage_bytes().unwrap_or(0);

        if used.saturating_sub(existing) + incoming > budget {
            self.note_recovery(id, "store budget reached, evicting other conversations");
            self.evict_other_conversations(id);
        }
    }
}

/// Sort ascending and drop repeated ids, keeping the later copy.
fn normalize(messages: &[Message]) -> Vec<Message> {
    let mut sorted = messages.to_vec();
    sort_chronologically(&mut sorted);

    let mut seen_ids = std::collections::HashSet::new();
    let mut seen_temp = std::collections::HashSet::new();
    let mut out: Vec<Message> = Vec::with_capacity(sorted.len());
    for message in sorted.into_iter().rev() {
        if let Some(id) = &message.id {
            if !seen_ids.insert(id.clone()) {
                continue;
            }
        } else if let Some(temp) = &message.temp_id {
            if !seen_temp.insert(temp.clone()) {
                continue;
            }
        }
        out.push(message);
    }
    out.reverse();
    out
}

/// Byte length of `messages` serialized as a compact JSON array.
fn serialized_len(messages: &[Message]) -> usize {
    let items: usize = messages.iter().map(message_len).sum();
    2 + items + messages.len().saturating_sub(1)
}

fn message_len(message: &Message) -> usize {
    serde_json::to_string(message).map(|s| s.len()).unwrap_or(0)
}

fn prune_to_bytes(messages: Vec<Message>, budget: usize) -> Vec<Message> {
    let sizes: Vec<usize> = messages.iter().map(message_len).collect();
    let mut total = 2 + sizes.iter().sum::<usize>() + sizes.len().saturating_sub(1);

    let mut start = 0;
    while start < sizes.len() && total > budget {
        total -= sizes[start];
        // One comma goes with every element except the last one left.
        if start + 1 < sizes.len() {
            total -= 1;
        }
        start += 1;
    }

    if start > 0 {
        tracing::debug!(dropped = start, "pruned cached messages to byte budget");
    }
    messages.into_iter().skip(start).collect()
}

fn prune_to_count(mut messages: Vec<Message>, max: usize) -> Vec<Message> {
    if messages.len() > max {
        let excess = messages.len() - max;
        messages.drain(..excess);
        tracing::debug!(dropped = excess, "pruned cached messages to count budget");
    }
    messages
}
