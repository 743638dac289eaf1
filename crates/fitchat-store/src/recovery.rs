//! Quota-exceeded recovery.
//!
//! When the store rejects a write because it is full, the cascade is:
//! 1. evict other conversations, oldest-synced first, keeping only the most
//!    recent `retained_conversations`;
//! 2. retry with the full list, then with shorter tails (newest items kept):
//!    each of `quota_retry_counts` capped below the list length, then halving
//!    down to a single item;
//! 3. remove the entry for this conversation.
//!
//! None of this is reported to callers as an error.

use fitchat_shared::constants::RECOVERY_LOG_COOLDOWN;
use fitchat_shared::ConversationId;
use serde::Serialize;

use crate::error::Result;
use crate::store::{ChatStore, WriteOutcome};

impl ChatStore {
    /// Write a JSON list under `key`, running the recovery cascade on quota
    /// errors.
    pub(crate) fn write_list<T: Serialize>(
        &self,
        id: &ConversationId,
        key: &str,
        items: &[T],
    ) -> WriteOutcome {
        match self.try_write(key, items) {
            Ok(()) => return WriteOutcome::Written { kept: items.len() },
            Err(e) if e.is_quota_exceeded() => {}
            Err(e) => {
                tracing::warn!(conversation = %id, key, error = %e, "store write failed");
                return WriteOutcome::Failed;
            }
        }

        self.note_recovery(id, "storage quota exceeded, evicting other conversations");
        let evicted = self.evict_other_conversations(id);
        tracing::debug!(conversation = %id, evicted, "evicted conversations after quota error");

        match self.try_write(key, items) {
            Ok(()) => return WriteOutcome::Written { kept: items.len() },
            Err(e) if e.is_quota_exceeded() => {}
            Err(e) => {
                tracing::warn!(conversation = %id, key, error = %e, "store write failed");
                return WriteOutcome::Failed;
            }
        }

        for count in shrink_steps(items.len(), &self.limits().quota_retry_counts) {
            let tail = &items[items.len() - count..];
            match self.try_write(key, tail) {
                Ok(()) => {
                    self.note_recovery(id, "storage quota exceeded, kept a shortened list");
                    return WriteOutcome::Shrunk { kept: count };
                }
                Err(e) if e.is_quota_exceeded() => continue,
                Err(e) => {
                    tracing::warn!(conversation = %id, key, error = %e, "store write failed");
                    return WriteOutcome::Failed;
                }
            }
        }

        self.note_recovery(id, "storage quota exceeded, dropped entry");
        if let Err(e) = self.kv().remove(key) {
            tracing::debug!(key, error = %e, "failed to remove entry after quota error");
        }
        WriteOutcome::Dropped
    }

    fn try_write<T: Serialize>(&self, key: &str, items: &[T]) -> Result<()> {
        let json = serde_json::to_string(items)?;
        self.kv().set(key, &json)
    }

    /// Delete the artifacts of every conversation except `keep` and the most
    /// recently synced others, so that at most `retained_conversations`
    /// conversations (including `keep`) remain. Returns how many were evicted.
    pub(crate) fn evict_other_conversations(&self, keep: &ConversationId) -> usize {
        let mut others: Vec<(ConversationId, i64)> = self
            .conversations_with_artifacts()
            .into_iter()
            .filter(|id| id != keep)
            .map(|id| {
                let synced = self.last_sync(&id);
                (id, synced)
            })
            .collect();

        // Most recent first.
        others.sort_by(|a, b| b.1.cmp(&a.1));

        let retain = self.limits().retained_conversations.saturating_sub(1);
        let victims: Vec<ConversationId> = others.into_iter().skip(retain).map(|(id, _)| id).collect();

        for id in &victims {
            self.clear(id);
        }
        victims.len()
    }

    /// Warn about a recovery at most once per cooldown window.
    pub(crate) fn note_recovery(&self, id: &ConversationId, what: &str) {
        let now = self.now();
        let mut last = self.last_recovery_log();

        let cooled_down = match *last {
            None => true,
            Some(at) => (now - at)
                .to_std()
                .map(|elapsed| elapsed >= RECOVERY_LOG_COOLDOWN)
                .unwrap_or(false),
        };

        if cooled_down {
            *last = Some(now);
            tracing::warn!(conversation = %id, "{what}");
        } else {
            tracing::debug!(conversation = %id, "{what}");
        }
    }

    /// Whether the next recovery would be logged at warn level.
    #[cfg(test)]
    pub(crate) fn recovery_log_armed(&self) -> bool {
        let now = self.now();
        match *self.last_recovery_log() {
            None => true,
            Some(at) => (now - at).to_std().map(|e| e >= RECOVERY_LOG_COOLDOWN).unwrap_or(false),
        }
    }
}

/// Lengths to retry after a rejected write, strictly decreasing and all
/// shorter than `len`.
fn shrink_steps(len: usize, configured: &[usize]) -> Vec<usize> {
    let mut steps = Vec::new();
    let mut last = len;
    for &count in configured {
        let step = count.min(len.saturating_sub(1));
        if step > 0 && step < last {
            steps.push(step);
            last = step;
        }
    }
    while last > 1 {
        last /= 2;
        steps.push(last);
    }
    steps
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::shrink_steps;
    use crate::kv::{KeyValueStore, MemoryStore};
    use crate::limits::StoreLimits;
    use crate::store::test_support::*;
    use crate::store::WriteOutcome;

    fn many(n: usize) -> Vec<fitchat_shared::Message> {
        (0..n)
            .map(|i| msg(&format!("m{i}"), i as i64, "a reasonably sized chat message body"))
            .collect()
    }

    fn entry_bytes(messages: &[fitchat_shared::Message]) -> usize {
        serde_json::to_string(messages).unwrap().len()
    }

    #[test]
    fn evicts_oldest_synced_conversations_first() {
        let kv = Arc::new(MemoryStore::new());
        let limits = StoreLimits {
            retained_conversations: 2,
            ..StoreLimits::default()
        };
        let (store, clock) = store_with(kv, limits);

        for name in ["old", "mid", "new"] {
            store.save(&conv(name), &[msg(name, 0, "x")]);
            clock.advance(chrono::Duration::seconds(10));
        }

        let evicted = store.evict_other_conversations(&conv("current"));

        assert_eq!(evicted, 2);
        assert_eq!(store.load(&conv("new")).len(), 1);
        assert!(store.load(&conv("mid")).is_empty());
        assert!(store.load(&conv("old")).is_empty());
    }

    #[test]
    fn quota_error_frees_space_from_other_conversations() {
        let messages = many(10);
        let size = entry_bytes(&messages);
        // Room for roughly one conversation.
        let kv = Arc::new(MemoryStore::with_capacity(size + size / 2));
        let limits = StoreLimits {
            retained_conversations: 1,
            ..StoreLimits::default()
        };
        let (store, _) = store_with(kv, limits);

        assert!(store.save(&conv("first"), &messages).is_stored());
        let outcome = store.save(&conv("second"), &messages);

        assert_eq!(outcome, WriteOutcome::Written { kept: 10 });
        assert!(store.load(&conv("first")).is_empty());
        assert_eq!(store.load(&conv("second")).len(), 10);
    }

    #[test]
    fn quota_error_shrinks_to_retry_counts() {
        let messages = many(40);
        let twenty = entry_bytes(&messages[20..]);
        let kv = Arc::new(MemoryStore::with_capacity(twenty + 200));
        let limits = StoreLimits {
            quota_retry_counts: vec![30, 20, 10],
            ..StoreLimits::default()
        };
        let (store, _) = store_with(kv, limits);

        let outcome = store.save(&conv("c"), &messages);

        assert_eq!(outcome, WriteOutcome::Shrunk { kept: 20 });
        let loaded = store.load(&conv("c"));
        assert_eq!(loaded.len(), 20);
        // The newest messages are the ones kept.
        assert_eq!(loaded.last().unwrap().id.as_deref(), Some("m39"));
        assert_eq!(loaded.first().unwrap().id.as_deref(), Some("m20"));
    }

    #[test]
    fn short_lists_shrink_with_default_limits() {
        // Ten messages is below every default retry count.
        let messages = many(10);
        let kv = Arc::new(MemoryStore::with_capacity(
            entry_bytes(&messages[5..]) + "chat_cache_c".len(),
        ));
        let (store, _) = store_with(kv, StoreLimits::default());

        let outcome = store.save(&conv("c"), &messages);

        assert_eq!(outcome, WriteOutcome::Shrunk { kept: 4 });
        let loaded = store.load(&conv("c"));
        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded.last().unwrap().id.as_deref(), Some("m9"));
    }

    #[test]
    fn shrink_steps_stay_below_list_length() {
        assert_eq!(shrink_steps(7, &[200, 100, 50]), vec![6, 3, 1]);
        assert_eq!(shrink_steps(40, &[30, 20, 10]), vec![30, 20, 10, 5, 2, 1]);
        assert_eq!(shrink_steps(2, &[100, 50, 25]), vec![1]);
        assert!(shrink_steps(1, &[200]).is_empty());
        assert!(shrink_steps(0, &[]).is_empty());
    }

    #[test]
    fn quota_error_drops_entry_when_nothing_fits() {
        let kv = Arc::new(MemoryStore::with_capacity(64));
        let (store, _) = store_with(kv.clone(), StoreLimits::default());

        let outcome = store.save(&conv("c"), &many(5));

        assert_eq!(outcome, WriteOutcome::Dropped);
        assert!(store.load(&conv("c")).is_empty());
        assert_eq!(store.last_sync(&conv("c")), 0);
        assert!(kv.keys().unwrap().is_empty());
    }

    #[test]
    fn recovery_warning_respects_cooldown() {
        let (store, clock) = memory_store();
        let id = conv("c");

        assert!(store.recovery_log_armed());
        store.note_recovery(&id, "first");
        assert!(!store.recovery_log_armed());

        clock.advance(chrono::Duration::minutes(4));
        store.note_recovery(&id, "suppressed");
        assert!(!store.recovery_log_armed());

        clock.advance(chrono::Duration::minutes(2));
        assert!(store.recovery_log_armed());
    }
}
