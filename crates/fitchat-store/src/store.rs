//! The chat storage service.
//!
//! One [`ChatStore`] is built at startup and shared (behind an `Arc`) by
//! everything that touches cached chat data. All mutable bookkeeping, such as
//! the recovery-warning cooldown, lives on the instance so tests can build
//! isolated stores.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use fitchat_shared::{Clock, ConversationId, SystemClock};

use crate::keys;
use crate::kv::KeyValueStore;
use crate::limits::StoreLimits;

/// Result of writing a list (message cache or outbox) to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The list was written, after budget pruning, with `kept` items.
    Written { kept: usize },
    /// The store was full and the list had to be shortened to `kept` items.
    Shrunk { kept: usize },
    /// Nothing fit; the entry was removed.
    Dropped,
    /// The store failed for another reason; the previous entry is untouched.
    Failed,
}

impl WriteOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Written { .. } | Self::Shrunk { .. })
    }
}

pub struct ChatStore {
    kv: Arc<dyn KeyValueStore>,
    limits: StoreLimits,
    clock: Arc<dyn Clock>,
    last_recovery_log: Mutex<Option<DateTime<Utc>>>,
}

impl ChatStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, limits: StoreLimits) -> Self {
        Self::with_clock(kv, limits, Arc::new(SystemClock))
    }

    pub fn with_clock(kv: Arc<dyn KeyValueStore>, limits: StoreLimits, clock: Arc<dyn Clock>) -> Self {
        Self {
            kv,
            limits,
            clock,
            last_recovery_log: Mutex::new(None),
        }
    }

    pub fn limits(&self) -> &StoreLimits {
        &self.limits
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub(crate) fn kv(&self) -> &dyn KeyValueStore {
        self.kv.as_ref()
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn last_recovery_log(&self) -> std::sync::MutexGuard<'_, Option<DateTime<Utc>>> {
        self.last_recovery_log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Remove the cache, sync marker and offline queue of one conversation.
    pub fn clear(&self, id: &ConversationId) {
        for key in [keys::cache_key(id), keys::sync_key(id), keys::outbox_key(id)] {
            if let Err(e) = self.kv.remove(&key) {
                tracing::debug!(key = %key, error = %e, "failed to remove chat artifact");
            }
        }
    }

    /// Remove every per-conversation artifact. Preferences are kept.
    pub fn clear_all(&self) {
        let conversations = self.conversations_with_artifacts();
        for id in &conversations {
            self.clear(id);
        }
        tracing::info!(count = conversations.len(), "cleared all chat caches");
    }

    /// Every conversation owning at least one key in the store.
    pub(crate) fn conversations_with_artifacts(&self) -> Vec<ConversationId> {
        let mut ids: Vec<ConversationId> = match self.kv.keys() {
            Ok(all) => all.iter().filter_map(|k| keys::conversation_of(k)).collect(),
            Err(e) => {
                tracing::debug!(error = %e, "failed to list store keys");
                Vec::new()
            }
        };
        ids.sort();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::TimeZone;
    use fitchat_shared::{ManualClock, Message};

    use super::*;
    use crate::kv::MemoryStore;

    pub fn conv(id: &str) -> ConversationId {
        ConversationId::new(id).unwrap()
    }

    pub fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    pub fn msg(id: &str, secs: i64, text: &str) -> Message {
        Message {
            id: Some(id.to_string()),
            temp_id: None,
            sender: "Alice".into(),
            user_id: Some("u-alice".into()),
            message: text.to_string(),
            timestamp: start() + chrono::Duration::seconds(secs),
            is_bot: false,
            message_type: Default::default(),
            card_data: None,
        }
    }

    pub fn store_with(kv: Arc<dyn KeyValueStore>, limits: StoreLimits) -> (ChatStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start()));
        (ChatStore::with_clock(kv, limits, clock.clone()), clock)
    }

    pub fn memory_store() -> (ChatStore, Arc<ManualClock>) {
        store_with(Arc::new(MemoryStore::new()), StoreLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;

    #[test]
    fn clear_removes_all_artifacts_of_one_conversation() {
        let (store, _) = memory_store();
        let a = conv("a");
        let b = conv("b");

        store.save(&a, &[msg("1", 0, "hi")]);
        store.enqueue(&a, msg("2", 1, "queued"));
        store.save(&b, &[msg("3", 0, "other")]);

        store.clear(&a);

        assert!(store.load(&a).is_empty());
        assert_eq!(store.last_sync(&a), 0);
        assert!(store.outbox(&a).is_empty());
        assert_eq!(store.load(&b).len(), 1);
    }

    #[test]
    fn clear_all_keeps_preferences() {
        let (store, _) = memory_store();
        let mut prefs = store.preferences();
        prefs.push_notifications = false;
        store.set_preferences(&prefs).unwrap();
        store.save(&conv("a"), &[msg("1", 0, "hi")]);

        store.clear_all();

        assert!(store.load(&conv("a")).is_empty());
        assert!(!store.preferences().push_notifications);
    }
}
