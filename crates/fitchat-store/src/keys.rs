//! Key naming for chat artifacts in the shared key-value store.
//!
//! Every key is scoped by conversation so writes for one challenge never
//! clobber another.

use fitchat_shared::ConversationId;

pub const CACHE_PREFIX: &str = "chat_cache_";
pub const SYNC_PREFIX: &str = "chat_last_sync_";
pub const OUTBOX_PREFIX: &str = "chat_offline_";
pub const PREFERENCES_KEY: &str = "chat_notification_prefs";

pub fn cache_key(id: &ConversationId) -> String {
    format!("{CACHE_PREFIX}{id}")
}

pub fn sync_key(id: &ConversationId) -> String {
    format!("{SYNC_PREFIX}{id}")
}

pub fn outbox_key(id: &ConversationId) -> String {
    format!("{OUTBOX_PREFIX}{id}")
}

/// Conversation owning a per-conversation key, if `key` is one.
pub fn conversation_of(key: &str) -> Option<ConversationId> {
    [CACHE_PREFIX, SYNC_PREFIX, OUTBOX_PREFIX]
        .iter()
        .find_map(|prefix| key.strip_prefix(prefix))
        .and_then(|rest| ConversationId::new(rest).ok())
}
