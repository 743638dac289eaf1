//! Platform-dependent storage budgets.

use fitchat_shared::PlatformProfile;

/// Budgets applied by [`ChatStore`](crate::ChatStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLimits {
    /// Maximum serialized size of one conversation's cached message list.
    pub max_cache_bytes: usize,
    /// Maximum number of cached messages per conversation.
    pub max_cached_messages: usize,
    /// Maximum number of queued offline messages per conversation.
    pub max_outbox_entries: usize,
    /// Conversations (current one included) kept when freeing space.
    pub retained_conversations: usize,
    /// Message counts tried, in order, when a write is rejected for quota.
    pub quota_retry_counts: Vec<usize>,
    /// Optional budget for the whole store. When the next write would push
    /// total usage past it, other conversations are evicted first.
    pub store_budget_bytes: Option<usize>,
}

impl StoreLimits {
    pub fn for_platform(profile: PlatformProfile) -> Self {
        match profile {
            PlatformProfile::Desktop => Self {
                max_cache_bytes: 1024 * 1024, // 1 MiB
                max_cached_messages: 500,
                max_outbox_entries: 50,
                retained_conversations: 5,
                quota_retry_counts: vec![200, 100, 50],
                store_budget_bytes: None,
            },
            PlatformProfile::Constrained => Self {
                max_cache_bytes: 256 * 1024, // 256 KiB
                max_cached_messages: 200,
                max_outbox_entries: 20,
                retained_conversations: 2,
                quota_retry_counts: vec![100, 50, 25],
                store_budget_bytes: None,
            },
        }
    }
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self::for_platform(PlatformProfile::Desktop)
    }
}
