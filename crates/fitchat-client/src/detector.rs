//! Decides whether a conversation has moved past the cached tail.
//!
//! There is no incremental endpoint, so every check reads the full remote
//! list and compares its last timestamp with the last cached one. Newer
//! messages are appended to the cache right away so the same message is not
//! reported again on the next tick.

use std::sync::Arc;

use fitchat_shared::{ConversationId, Message, Session};
use fitchat_store::ChatStore;

use crate::api::ChatApi;
use crate::error::ApiError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    pub has_new: bool,
    /// Most recent remote message when `has_new` is set.
    pub latest: Option<Message>,
}

impl Detection {
    fn none() -> Self {
        Self::default()
    }

    fn new_message(latest: Message) -> Self {
        Self {
            has_new: true,
            latest: Some(latest),
        }
    }
}

pub struct NewMessageDetector {
    api: Arc<dyn ChatApi>,
    store: Arc<ChatStore>,
}

impl NewMessageDetector {
    pub fn new(api: Arc<dyn ChatApi>, store: Arc<ChatStore>) -> Self {
        Self { api, store }
    }

    pub async fn check(&self, id: &ConversationId, session: &Session) -> Result<Detection, ApiError> {
        let remote = self.api.list_messages(id, &session.token).await?;
        let Some(remote_last) = remote.last().cloned() else {
            return Ok(Detection::none());
        };

        let cached = self.store.load(id);
        if cached.is_empty() {
            self.store.save(id, &remote);
            tracing::debug!(conversation = %id, count = remote.len(), "seeded empty cache");
            return Ok(Detection::new_message(remote_last));
        }

        // Unsent local messages carry a local timestamp and are not on the
        // server; only confirmed entries mark how far the cache has synced.
        let synced_tail = cached.iter().rev().find(|m| !m.is_pending()).map(|m| m.timestamp);
        if synced_tail.is_some_and(|tail| remote_last.timestamp <= tail) {
            return Ok(Detection::none());
        }

        let newer: Vec<Message> = remote
            .iter()
            .filter(|m| synced_tail.map_or(true, |tail| m.timestamp > tail))
            .cloned()
            .collect();
        self.store.append_messages(id, &newer);

        tracing::debug!(
            conversation = %id,
            new = newer.len(),
            latest = %remote_last.timestamp,
            "new messages detected"
        );
        Ok(Detection::new_message(remote_last))
    }
}
