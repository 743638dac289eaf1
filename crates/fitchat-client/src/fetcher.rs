//! Keeps the local message cache consistent with the remote conversation.
//!
//! Reads are served from the cache while it is fresh and fall back to it
//! when the network fails. Writes are optimistic: the message is cached
//! immediately, swapped for the server copy on success, and parked in the
//! offline outbox on failure.

use std::sync::Arc;
use std::time::Duration;

use fitchat_shared::constants::FRESHNESS_WINDOW;
use fitchat_shared::message::sort_chronologically;
use fitchat_shared::{ConversationId, Message, MessageDraft};
use fitchat_store::ChatStore;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::ChatApi;
use crate::auth::AuthContext;
use crate::error::{ClientError, Result};

/// What an outbox drain achieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub sent: usize,
    pub remaining: usize,
}

pub struct MessageFetcher {
    api: Arc<dyn ChatApi>,
    store: Arc<ChatStore>,
    auth: Arc<dyn AuthContext>,
    freshness: Duration,
    /// Held for the whole of a drain so two drains never post the same entry.
    draining: Mutex<()>,
}

impl MessageFetcher {
    pub fn new(api: Arc<dyn ChatApi>, store: Arc<ChatStore>, auth: Arc<dyn AuthContext>) -> Self {
        Self {
            api,
            store,
            auth,
            freshness: FRESHNESS_WINDOW,
            draining: Mutex::new(()),
        }
    }

    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = freshness;
        self
    }

    pub fn store(&self) -> &Arc<ChatStore> {
        &self.store
    }

    fn is_fresh(&self, id: &ConversationId) -> bool {
        let last_sync = self.store.last_sync(id);
        if last_sync == 0 {
            return false;
        }
        let age_ms = self.store.clock().now().timestamp_millis() - last_sync;
        age_ms >= 0 && (age_ms as u128) < self.freshness.as_millis()
    }

    /// All messages of a conversation, oldest first.
    ///
    /// Without `force_refresh`, a non-empty cache synced within the
    /// freshness window is returned as is. Network failures fall back to the
    /// cache, however old; an error is returned only when the cache is empty.
    /// Unconfirmed local sends survive a refresh.
    pub async fn fetch_all(&self, id: &ConversationId, force_refresh: bool) -> Result<Vec<Message>> {
        let cached = self.store.load(id);

        if !force_refresh && !cached.is_empty() && self.is_fresh(id) {
            debug!(conversation = %id, count = cached.len(), "serving fresh cache");
            return Ok(cached);
        }

        let Some(session) = self.auth.session() else {
            if cached.is_empty() {
                return Err(ClientError::NotAuthenticated);
            }
            return Ok(cached);
        };

        match self.api.list_messages(id, &session.token).await {
            Ok(mut messages) => {
                // Unconfirmed local sends are not on the server yet; keep them.
                let pending: Vec<Message> = cached.into_iter().filter(Message::is_pending).collect();
                if !pending.is_empty() {
                    messages.extend(pending);
                    sort_chronologically(&mut messages);
                }
                self.store.save(id, &messages);
                Ok(messages)
            }
            Err(e) if !cached.is_empty() => {
                warn!(conversation = %id, error = %e, "fetch failed, serving cached messages");
                Ok(cached)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Send a message.
    ///
    /// The optimistic copy is cached first. On failure it is queued in the
    /// offline outbox and the error is returned so the caller can offer a
    /// retry.
    pub async fn send(&self, id: &ConversationId, draft: MessageDraft) -> Result<Message> {
        let optimistic = Message::optimistic(&draft, self.store.clock().now());
        self.store.add_pending(id, optimistic.clone());

        let Some(session) = self.auth.session() else {
            self.store.enqueue(id, optimistic);
            return Err(ClientError::NotAuthenticated);
        };

        match self.api.post_message(id, &draft, &session.token).await {
            Ok(confirmed) => {
                self.store
                    .merge_confirmed(id, confirmed.clone(), optimistic.temp_id.as_deref());
                info!(conversation = %id, id = ?confirmed.id, "message sent");
                Ok(confirmed)
            }
            Err(e) => {
                warn!(conversation = %id, error = %e, "send failed, queued for retry");
                self.store.enqueue(id, optimistic);
                Err(e.into())
            }
        }
    }

    /// Resend queued messages in order.
    ///
    /// Each delivered entry is removed from the outbox and swapped into the
    /// cache as soon as the server confirms it. The first failure stops the
    /// drain; that entry and the ones after it stay queued. Concurrent drains
    /// run one after the other, the later one seeing only what is left.
    pub async fn drain_outbox(&self, id: &ConversationId) -> Result<DrainReport> {
        let _draining = self.draining.lock().await;
        let queue = self.store.outbox(id);
        if queue.is_empty() {
            return Ok(DrainReport::default());
        }

        let Some(session) = self.auth.session() else {
            return Ok(DrainReport {
                sent: 0,
                remaining: queue.len(),
            });
        };

        let mut sent = 0;
        for entry in &queue {
            match self.api.post_message(id, &entry.to_draft(), &session.token).await {
                Ok(confirmed) => {
                    self.store.merge_confirmed(id, confirmed, entry.temp_id.as_deref());
                    self.store.acknowledge(id, entry);
                    sent += 1;
                }
                Err(e) => {
                    debug!(conversation = %id, error = %e, "outbox drain stopped");
                    break;
                }
            }
        }

        let report = DrainReport {
            sent,
            remaining: self.store.outbox_len(id),
        };
        if sent > 0 {
            info!(conversation = %id, sent, remaining = report.remaining, "drained offline messages");
        }
        Ok(report)
    }
}
