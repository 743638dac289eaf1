//! Poll loop tying the fetcher, detector and dispatcher together for the
//! selected conversation.
//!
//! One check is in flight at a time; a tick that finds another one running
//! returns [`TickOutcome::Busy`] instead of queueing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use fitchat_shared::{ConversationId, Message, MessageDraft};
use fitchat_store::ChatStore;
use tokio::sync::{watch, Notify};
use tracing::{debug, info, trace, warn};

use crate::api::ChatApi;
use crate::auth::AuthContext;
use crate::detector::NewMessageDetector;
use crate::dispatcher::{DispatchOutcome, NotificationDispatcher};
use crate::error::{ClientError, Result};
use crate::fetcher::{DrainReport, MessageFetcher};
use crate::notify::NotificationData;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReconcileState {
    #[default]
    Idle,
    Checking,
    Notifying,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    NoConversation,
    /// Another check is still running.
    Busy,
    NoSession,
    NoNew,
    Notified(DispatchOutcome),
    /// The remote check failed. Polling failures are never surfaced further.
    Failed,
}

/// Marks a check as in flight and returns the state to idle when dropped.
struct InFlight<'a> {
    state: &'a Mutex<ReconcileState>,
}

impl<'a> InFlight<'a> {
    fn enter(state: &'a Mutex<ReconcileState>) -> Option<Self> {
        let mut current = state.lock().unwrap_or_else(|e| e.into_inner());
        if *current != ReconcileState::Idle {
            return None;
        }
        *current = ReconcileState::Checking;
        Some(Self { state })
    }

    fn set(&self, next: ReconcileState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = next;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set(ReconcileState::Idle);
    }
}

pub struct Reconciler {
    fetcher: MessageFetcher,
    detector: NewMessageDetector,
    dispatcher: tokio::sync::Mutex<NotificationDispatcher>,
    auth: Arc<dyn AuthContext>,
    store: Arc<ChatStore>,
    state: Mutex<ReconcileState>,
    selected: RwLock<Option<ConversationId>>,
    foreground: AtomicBool,
    wake: Notify,
}

impl Reconciler {
    pub fn new(
        api: Arc<dyn ChatApi>,
        store: Arc<ChatStore>,
        auth: Arc<dyn AuthContext>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            fetcher: MessageFetcher::new(api.clone(), store.clone(), auth.clone()),
            detector: NewMessageDetector::new(api, store.clone()),
            dispatcher: tokio::sync::Mutex::new(dispatcher),
            auth,
            store,
            state: Mutex::new(ReconcileState::Idle),
            selected: RwLock::new(None),
            foreground: AtomicBool::new(true),
            wake: Notify::new(),
        }
    }

    pub fn fetcher(&self) -> &MessageFetcher {
        &self.fetcher
    }

    pub fn state(&self) -> ReconcileState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn selected(&self) -> Option<ConversationId> {
        self.selected.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_foreground(&self) -> bool {
        self.foreground.load(Ordering::SeqCst)
    }

    /// Switch to another conversation (or none).
    ///
    /// Per-conversation notification state is reset, queued offline messages
    /// are replayed and the cache is refreshed from the server. Returns the
    /// refreshed message list.
    pub async fn select_conversation(&self, id: Option<ConversationId>) -> Result<Vec<Message>> {
        *self.selected.write().unwrap_or_else(|e| e.into_inner()) = id.clone();
        self.dispatcher.lock().await.reset();

        let Some(id) = id else {
            debug!("conversation deselected");
            return Ok(Vec::new());
        };
        info!(conversation = %id, "conversation selected");

        let report = self.fetcher.drain_outbox(&id).await?;
        if report.remaining > 0 {
            debug!(conversation = %id, remaining = report.remaining, "offline messages still queued");
        }
        let messages = self.fetcher.fetch_all(&id, true).await?;
        self.wake.notify_one();
        Ok(messages)
    }

    /// Record a visibility change. Coming to the foreground checks right away.
    pub fn set_foreground(&self, foreground: bool) {
        let was = self.foreground.swap(foreground, Ordering::SeqCst);
        if foreground && !was {
            trace!("foregrounded, waking poll loop");
            self.wake.notify_one();
        }
    }

    /// Send a message to the selected conversation.
    pub async fn send(&self, draft: MessageDraft) -> Result<Message> {
        let Some(id) = self.selected() else {
            return Err(ClientError::NoConversation);
        };
        self.fetcher.send(&id, draft).await
    }

    /// Replay queued offline messages of the selected conversation.
    pub async fn retry_outbox(&self) -> Result<DrainReport> {
        match self.selected() {
            Some(id) => self.fetcher.drain_outbox(&id).await,
            None => Ok(DrainReport::default()),
        }
    }

    /// One detection cycle for the selected conversation.
    pub async fn tick(&self) -> TickOutcome {
        let Some(id) = self.selected() else {
            return TickOutcome::NoConversation;
        };
        let Some(guard) = InFlight::enter(&self.state) else {
            trace!(conversation = %id, "check already in flight");
            return TickOutcome::Busy;
        };
        let Some(session) = self.auth.session() else {
            trace!("no session, skipping check");
            return TickOutcome::NoSession;
        };

        let detection = match self.detector.check(&id, &session).await {
            Ok(detection) => detection,
            Err(e) => {
                warn!(conversation = %id, error = %e, "new message check failed");
                return TickOutcome::Failed;
            }
        };

        let latest = match detection.latest {
            Some(latest) if detection.has_new => latest,
            _ => return TickOutcome::NoNew,
        };

        guard.set(ReconcileState::Notifying);
        let prefs = self.store.preferences();
        let outcome = self
            .dispatcher
            .lock()
            .await
            .dispatch(&id, &latest, &session.identity, &prefs)
            .await;
        TickOutcome::Notified(outcome)
    }

    /// The user reached the bottom of the conversation.
    pub async fn mark_read(&self) {
        self.dispatcher.lock().await.mark_read();
    }

    pub async fn unread_count(&self) -> usize {
        self.dispatcher.lock().await.unread_count()
    }

    pub async fn handle_notification_click(&self, data: &NotificationData) {
        self.dispatcher.lock().await.handle_click(data);
    }

    /// Poll until `shutdown` flips to `true`.
    ///
    /// The interval is re-read from preferences every cycle. Backgrounded
    /// periods skip the check; a foreground transition or a new selection
    /// wakes the loop early.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!("reconciler started");
        loop {
            if *shutdown.borrow() {
                break;
            }

            if self.is_foreground() {
                let outcome = self.tick().await;
                trace!(?outcome, "tick");
            }
            self.dispatcher.lock().await.prune_expired();

            let interval = self.store.preferences().check_interval();
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = self.wake.notified() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("reconciler stopped");
    }
}
