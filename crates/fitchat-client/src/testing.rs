//! In-process fakes shared by the unit tests of this crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use fitchat_shared::{ConversationId, ManualClock, Message, MessageDraft, Session, UserIdentity};
use fitchat_store::{ChatStore, MemoryStore, StoreLimits};

use crate::api::ChatApi;
use crate::auth::StaticAuth;
use crate::error::ApiError;
use crate::notify::{
    Navigator, NotificationChannel, NotificationRequest, Permission, ServiceWorkerBridge,
};

pub fn conv(id: &str) -> ConversationId {
    ConversationId::new(id).unwrap()
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

pub fn at(secs: i64) -> DateTime<Utc> {
    t0() + chrono::Duration::seconds(secs)
}

pub fn msg(id: &str, secs: i64, sender: &str, user_id: &str, text: &str) -> Message {
    Message {
        id: Some(id.to_string()),
        temp_id: None,
        sender: sender.to_string(),
        user_id: Some(user_id.to_string()),
        message: text.to_string(),
        timestamp: at(secs),
        is_bot: false,
        message_type: Default::default(),
        card_data: None,
    }
}

pub fn me() -> Session {
    Session {
        identity: UserIdentity {
            user_id: Some("u-me".into()),
            display_name: Some("Me".into()),
            email: Some("me@example.com".into()),
        },
        token: "tok".into(),
    }
}

pub fn signed_in() -> Arc<StaticAuth> {
    Arc::new(StaticAuth::new(Some(me())))
}

pub fn store() -> (Arc<ChatStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(t0()));
    let store = ChatStore::with_clock(
        Arc::new(MemoryStore::new()),
        StoreLimits::default(),
        clock.clone(),
    );
    (Arc::new(store), clock)
}

// ---------------------------------------------------------------------------
// Chat API
// ---------------------------------------------------------------------------

/// Remote message store kept in memory.
#[derive(Default)]
pub struct FakeChatApi {
    remote: Mutex<HashMap<ConversationId, Vec<Message>>>,
    pub list_calls: AtomicUsize,
    pub post_calls: AtomicUsize,
    offline: AtomicBool,
    /// Fail every post after this many successful ones.
    fail_posts_after: Mutex<Option<usize>>,
    next_id: AtomicUsize,
}

impl FakeChatApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_remote(&self, conversation: &ConversationId, messages: Vec<Message>) {
        self.remote
            .lock()
            .unwrap()
            .insert(conversation.clone(), messages);
    }

    pub fn remote(&self, conversation: &ConversationId) -> Vec<Message> {
        self.remote
            .lock()
            .unwrap()
            .get(conversation)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn fail_posts_after(&self, successes: Option<usize>) {
        *self.fail_posts_after.lock().unwrap() = successes;
    }

    pub fn lists(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn unavailable() -> ApiError {
        ApiError::Status {
            status: 503,
            body: "offline".into(),
        }
    }
}

#[async_trait]
impl ChatApi for FakeChatApi {
    async fn list_messages(
        &self,
        conversation: &ConversationId,
        _token: &str,
    ) -> Result<Vec<Message>, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(self.remote(conversation))
    }

    async fn post_message(
        &self,
        conversation: &ConversationId,
        draft: &MessageDraft,
        _token: &str,
    ) -> Result<Message, ApiError> {
        // Suspend like a real request so concurrent callers interleave.
        tokio::task::yield_now().await;
        let attempt = self.post_calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        {
            let mut limit = self.fail_posts_after.lock().unwrap();
            if let Some(remaining) = limit.as_mut() {
                if *remaining == 0 {
                    return Err(Self::unavailable());
                }
                *remaining -= 1;
            }
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut remote = self.remote.lock().unwrap();
        let list = remote.entry(conversation.clone()).or_default();
        let timestamp = list
            .last()
            .map(|m| m.timestamp + chrono::Duration::seconds(1))
            .unwrap_or_else(|| at(1_000 + attempt as i64));
        let confirmed = Message {
            id: Some(format!("srv-{n}")),
            temp_id: None,
            sender: draft.sender.clone(),
            user_id: draft.user_id.clone(),
            message: draft.message.clone(),
            timestamp,
            is_bot: draft.is_bot,
            message_type: draft.message_type,
            card_data: draft.card_data.clone(),
        };
        list.push(confirmed.clone());
        Ok(confirmed)
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

pub struct RecordingChannel {
    permission: Mutex<Permission>,
    pub shown: Mutex<Vec<NotificationRequest>>,
}

impl RecordingChannel {
    pub fn new(permission: Permission) -> Arc<Self> {
        Arc::new(Self {
            permission: Mutex::new(permission),
            shown: Mutex::new(Vec::new()),
        })
    }

    pub fn shown(&self) -> Vec<NotificationRequest> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn permission(&self) -> Permission {
        *self.permission.lock().unwrap()
    }

    async fn request_permission(&self) -> Permission {
        let mut permission = self.permission.lock().unwrap();
        if *permission == Permission::Default {
            *permission = Permission::Granted;
        }
        *permission
    }

    async fn show(&self, request: &NotificationRequest) -> anyhow::Result<()> {
        self.shown.lock().unwrap().push(request.clone());
        Ok(())
    }
}

pub struct RecordingWorker {
    pub active: bool,
    pub fail: bool,
    pub posted: Mutex<Vec<NotificationRequest>>,
}

impl RecordingWorker {
    pub fn new(active: bool, fail: bool) -> Arc<Self> {
        Arc::new(Self {
            active,
            fail,
            posted: Mutex::new(Vec::new()),
        })
    }

    pub fn posted(&self) -> Vec<NotificationRequest> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ServiceWorkerBridge for RecordingWorker {
    fn is_active(&self) -> bool {
        self.active
    }

    async fn post_notification(&self, request: &NotificationRequest) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("worker went away");
        }
        self.posted.lock().unwrap().push(request.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    pub opened: Mutex<Vec<ConversationId>>,
}

impl Navigator for RecordingNavigator {
    fn open_conversation(&self, conversation: &ConversationId) {
        self.opened.lock().unwrap().push(conversation.clone());
    }
}
