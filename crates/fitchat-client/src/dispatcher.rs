//! Turns detected messages into notifications.
//!
//! Rules, in order: skip the user's own messages, skip messages already
//! notified about, derive a title and body (some messages produce none),
//! record the notification for the in-app list, then deliver it through the
//! platform if push is enabled.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use fitchat_shared::constants::{
    APP_NAME, DEDUP_CAPACITY, DEDUP_TEXT_PREFIX, MAX_NOTIFICATION_RECORDS, NOTIFICATION_EXPIRY,
    NOTIFICATION_ICON,
};
use fitchat_shared::{
    Clock, ConversationId, Message, MessageType, NotificationKind, NotificationRecord,
    PlatformProfile, Preferences, UserIdentity,
};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::dedup::DedupSet;
use crate::notify::{
    conversation_url, Navigator, NotificationChannel, NotificationData, NotificationRequest,
    Permission, ServiceWorkerBridge,
};

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub app_name: String,
    pub dedup_capacity: usize,
    pub max_records: usize,
    pub record_expiry: Duration,
    /// Notifications must come from the service worker; never fall back to
    /// direct display.
    pub worker_only: bool,
}

impl DispatcherConfig {
    pub fn for_platform(profile: PlatformProfile) -> Self {
        Self {
            worker_only: profile == PlatformProfile::Constrained,
            ..Self::default()
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            dedup_capacity: DEDUP_CAPACITY,
            max_records: MAX_NOTIFICATION_RECORDS,
            record_expiry: NOTIFICATION_EXPIRY,
            worker_only: false,
        }
    }
}

/// How a recorded notification reached (or did not reach) the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    ServiceWorker,
    Direct,
    /// Push is turned off in preferences.
    Disabled,
    /// No permission, no support, or the platform call failed.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    SelfAuthored,
    Duplicate,
    /// The message does not warrant a notification (e.g. someone left).
    Suppressed,
    Recorded {
        record: NotificationRecord,
        delivery: Delivery,
    },
}

pub struct NotificationDispatcher {
    config: DispatcherConfig,
    channel: Arc<dyn NotificationChannel>,
    worker: Option<Arc<dyn ServiceWorkerBridge>>,
    navigator: Option<Arc<dyn Navigator>>,
    clock: Arc<dyn Clock>,
    dedup: DedupSet,
    records: VecDeque<NotificationRecord>,
    unread: usize,
}

impl NotificationDispatcher {
    pub fn new(
        config: DispatcherConfig,
        channel: Arc<dyn NotificationChannel>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let dedup = DedupSet::new(config.dedup_capacity);
        Self {
            config,
            channel,
            worker: None,
            navigator: None,
            clock,
            dedup,
            records: VecDeque::new(),
            unread: 0,
        }
    }

    pub fn with_service_worker(mut self, worker: Arc<dyn ServiceWorkerBridge>) -> Self {
        self.worker = Some(worker);
        self
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub async fn dispatch(
        &mut self,
        conversation: &ConversationId,
        message: &Message,
        me: &UserIdentity,
        prefs: &Preferences,
    ) -> DispatchOutcome {
        if is_own_message(message, me) {
            trace!(conversation = %conversation, "skipping own message");
            return DispatchOutcome::SelfAuthored;
        }

        if !self.dedup.insert(dedup_key(message)) {
            trace!(conversation = %conversation, "already notified");
            return DispatchOutcome::Duplicate;
        }

        let Some((kind, body)) = describe(message) else {
            debug!(conversation = %conversation, "message does not warrant a notification");
            return DispatchOutcome::Suppressed;
        };

        let title = if message.is_bot {
            self.config.app_name.clone()
        } else {
            message.sender.clone()
        };

        let record = NotificationRecord {
            id: Uuid::new_v4().to_string(),
            kind,
            title,
            message: body,
            timestamp: self.clock.now(),
            challenge_id: conversation.clone(),
            is_read: false,
        };
        self.prune_expired();
        self.records.push_front(record.clone());
        self.records.truncate(self.config.max_records);
        self.unread += 1;

        let delivery = if prefs.push_notifications {
            self.deliver(&record).await
        } else {
            Delivery::Disabled
        };

        debug!(
            conversation = %conversation,
            title = %record.title,
            ?delivery,
            unread = self.unread,
            "notification recorded"
        );
        DispatchOutcome::Recorded { record, delivery }
    }

    async fn deliver(&self, record: &NotificationRecord) -> Delivery {
        let request = NotificationRequest {
            title: record.title.clone(),
            body: record.message.clone(),
            icon: NOTIFICATION_ICON.to_string(),
            tag: format!("chat-{}", record.challenge_id),
            data: NotificationData {
                conversation: record.challenge_id.clone(),
                url: conversation_url(&record.challenge_id),
            },
        };

        if let Some(worker) = self.worker.as_ref().filter(|w| w.is_active()) {
            match worker.post_notification(&request).await {
                Ok(()) => return Delivery::ServiceWorker,
                Err(e) => debug!(error = %e, "service worker delivery failed"),
            }
        }

        if self.config.worker_only {
            return Delivery::Unavailable;
        }

        if self.channel.permission() != Permission::Granted {
            return Delivery::Unavailable;
        }

        match self.channel.show(&request).await {
            Ok(()) => Delivery::Direct,
            Err(e) => {
                debug!(error = %e, "notification display failed");
                Delivery::Unavailable
            }
        }
    }

    /// Ask the platform for permission if it has not been asked yet.
    pub async fn ensure_permission(&self) -> Permission {
        match self.channel.permission() {
            Permission::Default => self.channel.request_permission().await,
            other => other,
        }
    }

    /// The user is looking at the latest messages: everything is read.
    pub fn mark_read(&mut self) {
        self.unread = 0;
        for record in &mut self.records {
            record.is_read = true;
        }
        self.dedup.clear();
    }

    /// Forget per-conversation state when another conversation is selected.
    pub fn reset(&mut self) {
        self.dedup.clear();
    }

    pub fn prune_expired(&mut self) {
        let now = self.clock.now();
        let expiry = self.config.record_expiry;
        let before = self.records.len();
        self.records.retain(|r| {
            (now - r.timestamp)
                .to_std()
                .map(|age| age <= expiry)
                .unwrap_or(true)
        });

        let expired = before - self.records.len();
        if expired > 0 {
            self.unread = self.records.iter().filter(|r| !r.is_read).count();
            trace!(expired, "pruned expired notifications");
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &NotificationRecord> {
        self.records.iter()
    }

    pub fn unread_count(&self) -> usize {
        self.unread
    }

    /// Badge value, honouring the badge preference.
    pub fn badge_count(&self, prefs: &Preferences) -> usize {
        if prefs.show_unread_badge {
            self.unread
        } else {
            0
        }
    }

    /// A notification was clicked: open its conversation.
    pub fn handle_click(&self, data: &NotificationData) {
        match &self.navigator {
            Some(navigator) => navigator.open_conversation(&data.conversation),
            None => debug!(url = %data.url, "notification clicked without a navigator"),
        }
    }
}

/// Whether `message` was written by the current user: by user id when both
/// sides have one, otherwise by display name, otherwise by email.
pub fn is_own_message(message: &Message, me: &UserIdentity) -> bool {
    if message.is_bot {
        return false;
    }

    if let (Some(mine), Some(theirs)) = (&me.user_id, &message.user_id) {
        return mine == theirs;
    }

    if let Some(name) = me.display_name.as_deref().filter(|n| !n.is_empty()) {
        if name == message.sender {
            return true;
        }
    }

    match me.email.as_deref().filter(|e| !e.is_empty()) {
        Some(email) => {
            email.eq_ignore_ascii_case(&message.sender)
                || message
                    .user_id
                    .as_deref()
                    .is_some_and(|id| id.eq_ignore_ascii_case(email))
        }
        None => false,
    }
}

/// Message id, or a composite of timestamp, sender, text prefix and author.
pub fn dedup_key(message: &Message) -> String {
    if let Some(id) = &message.id {
        return id.clone();
    }
    let prefix: String = message.message.chars().take(DEDUP_TEXT_PREFIX).collect();
    format!(
        "{}|{}|{}|{}",
        message.timestamp.timestamp_millis(),
        message.sender,
        prefix,
        message.user_id.as_deref().unwrap_or_default()
    )
}

/// Notification kind and body for a message, `None` when it should not
/// notify at all.
pub fn describe(message: &Message) -> Option<(NotificationKind, String)> {
    let text = message.message.to_lowercase();
    if text.contains("has left") || text.contains("left the challenge") {
        return None;
    }

    if message.message_type.is_card() {
        let name = message
            .card_data
            .as_ref()
            .and_then(|c| c.user_name.clone())
            .unwrap_or_else(|| message.sender.clone());
        let body = match message.message_type {
            MessageType::StepGoalCard => format!("{name} earned a step point!"),
            MessageType::WeightLossCard => format!("{name} reached a weight-loss milestone!"),
            MessageType::WelcomeCard => format!("{name} joined the challenge!"),
            MessageType::DailyRecapCard => "The daily step leaderboard is in!".to_string(),
            _ => "New activity in your challenge".to_string(),
        };
        return Some((NotificationKind::Card, body));
    }

    if message.is_bot {
        let body = if text.contains("weigh-in") || text.contains("weigh in") {
            "Time for your weigh-in! Log your weight to stay on track."
        } else if text.contains("daily step") || text.contains("step update") {
            "Your daily step update is here!"
        } else {
            "New message in your challenge"
        };
        return Some((NotificationKind::Bot, body.to_string()));
    }

    let body = message.message.trim();
    if body.is_empty() {
        return Some((NotificationKind::Message, "New message".to_string()));
    }
    Some((NotificationKind::Message, body.to_string()))
}
