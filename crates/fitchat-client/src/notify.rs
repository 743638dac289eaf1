//! Platform notification delivery.
//!
//! The dispatcher talks to the platform through [`NotificationChannel`]
//! (direct display) and, when present, a [`ServiceWorkerBridge`] (display
//! issued by a background worker, mandatory on some home-screen installs).
//! Clicks come back as [`NotificationData`] and are turned into navigation
//! through a [`Navigator`].

use async_trait::async_trait;
use fitchat_shared::ConversationId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
    /// Not asked yet.
    Default,
    /// The platform has no notification support.
    Unsupported,
}

/// Payload carried by a notification and handed back on click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    pub conversation: ConversationId,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    pub icon: String,
    /// Notifications sharing a tag replace each other.
    pub tag: String,
    pub data: NotificationData,
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn permission(&self) -> Permission;

    async fn request_permission(&self) -> Permission;

    async fn show(&self, request: &NotificationRequest) -> anyhow::Result<()>;
}

#[async_trait]
pub trait ServiceWorkerBridge: Send + Sync {
    /// Whether a worker currently controls the app.
    fn is_active(&self) -> bool;

    async fn post_notification(&self, request: &NotificationRequest) -> anyhow::Result<()>;
}

/// In-app navigation triggered by notification clicks.
pub trait Navigator: Send + Sync {
    fn open_conversation(&self, conversation: &ConversationId);
}

/// Route of the chat view for a conversation.
pub fn conversation_url(conversation: &ConversationId) -> String {
    format!("/challenges/{conversation}/chat")
}

/// Channel that reports notifications through `tracing`. Used by the
/// headless daemon.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationChannel;

#[async_trait]
impl NotificationChannel for LogNotificationChannel {
    fn permission(&self) -> Permission {
        Permission::Granted
    }

    async fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    async fn show(&self, request: &NotificationRequest) -> anyhow::Result<()> {
        tracing::info!(
            title = %request.title,
            body = %request.body,
            conversation = %request.data.conversation,
            "notification"
        );
        Ok(())
    }
}
