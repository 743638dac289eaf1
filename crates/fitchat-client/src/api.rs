//! Remote chat REST API.
//!
//! `GET  /conversations/{id}/messages` returns the full, ascending message list.
//! `POST /conversations/{id}/messages` stores a draft and returns the
//! server-confirmed message.

use async_trait::async_trait;
use fitchat_shared::message::sort_chronologically;
use fitchat_shared::{ConversationId, Message, MessageDraft};

use crate::error::ApiError;

#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn list_messages(
        &self,
        conversation: &ConversationId,
        token: &str,
    ) -> Result<Vec<Message>, ApiError>;

    async fn post_message(
        &self,
        conversation: &ConversationId,
        draft: &MessageDraft,
        token: &str,
    ) -> Result<Message, ApiError>;
}

/// [`ChatApi`] over HTTPS with bearer authentication.
#[derive(Debug, Clone)]
pub struct HttpChatApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChatApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn messages_url(&self, conversation: &ConversationId) -> String {
        format!("{}/conversations/{}/messages", self.base_url, conversation)
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn list_messages(
        &self,
        conversation: &ConversationId,
        token: &str,
    ) -> Result<Vec<Message>, ApiError> {
        let resp = self
            .client
            .get(self.messages_url(conversation))
            .bearer_auth(token)
            .send()
            .await?;
        let resp = check_status(resp).await?;

        let mut messages: Vec<Message> = resp
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        sort_chronologically(&mut messages);

        tracing::debug!(conversation = %conversation, count = messages.len(), "fetched messages");
        Ok(messages)
    }

    async fn post_message(
        &self,
        conversation: &ConversationId,
        draft: &MessageDraft,
        token: &str,
    ) -> Result<Message, ApiError> {
        let resp = self
            .client
            .post(self.messages_url(conversation))
            .bearer_auth(token)
            .json(draft)
            .send()
            .await?;
        let resp = check_status(resp).await?;

        let message: Message = resp
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        tracing::debug!(conversation = %conversation, id = ?message.id, "message confirmed");
        Ok(message)
    }
}
