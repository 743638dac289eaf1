//! Chat message model, shared by the cache, the outbox and the remote API.
//!
//! The JSON shape matches the chat backend (`camelCase` keys, ISO-8601
//! timestamps), so the same struct is used for the wire and for storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::TEMP_ID_PREFIX;

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// Kind of chat entry. Anything other than `Text` is rendered as a card.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    /// A participant reached their daily step goal.
    StepGoalCard,
    /// A participant logged a weight-loss milestone.
    WeightLossCard,
    /// A participant joined the challenge.
    WelcomeCard,
    /// Daily leaderboard recap posted by the bot.
    DailyRecapCard,
    /// Card kinds introduced by newer backends.
    #[serde(other)]
    UnknownCard,
}

impl MessageType {
    pub fn is_card(self) -> bool {
        !matches!(self, Self::Text)
    }
}

// ---------------------------------------------------------------------------
// CardData
// ---------------------------------------------------------------------------

/// Structured payload attached to card messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CardData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_lost: Option<f64>,
    /// Fields this client does not interpret are kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single chat entry in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Server-assigned id. `None` for optimistic entries that were never
    /// confirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Client-generated id of an optimistic entry, used to swap it for the
    /// server-confirmed copy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<String>,
    /// Display name of the author (or the bot name).
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Message text, may contain inline links.
    #[serde(default)]
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_data: Option<CardData>,
}

impl Message {
    /// Build an optimistic message from a draft, stamped with `now` and a
    /// fresh temporary id.
    pub fn optimistic(draft: &MessageDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            temp_id: Some(format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4())),
            sender: draft.sender.clone(),
            user_id: draft.user_id.clone(),
            message: draft.message.clone(),
            timestamp: now,
            is_bot: draft.is_bot,
            message_type: draft.message_type,
            card_data: draft.card_data.clone(),
        }
    }

    /// `true` while the entry has not been confirmed by the server.
    pub fn is_pending(&self) -> bool {
        self.id.is_none() && self.temp_id.is_some()
    }

    /// The request body that (re)sends this message.
    pub fn to_draft(&self) -> MessageDraft {
        MessageDraft {
            sender: self.sender.clone(),
            user_id: self.user_id.clone(),
            message: self.message.clone(),
            is_bot: self.is_bot,
            message_type: self.message_type,
            card_data: self.card_data.clone(),
        }
    }
}

/// Sort a message list ascending by timestamp. Stable, so entries sharing a
/// timestamp keep their relative order.
pub fn sort_chronologically(messages: &mut [Message]) {
    messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
}

// ---------------------------------------------------------------------------
// MessageDraft
// ---------------------------------------------------------------------------

/// Body of `POST /conversations/{id}/messages`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageDraft {
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub message: String,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_data: Option<CardData>,
}

impl MessageDraft {
    pub fn text(sender: impl Into<String>, user_id: Option<String>, message: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            user_id,
            message: message.into(),
            ..Self::default()
        }
    }
}
