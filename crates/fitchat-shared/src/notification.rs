use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{CHECK_INTERVAL_PRESETS_MS, DEFAULT_CHECK_INTERVAL_MS};
use crate::types::ConversationId;

/// What produced a notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Plain message from another participant.
    Message,
    /// Bot announcement (reminders, daily updates).
    Bot,
    /// Achievement or event card.
    Card,
}

/// In-memory record backing the unread indicator and notification list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub challenge_id: ConversationId,
    pub is_read: bool,
}

/// User-tunable notification settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub push_notifications: bool,
    pub check_interval_ms: u64,
    pub show_unread_badge: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            push_notifications: true,
            check_interval_ms: DEFAULT_CHECK_INTERVAL_MS,
            show_unread_badge: true,
        }
    }
}

impl Preferences {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    /// Snap an arbitrary interval to the closest preset offered in settings.
    /// Used by the settings screen; the preference store accepts any value.
    pub fn clamp_interval(ms: u64) -> u64 {
        CHECK_INTERVAL_PRESETS_MS
            .iter()
            .copied()
            .min_by_key(|preset| preset.abs_diff(ms))
            .unwrap_or(DEFAULT_CHECK_INTERVAL_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let prefs = Preferences::default();
        assert!(prefs.push_notifications);
        assert!(prefs.show_unread_badge);
        assert_eq!(prefs.check_interval(), Duration::from_secs(30));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let prefs: Preferences = serde_json::from_str(r#"{"pushNotifications": false}"#).unwrap();
        assert!(!prefs.push_notifications);
        assert_eq!(prefs.check_interval_ms, DEFAULT_CHECK_INTERVAL_MS);
    }

    #[test]
    fn clamp_picks_nearest_preset() {
        assert_eq!(Preferences::clamp_interval(1_000), 15_000);
        assert_eq!(Preferences::clamp_interval(50_000), 60_000);
        assert_eq!(Preferences::clamp_interval(10_000_000), 300_000);
    }
}
