//! Notification preferences, persisted on every change.

use fitchat_shared::Preferences;

use crate::error::Result;
use crate::keys::PREFERENCES_KEY;
use crate::store::ChatStore;

impl ChatStore {
    /// Stored preferences, or the defaults when none (or garbage) is stored.
    pub fn preferences(&self) -> Preferences {
        match self.kv().get(PREFERENCES_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::debug!(error = %e, "ignoring corrupt notification preferences");
                Preferences::default()
            }),
            _ => Preferences::default(),
        }
    }

    pub fn set_preferences(&self, prefs: &Preferences) -> Result<()> {
        let json = serde_json::to_string(prefs)?;
        self.kv().set(PREFERENCES_KEY, &json)?;
        tracing::info!(
            push = prefs.push_notifications,
            interval_ms = prefs.check_interval_ms,
            badge = prefs.show_unread_badge,
            "notification preferences updated"
        );
        Ok(())
    }

    /// Read, modify and persist in one step.
    pub fn update_preferences(&self, update: impl FnOnce(&mut Preferences)) -> Result<Preferences> {
        let mut prefs = self.preferences();
        update(&mut prefs);
        self.set_preferences(&prefs)?;
        Ok(prefs)
    }
}
