//! Client configuration loaded from environment variables.
//!
//! Everything except the API base URL has a default, so a daemon can start
//! with `FITCHAT_API_URL` alone and sign in later.

use std::path::PathBuf;

use fitchat_shared::{ConversationId, PlatformProfile, Session, UserIdentity};
use fitchat_store::StoreLimits;

use crate::error::{ClientError, Result};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the chat REST API.
    /// Env: `FITCHAT_API_URL` (required)
    pub api_url: String,

    /// Bearer token of the signed-in user.
    /// Env: `FITCHAT_TOKEN`
    /// Default: none (signed out).
    pub token: Option<String>,

    /// Env: `FITCHAT_USER_ID`, `FITCHAT_DISPLAY_NAME`, `FITCHAT_EMAIL`
    pub identity: UserIdentity,

    /// Conversation to watch on startup.
    /// Env: `FITCHAT_CONVERSATION`
    pub conversation: Option<ConversationId>,

    /// Env: `FITCHAT_PLATFORM` (`desktop` or `constrained`)
    /// Default: `desktop`
    pub platform: PlatformProfile,

    /// SQLite file backing the store.
    /// Env: `FITCHAT_DB_PATH`
    /// Default: the platform data directory.
    pub db_path: Option<PathBuf>,

    /// Emulated capacity of the whole store in bytes.
    /// Env: `FITCHAT_STORE_QUOTA_BYTES`
    /// Default: none (only the disk limits writes).
    pub store_quota_bytes: Option<usize>,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_url = var("FITCHAT_API_URL")
            .ok_or_else(|| ClientError::Config("FITCHAT_API_URL is not set".into()))?;

        let conversation = match var("FITCHAT_CONVERSATION") {
            Some(raw) => Some(
                raw.parse::<ConversationId>()
                    .map_err(|e| ClientError::Config(e.to_string()))?,
            ),
            None => None,
        };

        let platform = match var("FITCHAT_PLATFORM") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Invalid FITCHAT_PLATFORM, using desktop");
                PlatformProfile::Desktop
            }),
            None => PlatformProfile::Desktop,
        };

        let store_quota_bytes = var("FITCHAT_STORE_QUOTA_BYTES").and_then(|raw| match raw.parse() {
            Ok(n) => Some(n),
            Err(_) => {
                tracing::warn!(value = %raw, "Invalid FITCHAT_STORE_QUOTA_BYTES, ignoring");
                None
            }
        });

        Ok(Self {
            api_url,
            token: var("FITCHAT_TOKEN"),
            identity: UserIdentity {
                user_id: var("FITCHAT_USER_ID"),
                display_name: var("FITCHAT_DISPLAY_NAME"),
                email: var("FITCHAT_EMAIL"),
            },
            conversation,
            platform,
            db_path: var("FITCHAT_DB_PATH").map(PathBuf::from),
            store_quota_bytes,
        })
    }

    /// Session built from the configured token, if any.
    pub fn session(&self) -> Option<Session> {
        self.token.as_ref().map(|token| Session {
            identity: self.identity.clone(),
            token: token.clone(),
        })
    }

    pub fn limits(&self) -> StoreLimits {
        StoreLimits {
            store_budget_bytes: self.store_quota_bytes,
            ..StoreLimits::for_platform(self.platform)
        }
    }
}
