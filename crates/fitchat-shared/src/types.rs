use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SharedError;

// A conversation is the chat thread of one challenge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Result<Self, SharedError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
            return Err(SharedError::InvalidConversationId(id));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ConversationId {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who the current user is, as far as the authentication provider knows.
///
/// Any of the fields may be missing; self-authorship checks fall back from
/// user id to display name to email.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub user_id: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

/// An authenticated session: identity plus the bearer token for the chat API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub identity: UserIdentity,
    pub token: String,
}

/// Install flavour of the app. Constrained installs (home-screen web apps on
/// mobile) get tighter storage budgets and route notifications through the
/// service worker.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlatformProfile {
    #[default]
    Desktop,
    Constrained,
}

impl FromStr for PlatformProfile {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "desktop" => Ok(Self::Desktop),
            "constrained" | "mobile" | "ios" => Ok(Self::Constrained),
            other => Err(SharedError::UnknownPlatform(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_id_is_trimmed() {
        let id = ConversationId::new("  challenge-42 ").unwrap();
        assert_eq!(id.as_str(), "challenge-42");
        assert_eq!(id.to_string(), "challenge-42");
    }

    #[test]
    fn conversation_id_rejects_blank_and_spaces() {
        assert!(ConversationId::new("").is_err());
        assert!(ConversationId::new("   ").is_err());
        assert!(ConversationId::new("two words").is_err());
    }

    #[test]
    fn platform_profile_parses_aliases() {
        assert_eq!("Desktop".parse::<PlatformProfile>().unwrap(), PlatformProfile::Desktop);
        assert_eq!("ios".parse::<PlatformProfile>().unwrap(), PlatformProfile::Constrained);
        assert!("toaster".parse::<PlatformProfile>().is_err());
    }

    #[test]
    fn parse_errors_name_the_bad_input() {
        let err = "two words".parse::<ConversationId>().unwrap_err();
        assert!(matches!(err, SharedError::InvalidConversationId(_)));
        assert_eq!(err.to_string(), "Invalid conversation id: \"two words\"");

        let err = "toaster".parse::<PlatformProfile>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown platform profile: toaster");
    }
}
