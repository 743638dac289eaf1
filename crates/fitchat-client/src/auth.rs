//! Source of the current user and their bearer token.

use std::sync::RwLock;

use fitchat_shared::Session;

/// Supplies the current session. `None` is a normal state (signed out,
/// token not loaded yet) and must not be treated as an error by pollers.
pub trait AuthContext: Send + Sync {
    fn session(&self) -> Option<Session>;
}

/// Session held in memory and swapped on sign-in / sign-out.
#[derive(Debug, Default)]
pub struct StaticAuth {
    session: RwLock<Option<Session>>,
}

impl StaticAuth {
    pub fn new(session: Option<Session>) -> Self {
        Self {
            session: RwLock::new(session),
        }
    }

    pub fn sign_in(&self, session: Session) {
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = Some(session);
    }

    pub fn sign_out(&self) {
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl AuthContext for StaticAuth {
    fn session(&self) -> Option<Session> {
        self.session.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
