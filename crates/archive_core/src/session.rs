//! crates/archive_core/src/session.rs
//!
//! The application-session context. It is created empty, filled at sign-in,
//! emptied at sign-out, and handed to whoever needs the current identity.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::ports::{IdentityProvider, PortError, PortResult};

/// A signed-in user as seen by this client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSession {
    pub user_id: Uuid,
    pub token: String,
    pub started_at: DateTime<Utc>,
}

impl AppSession {
    pub fn new(user_id: Uuid, token: impl Into<String>) -> Self {
        Self {
            user_id,
            token: token.into(),
            started_at: Utc::now(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionContext {
    current: RwLock<Option<AppSession>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that is already signed in, e.g. for a single request.
    pub fn signed_in(session: AppSession) -> Self {
        Self {
            current: RwLock::new(Some(session)),
        }
    }

    /// Replaces any existing session.
    pub fn sign_in(&self, session: AppSession) {
        info!("Session started for user {}", session.user_id);
        *self.write() = Some(session);
    }

    /// Tears the session down and returns it, if there was one.
    pub fn sign_out(&self) -> Option<AppSession> {
        let ended = self.write().take();
        if let Some(session) = &ended {
            info!("Session ended for user {}", session.user_id);
        }
        ended
    }

    pub fn current(&self) -> Option<AppSession> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<AppSession>> {
        self.current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl IdentityProvider for SessionContext {
    fn current_user_id(&self) -> PortResult<Uuid> {
        self.current()
            .map(|s| s.user_id)
            .ok_or(PortError::Unauthorized)
    }
}
