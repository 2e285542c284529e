//! services/api/src/web/state.rs
//!
//! Defines the shared application state handed to every handler.

use crate::config::Config;
use archive_core::gateway::Gateway;
use archive_core::ports::{ArchiveStore, SessionDirectory};
use archive_core::session::{AppSession, SessionContext};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ArchiveStore>,
    pub sessions: Arc<dyn SessionDirectory>,
    pub config: Arc<Config>,
}

impl AppState {
    /// A gateway scoped to the caller of the current request.
    pub fn gateway_for(&self, session: AppSession) -> Gateway {
        Gateway::new(
            self.store.clone(),
            Arc::new(SessionContext::signed_in(session)),
        )
    }
}
