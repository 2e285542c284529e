//! crates/archive_core/src/filter.rs
//!
//! Filter/query state for the card list, and the trailing debouncer that sits
//! between the search box and the applied search.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::{CardQuery, SortKey, SortOrder};

/// Quiet period after the last keystroke before a search is applied.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

//=========================================================================================
// FilterState
//=========================================================================================

/// Every setter returns `true` only when the value actually changed, which
/// is the caller's cue to restart pagination.
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    /// What is in the search box right now.
    typed_search: String,
    /// What the last request was sent with.
    query: CardQuery,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &CardQuery {
        &self.query
    }

    pub fn typed_search(&self) -> &str {
        &self.typed_search
    }

    /// Records raw input. Does not touch the applied query.
    pub fn type_search(&mut self, text: &str) {
        self.typed_search = text.to_string();
    }

    /// Commits a search term. Blank input clears the search.
    pub fn apply_search(&mut self, text: &str) -> bool {
        let trimmed = text.trim();
        let search = (!trimmed.is_empty()).then(|| trimmed.to_string());
        replace(&mut self.query.search, search)
    }

    pub fn set_is_read(&mut self, is_read: Option<bool>) -> bool {
        replace(&mut self.query.is_read, is_read)
    }

    pub fn set_is_favorite(&mut self, is_favorite: Option<bool>) -> bool {
        replace(&mut self.query.is_favorite, is_favorite)
    }

    pub fn set_sort_by(&mut self, sort_by: SortKey) -> bool {
        replace(&mut self.query.sort_by, sort_by)
    }

    pub fn set_sort_order(&mut self, sort_order: SortOrder) -> bool {
        replace(&mut self.query.sort_order, sort_order)
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

//=========================================================================================
// SearchDebouncer
//=========================================================================================

/// A cancel-on-reschedule trailing timer. Each `schedule` call cancels the
/// pending one; only a value left alone for the full delay is delivered on
/// the receiver returned by `new`.
pub struct SearchDebouncer {
    delay: Duration,
    pending: Option<CancellationToken>,
    tx: mpsc::UnboundedSender<String>,
}

impl SearchDebouncer {
    /// Must be called inside a tokio runtime; `schedule` spawns onto it.
    pub fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let debouncer = Self {
            delay,
            pending: None,
            tx,
        };
        (debouncer, rx)
    }

    pub fn schedule(&mut self, text: String) {
        self.cancel();

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let tx = self.tx.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    debug!("Search settled on {:?}", text);
                    // The receiver going away just means nobody is listening.
                    let _ = tx.send(text);
                }
            }
        });
        self.pending = Some(token);
    }

    /// Drops the pending value, if any.
    pub fn cancel(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }
}

impl Drop for SearchDebouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
