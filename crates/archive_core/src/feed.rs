//! crates/archive_core/src/feed.rs
//!
//! The card feed: the visible list accumulated across page fetches, plus the
//! unfiltered statistics list fetched once at mount.
//!
//! Fetches are split into `begin_*` and `finish_*` halves. `begin_*` updates
//! the paging state synchronously and hands out a `FetchTicket`; `finish_*`
//! applies a response only if its ticket is still the current one. A newer
//! full replace therefore always wins over a slower older replace and over
//! any append that was in flight when it started.

use std::collections::HashSet;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{Card, CardPage, CardQuery};
use crate::gateway::Envelope;
use crate::reconcile::{reconcile_filtered, reconcile_stats, CardEvent};

/// Page size of the main list.
pub const PAGE_SIZE: u32 = 10;
/// Page size used to pull the whole collection for statistics.
pub const STATS_LIMIT: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedSettings {
    pub page_size: u32,
    pub stats_limit: u32,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            stats_limit: STATS_LIMIT,
        }
    }
}

/// Why a fetch was started. The UI shows a different indicator for each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// First load after mount.
    Initial,
    /// Reload after a filter or search change.
    Search,
    /// "Load more".
    Append,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadingFlags {
    pub initial: bool,
    pub searching: bool,
    pub appending: bool,
}

impl LoadingFlags {
    fn set(&mut self, mode: FetchMode, value: bool) {
        match mode {
            FetchMode::Initial => self.initial = value,
            FetchMode::Search => self.searching = value,
            FetchMode::Append => self.appending = value,
        }
    }

    pub fn any(&self) -> bool {
        self.initial || self.searching || self.appending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    seq: u64,
    pub mode: FetchMode,
    pub page: u32,
}

#[derive(Debug, Default)]
pub struct CardFeed {
    settings: FeedSettings,
    cards: Vec<Card>,
    current_page: u32,
    has_more: bool,
    loading: LoadingFlags,
    error: Option<String>,
    stats: Vec<Card>,
    stats_loaded: bool,
    next_seq: u64,
    /// Ticket of the newest replace; older replace responses are dropped.
    live_replace: Option<u64>,
    /// Ticket of the append in flight, if any.
    live_append: Option<u64>,
}

impl CardFeed {
    pub fn new(settings: FeedSettings) -> Self {
        Self {
            settings,
            current_page: 1,
            has_more: true,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> FeedSettings {
        self.settings
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn stats(&self) -> &[Card] {
        &self.stats
    }

    pub fn stats_loaded(&self) -> bool {
        self.stats_loaded
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn loading(&self) -> LoadingFlags {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn find(&self, card_id: Uuid) -> Option<&Card> {
        self.cards
            .iter()
            .chain(self.stats.iter())
            .find(|c| c.id == card_id)
    }

    fn ticket(&mut self, mode: FetchMode, page: u32) -> FetchTicket {
        self.next_seq += 1;
        FetchTicket {
            seq: self.next_seq,
            mode,
            page,
        }
    }

    //=====================================================================================
    // Full replace
    //=====================================================================================

    /// Starts a page-1 fetch for new filters. Paging resets immediately and
    /// any append in flight is orphaned.
    pub fn begin_replace(&mut self, mode: FetchMode) -> FetchTicket {
        let mode = match mode {
            FetchMode::Append => FetchMode::Search,
            other => other,
        };
        let ticket = self.ticket(mode, 1);
        self.current_page = 1;
        self.has_more = true;
        self.live_replace = Some(ticket.seq);
        self.live_append = None;
        self.loading.appending = false;
        self.loading.set(mode, true);
        ticket
    }

    /// Returns `false` when the response was stale and ignored.
    pub fn finish_replace(&mut self, ticket: FetchTicket, response: Envelope<CardPage>) -> bool {
        if self.live_replace != Some(ticket.seq) {
            debug!("Dropping stale replace response (ticket {})", ticket.seq);
            return false;
        }
        self.live_replace = None;
        self.loading.initial = false;
        self.loading.searching = false;

        if response.success {
            self.cards = response.data.cards;
            self.current_page = 1;
            self.has_more = response.data.pagination.has_more();
            self.error = None;
        } else {
            warn!("Card list reload failed: {:?}", response.error);
            self.cards.clear();
            self.has_more = false;
            self.error = Some(failure_message(response.error));
        }
        true
    }

    //=====================================================================================
    // Append
    //=====================================================================================

    /// Starts a fetch of the next page, unless one is already running, a
    /// replace is pending, or the server said there is nothing left.
    pub fn begin_append(&mut self) -> Option<FetchTicket> {
        if self.loading.any() || !self.has_more {
            return None;
        }
        let ticket = self.ticket(FetchMode::Append, self.current_page + 1);
        self.live_append = Some(ticket.seq);
        self.loading.appending = true;
        Some(ticket)
    }

    /// Merges the page, skipping ids already shown. Returns `false` when the
    /// response was stale and ignored.
    pub fn finish_append(&mut self, ticket: FetchTicket, response: Envelope<CardPage>) -> bool {
        if self.live_append != Some(ticket.seq) {
            debug!("Dropping stale append response (ticket {})", ticket.seq);
            return false;
        }
        self.live_append = None;
        self.loading.appending = false;

        if response.success {
            let CardPage { cards, pagination } = response.data;
            merge_unique(&mut self.cards, cards);
            self.current_page = ticket.page;
            self.has_more = pagination.has_more();
            self.error = None;
        } else {
            warn!("Loading page {} failed: {:?}", ticket.page, response.error);
            self.error = Some(failure_message(response.error));
        }
        true
    }

    //=====================================================================================
    // Statistics
    //=====================================================================================

    pub fn apply_stats(&mut self, response: Envelope<CardPage>) {
        if response.success {
            self.stats = response.data.cards;
            self.stats_loaded = true;
        } else {
            warn!("Statistics fetch failed: {:?}", response.error);
        }
    }

    //=====================================================================================
    // Mutations
    //=====================================================================================

    /// Folds a mutation into both lists without refetching.
    pub fn apply(&mut self, event: &CardEvent, query: &CardQuery) {
        let cards = std::mem::take(&mut self.cards);
        self.cards = reconcile_filtered(cards, event, query);
        let stats = std::mem::take(&mut self.stats);
        self.stats = reconcile_stats(stats, event);
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }
}

fn merge_unique(into: &mut Vec<Card>, incoming: Vec<Card>) {
    let mut seen: HashSet<Uuid> = into.iter().map(|c| c.id).collect();
    into.extend(incoming.into_iter().filter(|c| seen.insert(c.id)));
}

fn failure_message(error: Option<String>) -> String {
    error.unwrap_or_else(|| "Failed to load cards".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{cards, ids, page};

    fn feed() -> CardFeed {
        CardFeed::new(FeedSettings::default())
    }

    #[test]
    fn three_pages_of_twenty_five_cards() {
        let all = cards(25);
        let mut feed = feed();

        let t = feed.begin_replace(FetchMode::Initial);
        assert!(feed.loading().initial);
        feed.finish_replace(t, page(all[..10].to_vec(), 1, 10, 25));
        assert!(feed.has_more());
        assert!(!feed.loading().any());

        let t = feed.begin_append().expect("page 2");
        assert_eq!(t.page, 2);
        assert!(feed.loading().appending);
        feed.finish_append(t, page(all[10..20].to_vec(), 2, 10, 25));
        assert!(feed.has_more());

        let t = feed.begin_append().expect("page 3");
        feed.finish_append(t, page(all[20..].to_vec(), 3, 10, 25));
        assert!(!feed.has_more());
        assert_eq!(feed.current_page(), 3);
        assert_eq!(ids(feed.cards()), ids(&all));
        assert!(feed.begin_append().is_none());
    }

    #[test]
    fn overlapping_pages_never_duplicate_cards() {
        let all = cards(15);
        let mut feed = feed();
        let t = feed.begin_replace(FetchMode::Initial);
        feed.finish_replace(t, page(all[..10].to_vec(), 1, 10, 30));

        // The backend shifted: page 2 repeats the tail of page 1.
        let t = feed.begin_append().unwrap();
        feed.finish_append(t, page(all[5..15].to_vec(), 2, 10, 30));
        let t = feed.begin_append().unwrap();
        feed.finish_append(t, page(all[..15].to_vec(), 3, 10, 30));

        let unique: HashSet<Uuid> = ids(feed.cards()).into_iter().collect();
        assert_eq!(unique.len(), feed.cards().len());
        assert_eq!(ids(feed.cards()), ids(&all));
    }

    #[test]
    fn filter_change_resets_paging_before_the_response() {
        let all = cards(20);
        let mut feed = feed();
        let t = feed.begin_replace(FetchMode::Initial);
        feed.finish_replace(t, page(all[..10].to_vec(), 1, 10, 30));
        let t = feed.begin_append().unwrap();
        feed.finish_append(t, page(all[10..20].to_vec(), 2, 10, 30));
        assert_eq!(feed.current_page(), 2);

        let t = feed.begin_replace(FetchMode::Search);
        assert_eq!(feed.current_page(), 1);
        assert!(feed.has_more());
        assert!(feed.loading().searching);

        feed.finish_replace(t, page(all[..3].to_vec(), 1, 10, 3));
        assert_eq!(ids(feed.cards()), ids(&all[..3]));
        assert!(!feed.has_more());
    }

    #[test]
    fn append_in_flight_during_replace_is_discarded() {
        let all = cards(30);
        let mut feed = feed();
        let t = feed.begin_replace(FetchMode::Initial);
        feed.finish_replace(t, page(all[..10].to_vec(), 1, 10, 30));

        let append = feed.begin_append().unwrap();
        let replace = feed.begin_replace(FetchMode::Search);
        assert!(!feed.loading().appending);
        assert!(feed.finish_replace(replace, page(all[20..25].to_vec(), 1, 10, 5)));

        assert!(!feed.finish_append(append, page(all[10..20].to_vec(), 2, 10, 30)));
        assert_eq!(ids(feed.cards()), ids(&all[20..25]));
        assert_eq!(feed.current_page(), 1);
        assert!(!feed.has_more());
    }

    #[test]
    fn slow_older_replace_cannot_overwrite_newer_one() {
        let all = cards(4);
        let mut feed = feed();
        let older = feed.begin_replace(FetchMode::Search);
        let newer = feed.begin_replace(FetchMode::Search);

        assert!(feed.finish_replace(newer, page(all[2..].to_vec(), 1, 10, 2)));
        assert!(!feed.finish_replace(older, page(all[..2].to_vec(), 1, 10, 2)));
        assert_eq!(ids(feed.cards()), ids(&all[2..]));
    }

    #[test]
    fn replace_failure_clears_the_list() {
        let mut feed = feed();
        let t = feed.begin_replace(FetchMode::Initial);
        feed.finish_replace(t, page(cards(3), 1, 10, 3));

        let t = feed.begin_replace(FetchMode::Search);
        feed.finish_replace(t, Envelope::failure("Failed to load cards: boom"));
        assert!(feed.cards().is_empty());
        assert_eq!(feed.error(), Some("Failed to load cards: boom"));
        assert!(!feed.loading().any());
    }

    #[test]
    fn append_failure_keeps_what_is_shown() {
        let all = cards(10);
        let mut feed = feed();
        let t = feed.begin_replace(FetchMode::Initial);
        feed.finish_replace(t, page(all.clone(), 1, 10, 20));

        let t = feed.begin_append().unwrap();
        feed.finish_append(t, Envelope::failure("offline"));
        assert_eq!(ids(feed.cards()), ids(&all));
        assert_eq!(feed.error(), Some("offline"));
        assert_eq!(feed.current_page(), 1);

        // Still retryable.
        assert!(feed.begin_append().is_some());
    }

    #[test]
    fn only_one_append_at_a_time() {
        let mut feed = feed();
        let t = feed.begin_replace(FetchMode::Initial);
        assert!(feed.begin_append().is_none());
        feed.finish_replace(t, page(cards(10), 1, 10, 40));

        assert!(feed.begin_append().is_some());
        assert!(feed.begin_append().is_none());
    }

    #[test]
    fn mutations_reach_both_lists() {
        let all = cards(3);
        let mut feed = feed();
        let t = feed.begin_replace(FetchMode::Initial);
        feed.finish_replace(t, page(all.clone(), 1, 10, 3));
        feed.apply_stats(page(all.clone(), 1, STATS_LIMIT, 3));
        assert!(feed.stats_loaded());

        let mut read = all[0].clone();
        read.is_read = true;
        feed.apply(&CardEvent::Updated(read), &CardQuery::default());
        assert_eq!(ids(feed.cards()), ids(&all[1..]));
        assert_eq!(feed.stats().len(), 3);
        assert!(feed.stats()[0].is_read);
        assert!(feed.find(all[0].id).is_some());
    }
}
