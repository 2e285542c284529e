//! crates/archive_core/src/view.rs
//!
//! The card list controller. It owns the filter state, the search debouncer,
//! the feed and the scroll loader, and drives the gateway on their behalf.
//! A UI renders from `feed()` and `filter()` and forwards user input here.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{Card, CardDraft, CardPatch, CardQuery, SortKey, SortOrder};
use crate::feed::{CardFeed, FeedSettings, FetchMode};
use crate::filter::{FilterState, SearchDebouncer, SEARCH_DEBOUNCE};
use crate::gateway::{Gateway, GatewayError, GatewayResult, SavedCard};
use crate::reconcile::CardEvent;
use crate::scroll::{FeedStatus, ScrollLoader, ScrollMetrics, ScrollSettings};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewSettings {
    pub feed: FeedSettings,
    pub scroll: ScrollSettings,
    pub search_debounce: Duration,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            feed: FeedSettings::default(),
            scroll: ScrollSettings::default(),
            search_debounce: SEARCH_DEBOUNCE,
        }
    }
}

pub struct CardListView {
    gateway: Gateway,
    filter: FilterState,
    debouncer: SearchDebouncer,
    feed: CardFeed,
    scroll: ScrollLoader,
}

impl CardListView {
    /// Builds the view. Settled search terms arrive on the returned receiver
    /// and should be handed back through `apply_search`.
    pub fn new(gateway: Gateway, settings: ViewSettings) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (debouncer, settled) = SearchDebouncer::new(settings.search_debounce);
        let view = Self {
            gateway,
            filter: FilterState::new(),
            debouncer,
            feed: CardFeed::new(settings.feed),
            scroll: ScrollLoader::new(settings.scroll),
        };
        (view, settled)
    }

    pub fn feed(&self) -> &CardFeed {
        &self.feed
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    //=====================================================================================
    // Loading
    //=====================================================================================

    /// First load: the first page and, if not yet loaded, the statistics
    /// list, fetched side by side.
    pub async fn mount(&mut self) {
        let settings = self.feed.settings();
        let ticket = self.feed.begin_replace(FetchMode::Initial);
        let query = self.filter.query().clone();

        if self.feed.stats_loaded() {
            let first = self.gateway.list_cards(&query, 1, settings.page_size).await;
            self.feed.finish_replace(ticket, first);
            return;
        }

        let everything = CardQuery::unfiltered();
        let (first, stats) = futures::join!(
            self.gateway.list_cards(&query, 1, settings.page_size),
            self.gateway.list_cards(&everything, 1, settings.stats_limit),
        );
        self.feed.finish_replace(ticket, first);
        self.feed.apply_stats(stats);
        info!(
            "Card list mounted with {} cards ({} total)",
            self.feed.cards().len(),
            self.feed.stats().len()
        );
    }

    async fn reload(&mut self) {
        let ticket = self.feed.begin_replace(FetchMode::Search);
        let query = self.filter.query().clone();
        let response = self
            .gateway
            .list_cards(&query, 1, self.feed.settings().page_size)
            .await;
        self.feed.finish_replace(ticket, response);
    }

    /// Fetches the next page. Returns `false` when nothing was requested.
    pub async fn load_more(&mut self) -> bool {
        let Some(ticket) = self.feed.begin_append() else {
            return false;
        };
        let query = self.filter.query().clone();
        let response = self
            .gateway
            .list_cards(&query, ticket.page, self.feed.settings().page_size)
            .await;
        self.feed.finish_append(ticket, response);
        true
    }

    //=====================================================================================
    // Filters
    //=====================================================================================

    /// Raw search box input. The search is applied once typing settles.
    pub fn type_search(&mut self, text: &str) {
        self.filter.type_search(text);
        self.debouncer.schedule(text.to_string());
    }

    pub async fn apply_search(&mut self, text: &str) {
        if self.filter.apply_search(text) {
            self.reload().await;
        }
    }

    pub async fn set_read_filter(&mut self, is_read: Option<bool>) {
        if self.filter.set_is_read(is_read) {
            self.reload().await;
        }
    }

    pub async fn set_favorite_filter(&mut self, is_favorite: Option<bool>) {
        if self.filter.set_is_favorite(is_favorite) {
            self.reload().await;
        }
    }

    pub async fn set_sort(&mut self, sort_by: SortKey, sort_order: SortOrder) {
        let by = self.filter.set_sort_by(sort_by);
        let order = self.filter.set_sort_order(sort_order);
        if by || order {
            self.reload().await;
        }
    }

    //=====================================================================================
    // Scrolling
    //=====================================================================================

    /// Returns `true` when the caller should schedule `on_frame`.
    pub fn on_scroll(&mut self, metrics: ScrollMetrics) -> bool {
        self.scroll.on_scroll(metrics)
    }

    /// Runs the threshold check for the latest scroll position and loads the
    /// next page if it passes.
    pub async fn on_frame(&mut self) -> bool {
        let status = FeedStatus {
            appending: self.feed.loading().appending,
            has_more: self.feed.has_more(),
        };
        if !self.scroll.on_frame(Instant::now(), status) {
            return false;
        }
        self.load_more().await
    }

    //=====================================================================================
    // Mutations
    //=====================================================================================

    pub async fn create_card(&mut self, draft: CardDraft) -> GatewayResult<SavedCard> {
        let created = self.gateway.create_card(draft).await?;
        if let Some(warning) = &created.tag_link_error {
            warn!("Card {} created without its tags: {}", created.card.id, warning);
        }
        self.feed
            .apply(&CardEvent::Created(created.card.clone()), self.filter.query());
        Ok(created)
    }

    pub async fn update_card(&mut self, card_id: Uuid, patch: CardPatch) -> GatewayResult<SavedCard> {
        let updated = self.gateway.update_card(card_id, patch).await?;
        if let Some(warning) = &updated.tag_link_error {
            warn!("Card {} updated without its new tags: {}", updated.card.id, warning);
        }
        self.feed
            .apply(&CardEvent::Updated(updated.card.clone()), self.filter.query());
        Ok(updated)
    }

    pub async fn delete_card(&mut self, card_id: Uuid) -> GatewayResult<()> {
        self.gateway.delete_card(card_id).await?;
        self.feed
            .apply(&CardEvent::Deleted(card_id), self.filter.query());
        Ok(())
    }

    pub async fn toggle_read(&mut self, card_id: Uuid) -> GatewayResult<Card> {
        let is_read = self.known(card_id)?.is_read;
        let updated = self.update_card(card_id, CardPatch::read(!is_read)).await?;
        Ok(updated.card)
    }

    pub async fn toggle_favorite(&mut self, card_id: Uuid) -> GatewayResult<Card> {
        let is_favorite = self.known(card_id)?.is_favorite;
        let updated = self
            .update_card(card_id, CardPatch::favorite(!is_favorite))
            .await?;
        Ok(updated.card)
    }

    fn known(&self, card_id: Uuid) -> GatewayResult<&Card> {
        self.feed
            .find(card_id)
            .ok_or_else(|| GatewayError::NotFound(format!("Card {} is not loaded", card_id)))
    }
}
