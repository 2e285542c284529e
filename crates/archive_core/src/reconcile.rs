//! crates/archive_core/src/reconcile.rs
//!
//! Optimistic list maintenance after a card mutation. Both functions are
//! plain reducers: they take the current list and an event and return the
//! next list, so a mutation never needs a refetch to show up.

use uuid::Uuid;

use crate::domain::{Card, CardQuery};

#[derive(Debug, Clone, PartialEq)]
pub enum CardEvent {
    Created(Card),
    /// Read/favorite toggles arrive here too, carrying the updated card.
    Updated(Card),
    Deleted(Uuid),
}

/// Next state of the visible, filtered list.
///
/// An updated card that no longer passes the read/favorite filter leaves the
/// list; one that still passes keeps its position.
pub fn reconcile_filtered(cards: Vec<Card>, event: &CardEvent, query: &CardQuery) -> Vec<Card> {
    match event {
        CardEvent::Updated(card) if !query.matches_status(card) => remove(cards, card.id),
        _ => reconcile_stats(cards, event),
    }
}

/// Next state of the unfiltered statistics list.
pub fn reconcile_stats(cards: Vec<Card>, event: &CardEvent) -> Vec<Card> {
    match event {
        CardEvent::Created(card) => {
            let mut next = Vec::with_capacity(cards.len() + 1);
            next.push(card.clone());
            next.extend(cards.into_iter().filter(|c| c.id != card.id));
            next
        }
        CardEvent::Updated(card) => cards
            .into_iter()
            .map(|c| if c.id == card.id { card.clone() } else { c })
            .collect(),
        CardEvent::Deleted(id) => remove(cards, *id),
    }
}

fn remove(mut cards: Vec<Card>, id: Uuid) -> Vec<Card> {
    cards.retain(|c| c.id != id);
    cards
}
