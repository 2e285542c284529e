//! Builders shared by the unit tests of this crate.

use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use crate::domain::{Card, CardPage, Pagination};
use crate::gateway::Envelope;

/// A card whose `saved_at` grows with `n`, so ordering is predictable.
pub fn card(n: i64) -> Card {
    let saved_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(n);
    Card {
        id: Uuid::new_v4(),
        user_id: Uuid::nil(),
        title: format!("Card {}", n),
        url: Some(format!("https://example.com/{}", n)),
        description: None,
        thumbnail_url: None,
        favicon_url: None,
        is_read: false,
        is_favorite: false,
        reading_time: Some(5),
        site_name: None,
        author: None,
        published_at: None,
        saved_at,
        updated_at: saved_at,
        tags: Vec::new(),
    }
}

pub fn cards(count: i64) -> Vec<Card> {
    (0..count).map(card).collect()
}

/// A successful page envelope as the gateway would produce it.
pub fn page(cards: Vec<Card>, current_page: u32, per_page: u32, total: u64) -> Envelope<CardPage> {
    Envelope::ok(CardPage {
        cards,
        pagination: Pagination::new(current_page, per_page, total),
    })
}

pub fn ids(cards: &[Card]) -> Vec<Uuid> {
    cards.iter().map(|c| c.id).collect()
}
