//! crates/archive_core/src/domain.rs
//!
//! Defines the core data structures of the card archive: saved cards, the
//! user-owned tags attached to them, and the query/pagination shapes the
//! list flow exchanges with the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// A saved bookmark/article record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub url: Option<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub favicon_url: Option<String>,
    pub is_read: bool,
    pub is_favorite: bool,
    /// Estimated reading time in minutes.
    pub reading_time: Option<i32>,
    pub site_name: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub saved_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Unique by tag id; order carries no meaning.
    pub tags: Vec<Tag>,
}

impl Card {
    pub fn has_tag(&self, tag_id: Uuid) -> bool {
        self.tags.iter().any(|t| t.id == tag_id)
    }
}

/// A user-defined label with a color, attachable to many cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    /// A CSS-color-like value, e.g. `#3b82f6`.
    pub color: String,
}

/// Fields supplied when saving a new card.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardDraft {
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub favicon_url: Option<String>,
    #[serde(default)]
    pub reading_time: Option<i32>,
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tag_ids: Vec<Uuid>,
}

impl CardDraft {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// A partial update. `None` leaves the field untouched; for the optional
/// text fields `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub url: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub is_read: Option<bool>,
    #[serde(default)]
    pub is_favorite: Option<bool>,
    /// Replaces the full association set when present.
    #[serde(default)]
    pub tag_ids: Option<Vec<Uuid>>,
}

/// A key that is present maps to `Some`, so an explicit `null` becomes
/// `Some(None)`. Absent keys fall back to `None` through `default`.
fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl CardPatch {
    pub fn read(is_read: bool) -> Self {
        Self {
            is_read: Some(is_read),
            ..Self::default()
        }
    }

    pub fn favorite(is_favorite: bool) -> Self {
        Self {
            is_favorite: Some(is_favorite),
            ..Self::default()
        }
    }

    /// Applies the scalar fields of this patch to `card`. Tag reassignment is
    /// resolved by the store, which owns the tag rows.
    pub fn apply_to(&self, card: &mut Card) {
        if let Some(title) = &self.title {
            card.title = title.clone();
        }
        if let Some(url) = &self.url {
            card.url = url.clone();
        }
        if let Some(description) = &self.description {
            card.description = description.clone();
        }
        if let Some(is_read) = self.is_read {
            card.is_read = is_read;
        }
        if let Some(is_favorite) = self.is_favorite {
            card.is_favorite = is_favorite;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDraft {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    CreatedAt,
    Title,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// The filters sent with every card list request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardQuery {
    /// Case-insensitive substring matched against title and description.
    #[serde(default)]
    pub search: Option<String>,
    /// `None` means "all cards".
    #[serde(default)]
    pub is_read: Option<bool>,
    #[serde(default)]
    pub is_favorite: Option<bool>,
    #[serde(default)]
    pub sort_by: SortKey,
    #[serde(default)]
    pub sort_order: SortOrder,
}

impl Default for CardQuery {
    /// Unread cards, newest first.
    fn default() -> Self {
        Self {
            search: None,
            is_read: Some(false),
            is_favorite: None,
            sort_by: SortKey::CreatedAt,
            sort_order: SortOrder::Desc,
        }
    }
}

impl CardQuery {
    /// No filters at all. Used for the statistics fetch.
    pub fn unfiltered() -> Self {
        Self {
            is_read: None,
            ..Self::default()
        }
    }

    /// Whether `card` passes the read/favorite part of this query.
    pub fn matches_status(&self, card: &Card) -> bool {
        self.is_read.map_or(true, |r| card.is_read == r)
            && self.is_favorite.map_or(true, |f| card.is_favorite == f)
    }

    /// Whether `card` passes the search part of this query.
    pub fn matches_search(&self, card: &Card) -> bool {
        let Some(needle) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
        else {
            return true;
        };
        let needle = needle.to_lowercase();
        card.title.to_lowercase().contains(&needle)
            || card
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle))
    }

    pub fn matches(&self, card: &Card) -> bool {
        self.matches_status(card) && self.matches_search(card)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl Pagination {
    pub fn new(current_page: u32, per_page: u32, total: u64) -> Self {
        let per_page = per_page.max(1);
        let total_pages = u32::try_from(total.div_ceil(u64::from(per_page))).unwrap_or(u32::MAX);
        Self {
            current_page,
            per_page,
            total,
            total_pages,
        }
    }

    pub fn has_more(&self) -> bool {
        self.current_page < self.total_pages
    }
}

/// One page of cards plus the server-reported pagination block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardPage {
    pub cards: Vec<Card>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(title: &str, description: Option<&str>) -> Card {
        let now = Utc::now();
        Card {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: title.to_string(),
            url: None,
            description: description.map(str::to_string),
            thumbnail_url: None,
            favicon_url: None,
            is_read: false,
            is_favorite: false,
            reading_time: None,
            site_name: None,
            author: None,
            published_at: None,
            saved_at: now,
            updated_at: now,
            tags: Vec::new(),
        }
    }

    #[test]
    fn pagination_counts_partial_last_page() {
        let p = Pagination::new(3, 10, 25);
        assert_eq!(p.total_pages, 3);
        assert!(!p.has_more());
        assert!(Pagination::new(2, 10, 25).has_more());
        assert_eq!(Pagination::new(1, 10, 0).total_pages, 0);
    }

    #[test]
    fn default_query_is_unread_only() {
        let q = CardQuery::default();
        let mut c = card("Rust", None);
        assert!(q.matches(&c));
        c.is_read = true;
        assert!(!q.matches(&c));
        assert!(CardQuery::unfiltered().matches(&c));
    }

    #[test]
    fn search_checks_title_and_description() {
        let q = CardQuery {
            search: Some("  ownership ".to_string()),
            ..CardQuery::unfiltered()
        };
        assert!(q.matches(&card("Ownership in Rust", None)));
        assert!(q.matches(&card("Borrowing", Some("all about OWNERSHIP"))));
        assert!(!q.matches(&card("Lifetimes", Some("annotations"))));
    }

    #[test]
    fn patch_clears_optional_fields() {
        let mut c = card("Old", Some("desc"));
        CardPatch {
            title: Some("New".to_string()),
            description: Some(None),
            ..CardPatch::default()
        }
        .apply_to(&mut c);
        assert_eq!(c.title, "New");
        assert_eq!(c.description, None);
    }

    #[test]
    fn patch_tells_null_from_absent() {
        let patch: CardPatch =
            serde_json::from_str(r#"{"description": null, "url": "https://example.com"}"#).unwrap();
        assert_eq!(patch.description, Some(None));
        assert_eq!(patch.url, Some(Some("https://example.com".to_string())));

        let patch: CardPatch = serde_json::from_str(r#"{"is_read": true}"#).unwrap();
        assert_eq!(patch.description, None);
        assert_eq!(patch.url, None);
    }

    #[test]
    fn total_pages_saturates() {
        let p = Pagination::new(1, 1, u64::MAX);
        assert_eq!(p.total_pages, u32::MAX);
        assert!(p.has_more());
    }
}
