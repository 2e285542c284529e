//! crates/archive_core/src/memory.rs
//!
//! An in-process implementation of the `ArchiveStore` and `SessionDirectory`
//! ports. It backs the test suites and local experiments, and it can be told
//! to fail specific operations so error paths are reachable.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::{
    Card, CardDraft, CardPage, CardPatch, CardQuery, Pagination, SortKey, SortOrder, Tag, TagDraft,
    TagPatch,
};
use crate::ports::{ArchiveStore, PortError, PortResult, SessionDirectory};

/// A list request as the store received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListCall {
    pub user_id: Uuid,
    pub query: CardQuery,
    pub page: u32,
    pub limit: u32,
}

#[derive(Default)]
struct Tables {
    /// Insertion order doubles as the tiebreaker for equal timestamps.
    cards: Vec<Card>,
    tags: Vec<Tag>,
    card_tags: HashSet<(Uuid, Uuid)>,
    sessions: HashMap<String, Uuid>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    list_calls: Mutex<Vec<ListCall>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_links: AtomicBool,
    duplicate_join_rows: AtomicBool,
    writes: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_session(&self, token: impl Into<String>, user_id: Uuid) {
        self.lock().sessions.insert(token.into(), user_id);
    }

    /// Makes `list_cards`, `get_card` and `list_tags` fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every row-changing operation except linking fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes `link_tags` fail.
    pub fn fail_links(&self, fail: bool) {
        self.fail_links.store(fail, Ordering::SeqCst);
    }

    /// Emits every joined tag twice, the way a naive outer join can.
    pub fn duplicate_join_rows(&self, duplicate: bool) {
        self.duplicate_join_rows.store(duplicate, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> Vec<ListCall> {
        self.list_calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Number of successful row-changing operations.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Junction rows currently stored, across all users.
    pub fn association_count(&self) -> usize {
        self.lock().card_tags.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn check_read(&self) -> PortResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("connection reset".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> PortResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("write rejected".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn with_tags(&self, tables: &Tables, card: &Card) -> Card {
        let mut tags: Vec<Tag> = tables
            .tags
            .iter()
            .filter(|t| tables.card_tags.contains(&(card.id, t.id)))
            .cloned()
            .collect();
        if self.duplicate_join_rows.load(Ordering::SeqCst) {
            tags = tags.into_iter().flat_map(|t| [t.clone(), t]).collect();
        }
        Card {
            tags,
            ..card.clone()
        }
    }
}

fn card_not_found(card_id: Uuid) -> PortError {
    PortError::NotFound(format!("Card {} not found", card_id))
}

fn tag_not_found(tag_id: Uuid) -> PortError {
    PortError::NotFound(format!("Tag {} not found", tag_id))
}

#[async_trait]
impl ArchiveStore for InMemoryStore {
    async fn list_cards(
        &self,
        user_id: Uuid,
        query: &CardQuery,
        page: u32,
        limit: u32,
    ) -> PortResult<CardPage> {
        self.list_calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(ListCall {
                user_id,
                query: query.clone(),
                page,
                limit,
            });
        self.check_read()?;

        let page = page.max(1);
        let limit = limit.max(1);
        let tables = self.lock();
        let mut matching: Vec<(usize, &Card)> = tables
            .cards
            .iter()
            .enumerate()
            .filter(|(_, c)| c.user_id == user_id && query.matches(c))
            .collect();

        matching.sort_by(|(ia, a), (ib, b)| {
            let ordering = match query.sort_by {
                SortKey::CreatedAt => a.saved_at.cmp(&b.saved_at).then(ia.cmp(ib)),
                SortKey::Title => a
                    .title
                    .to_lowercase()
                    .cmp(&b.title.to_lowercase())
                    .then(ia.cmp(ib)),
            };
            match query.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let total = matching.len() as u64;
        let offset = (page as usize - 1).saturating_mul(limit as usize);
        let cards = matching
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .map(|(_, c)| self.with_tags(&tables, c))
            .collect();

        Ok(CardPage {
            cards,
            pagination: Pagination::new(page, limit, total),
        })
    }

    async fn get_card(&self, user_id: Uuid, card_id: Uuid) -> PortResult<Card> {
        self.check_read()?;
        let tables = self.lock();
        tables
            .cards
            .iter()
            .find(|c| c.id == card_id && c.user_id == user_id)
            .map(|c| self.with_tags(&tables, c))
            .ok_or_else(|| card_not_found(card_id))
    }

    async fn insert_card(&self, user_id: Uuid, draft: &CardDraft) -> PortResult<Card> {
        self.check_write()?;
        let now = Utc::now();
        let card = Card {
            id: Uuid::new_v4(),
            user_id,
            title: draft.title.clone(),
            url: draft.url.clone(),
            description: draft.description.clone(),
            thumbnail_url: draft.thumbnail_url.clone(),
            favicon_url: draft.favicon_url.clone(),
            is_read: false,
            is_favorite: false,
            reading_time: draft.reading_time,
            site_name: draft.site_name.clone(),
            author: draft.author.clone(),
            published_at: draft.published_at,
            saved_at: now,
            updated_at: now,
            tags: Vec::new(),
        };
        self.lock().cards.push(card.clone());
        Ok(card)
    }

    async fn update_card(
        &self,
        user_id: Uuid,
        card_id: Uuid,
        patch: &CardPatch,
    ) -> PortResult<Card> {
        self.check_write()?;
        let mut tables = self.lock();
        let card = tables
            .cards
            .iter_mut()
            .find(|c| c.id == card_id && c.user_id == user_id)
            .ok_or_else(|| card_not_found(card_id))?;
        patch.apply_to(card);
        card.updated_at = Utc::now();
        let updated = card.clone();
        Ok(self.with_tags(&tables, &updated))
    }

    async fn delete_card(&self, user_id: Uuid, card_id: Uuid) -> PortResult<()> {
        self.check_write()?;
        let mut tables = self.lock();
        let before = tables.cards.len();
        tables
            .cards
            .retain(|c| !(c.id == card_id && c.user_id == user_id));
        if tables.cards.len() == before {
            return Err(card_not_found(card_id));
        }
        Ok(())
    }

    async fn link_tags(&self, user_id: Uuid, card_id: Uuid, tag_ids: &[Uuid]) -> PortResult<()> {
        if self.fail_links.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("card_tags insert failed".to_string()));
        }
        let mut tables = self.lock();
        if !tables
            .cards
            .iter()
            .any(|c| c.id == card_id && c.user_id == user_id)
        {
            return Err(card_not_found(card_id));
        }
        let owned: Vec<Uuid> = tag_ids
            .iter()
            .copied()
            .filter(|id| tables.tags.iter().any(|t| t.id == *id && t.user_id == user_id))
            .collect();
        for tag_id in owned {
            tables.card_tags.insert((card_id, tag_id));
        }
        Ok(())
    }

    async fn unlink_card(&self, user_id: Uuid, card_id: Uuid) -> PortResult<()> {
        self.check_write()?;
        let mut tables = self.lock();
        if tables
            .cards
            .iter()
            .any(|c| c.id == card_id && c.user_id == user_id)
        {
            tables.card_tags.retain(|(c, _)| *c != card_id);
        }
        Ok(())
    }

    async fn unlink_tag(&self, user_id: Uuid, tag_id: Uuid) -> PortResult<()> {
        self.check_write()?;
        let mut tables = self.lock();
        if tables
            .tags
            .iter()
            .any(|t| t.id == tag_id && t.user_id == user_id)
        {
            tables.card_tags.retain(|(_, t)| *t != tag_id);
        }
        Ok(())
    }

    async fn list_tags(&self, user_id: Uuid) -> PortResult<Vec<Tag>> {
        self.check_read()?;
        let mut tags: Vec<Tag> = self
            .lock()
            .tags
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tags.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(tags)
    }

    async fn insert_tag(&self, user_id: Uuid, draft: &TagDraft) -> PortResult<Tag> {
        self.check_write()?;
        let tag = Tag {
            id: Uuid::new_v4(),
            user_id,
            name: draft.name.clone(),
            color: draft.color.clone(),
        };
        self.lock().tags.push(tag.clone());
        Ok(tag)
    }

    async fn update_tag(&self, user_id: Uuid, tag_id: Uuid, patch: &TagPatch) -> PortResult<Tag> {
        self.check_write()?;
        let mut tables = self.lock();
        let tag = tables
            .tags
            .iter_mut()
            .find(|t| t.id == tag_id && t.user_id == user_id)
            .ok_or_else(|| tag_not_found(tag_id))?;
        if let Some(name) = &patch.name {
            tag.name = name.clone();
        }
        if let Some(color) = &patch.color {
            tag.color = color.clone();
        }
        Ok(tag.clone())
    }

    async fn delete_tag(&self, user_id: Uuid, tag_id: Uuid) -> PortResult<()> {
        self.check_write()?;
        let mut tables = self.lock();
        let before = tables.tags.len();
        tables
            .tags
            .retain(|t| !(t.id == tag_id && t.user_id == user_id));
        if tables.tags.len() == before {
            return Err(tag_not_found(tag_id));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionDirectory for InMemoryStore {
    async fn resolve_session(&self, token: &str) -> PortResult<Uuid> {
        self.lock()
            .sessions
            .get(token)
            .copied()
            .ok_or(PortError::Unauthorized)
    }
}
