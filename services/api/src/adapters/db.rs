//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ArchiveStore` and `SessionDirectory` ports from the core crate. It
//! handles all interactions with the PostgreSQL database using `sqlx`.

use std::collections::HashMap;

use async_trait::async_trait;
use archive_core::domain::{
    Card, CardDraft, CardPage, CardPatch, CardQuery, Pagination, SortKey, SortOrder, Tag,
    TagDraft, TagPatch,
};
use archive_core::ports::{ArchiveStore, PortError, PortResult, SessionDirectory};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const CARD_COLUMNS: &str = "id, user_id, title, url, description, thumbnail_url, favicon_url, \
     is_read, is_favorite, reading_time, site_name, author, published_at, saved_at, updated_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the storage ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Tags of the given cards, grouped by card id.
    async fn tags_for(&self, user_id: Uuid, card_ids: &[Uuid]) -> PortResult<HashMap<Uuid, Vec<Tag>>> {
        if card_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, CardTagRecord>(
            "SELECT ct.card_id, t.id, t.user_id, t.name, t.color \
             FROM card_tags ct JOIN tags t ON t.id = ct.tag_id \
             WHERE ct.card_id = ANY($1) AND t.user_id = $2 \
             ORDER BY t.name",
        )
        .bind(card_ids)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut grouped: HashMap<Uuid, Vec<Tag>> = HashMap::new();
        for row in rows {
            let (card_id, tag) = row.to_domain();
            grouped.entry(card_id).or_default().push(tag);
        }
        Ok(grouped)
    }

    async fn with_tags(&self, user_id: Uuid, record: CardRecord) -> PortResult<Card> {
        let mut tags = self.tags_for(user_id, &[record.id]).await?;
        let card_tags = tags.remove(&record.id).unwrap_or_default();
        Ok(record.to_domain(card_tags))
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct CardRecord {
    id: Uuid,
    user_id: Uuid,
    title: String,
    url: Option<String>,
    description: Option<String>,
    thumbnail_url: Option<String>,
    favicon_url: Option<String>,
    is_read: bool,
    is_favorite: bool,
    reading_time: Option<i32>,
    site_name: Option<String>,
    author: Option<String>,
    published_at: Option<DateTime<Utc>>,
    saved_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl CardRecord {
    fn to_domain(self, tags: Vec<Tag>) -> Card {
        Card {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            url: self.url,
            description: self.description,
            thumbnail_url: self.thumbnail_url,
            favicon_url: self.favicon_url,
            is_read: self.is_read,
            is_favorite: self.is_favorite,
            reading_time: self.reading_time,
            site_name: self.site_name,
            author: self.author,
            published_at: self.published_at,
            saved_at: self.saved_at,
            updated_at: self.updated_at,
            tags,
        }
    }
}

#[derive(FromRow)]
struct TagRecord {
    id: Uuid,
    user_id: Uuid,
    name: String,
    color: String,
}
impl TagRecord {
    fn to_domain(self) -> Tag {
        Tag {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            color: self.color,
        }
    }
}

#[derive(FromRow)]
struct CardTagRecord {
    card_id: Uuid,
    id: Uuid,
    user_id: Uuid,
    name: String,
    color: String,
}
impl CardTagRecord {
    fn to_domain(self) -> (Uuid, Tag) {
        (
            self.card_id,
            Tag {
                id: self.id,
                user_id: self.user_id,
                name: self.name,
                color: self.color,
            },
        )
    }
}

//=========================================================================================
// Query Helpers
//=========================================================================================

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Escapes `%`, `_` and `\` so user input is matched literally by ILIKE.
fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_card_filters(qb: &mut QueryBuilder<'_, Postgres>, user_id: Uuid, query: &CardQuery) {
    qb.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(is_read) = query.is_read {
        qb.push(" AND is_read = ").push_bind(is_read);
    }
    if let Some(is_favorite) = query.is_favorite {
        qb.push(" AND is_favorite = ").push_bind(is_favorite);
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = like_pattern(search);
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn order_clause(query: &CardQuery) -> &'static str {
    match (query.sort_by, query.sort_order) {
        (SortKey::CreatedAt, SortOrder::Asc) => " ORDER BY saved_at ASC, id ASC",
        (SortKey::CreatedAt, SortOrder::Desc) => " ORDER BY saved_at DESC, id DESC",
        (SortKey::Title, SortOrder::Asc) => " ORDER BY lower(title) ASC, id ASC",
        (SortKey::Title, SortOrder::Desc) => " ORDER BY lower(title) DESC, id DESC",
    }
}

//=========================================================================================
// `ArchiveStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ArchiveStore for DbAdapter {
    async fn list_cards(
        &self,
        user_id: Uuid,
        query: &CardQuery,
        page: u32,
        limit: u32,
    ) -> PortResult<CardPage> {
        let page = page.max(1);
        let limit = limit.max(1);

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM cards");
        push_card_filters(&mut count, user_id, query);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM cards", CARD_COLUMNS));
        push_card_filters(&mut select, user_id, query);
        select
            .push(order_clause(query))
            .push(" LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(i64::from(page - 1) * i64::from(limit));
        let records = select
            .build_query_as::<CardRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        let mut tags = self.tags_for(user_id, &ids).await?;
        let cards = records
            .into_iter()
            .map(|r| {
                let card_tags = tags.remove(&r.id).unwrap_or_default();
                r.to_domain(card_tags)
            })
            .collect();

        Ok(CardPage {
            cards,
            pagination: Pagination::new(page, limit, total.max(0) as u64),
        })
    }

    async fn get_card(&self, user_id: Uuid, card_id: Uuid) -> PortResult<Card> {
        let record = sqlx::query_as::<_, CardRecord>(&format!(
            "SELECT {} FROM cards WHERE id = $1 AND user_id = $2",
            CARD_COLUMNS
        ))
        .bind(card_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Card {} not found", card_id)),
            _ => unexpected(e),
        })?;
        self.with_tags(user_id, record).await
    }

    async fn insert_card(&self, user_id: Uuid, draft: &CardDraft) -> PortResult<Card> {
        let record = sqlx::query_as::<_, CardRecord>(&format!(
            "INSERT INTO cards (id, user_id, title, url, description, thumbnail_url, favicon_url, \
             reading_time, site_name, author, published_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {}",
            CARD_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&draft.title)
        .bind(&draft.url)
        .bind(&draft.description)
        .bind(&draft.thumbnail_url)
        .bind(&draft.favicon_url)
        .bind(draft.reading_time)
        .bind(&draft.site_name)
        .bind(&draft.author)
        .bind(draft.published_at)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain(Vec::new()))
    }

    async fn update_card(
        &self,
        user_id: Uuid,
        card_id: Uuid,
        patch: &CardPatch,
    ) -> PortResult<Card> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE cards SET updated_at = now()");
        if let Some(title) = &patch.title {
            qb.push(", title = ").push_bind(title.clone());
        }
        if let Some(url) = &patch.url {
            qb.push(", url = ").push_bind(url.clone());
        }
        if let Some(description) = &patch.description {
            qb.push(", description = ").push_bind(description.clone());
        }
        if let Some(is_read) = patch.is_read {
            qb.push(", is_read = ").push_bind(is_read);
        }
        if let Some(is_favorite) = patch.is_favorite {
            qb.push(", is_favorite = ").push_bind(is_favorite);
        }
        qb.push(" WHERE id = ")
            .push_bind(card_id)
            .push(" AND user_id = ")
            .push_bind(user_id)
            .push(" RETURNING ")
            .push(CARD_COLUMNS);

        let record = qb
            .build_query_as::<CardRecord>()
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Card {} not found", card_id)))?;
        self.with_tags(user_id, record).await
    }

    async fn delete_card(&self, user_id: Uuid, card_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM cards WHERE id = $1 AND user_id = $2")
            .bind(card_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Card {} not found", card_id)));
        }
        Ok(())
    }

    async fn link_tags(&self, user_id: Uuid, card_id: Uuid, tag_ids: &[Uuid]) -> PortResult<()> {
        let owned = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM cards WHERE id = $1 AND user_id = $2)",
        )
        .bind(card_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        if !owned {
            return Err(PortError::NotFound(format!("Card {} not found", card_id)));
        }

        sqlx::query(
            "INSERT INTO card_tags (card_id, tag_id) \
             SELECT $1, t.id FROM tags t WHERE t.id = ANY($2) AND t.user_id = $3 \
             ON CONFLICT DO NOTHING",
        )
        .bind(card_id)
        .bind(tag_ids)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn unlink_card(&self, user_id: Uuid, card_id: Uuid) -> PortResult<()> {
        sqlx::query(
            "DELETE FROM card_tags WHERE card_id = $1 \
             AND card_id IN (SELECT id FROM cards WHERE user_id = $2)",
        )
        .bind(card_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn unlink_tag(&self, user_id: Uuid, tag_id: Uuid) -> PortResult<()> {
        sqlx::query(
            "DELETE FROM card_tags WHERE tag_id = $1 \
             AND tag_id IN (SELECT id FROM tags WHERE user_id = $2)",
        )
        .bind(tag_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn list_tags(&self, user_id: Uuid) -> PortResult<Vec<Tag>> {
        let records = sqlx::query_as::<_, TagRecord>(
            "SELECT id, user_id, name, color FROM tags WHERE user_id = $1 ORDER BY lower(name) ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn insert_tag(&self, user_id: Uuid, draft: &TagDraft) -> PortResult<Tag> {
        let record = sqlx::query_as::<_, TagRecord>(
            "INSERT INTO tags (id, user_id, name, color) VALUES ($1, $2, $3, $4) \
             RETURNING id, user_id, name, color",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&draft.name)
        .bind(&draft.color)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn update_tag(&self, user_id: Uuid, tag_id: Uuid, patch: &TagPatch) -> PortResult<Tag> {
        let record = sqlx::query_as::<_, TagRecord>(
            "UPDATE tags SET name = COALESCE($1, name), color = COALESCE($2, color) \
             WHERE id = $3 AND user_id = $4 RETURNING id, user_id, name, color",
        )
        .bind(&patch.name)
        .bind(&patch.color)
        .bind(tag_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Tag {} not found", tag_id)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn delete_tag(&self, user_id: Uuid, tag_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1 AND user_id = $2")
            .bind(tag_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Tag {} not found", tag_id)));
        }
        Ok(())
    }
}

//=========================================================================================
// `SessionDirectory` Trait Implementation
//=========================================================================================

#[async_trait]
impl SessionDirectory for DbAdapter {
    async fn resolve_session(&self, token: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("rust"), "%rust%");
        assert_eq!(like_pattern("100%_done\\"), "%100\\%\\_done\\\\%");
    }

    #[test]
    fn filters_bind_only_what_is_set() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM cards");
        push_card_filters(&mut qb, Uuid::nil(), &CardQuery::unfiltered());
        assert_eq!(qb.sql(), "SELECT COUNT(*) FROM cards WHERE user_id = $1");

        let query = CardQuery {
            search: Some("async".to_string()),
            is_favorite: Some(true),
            ..CardQuery::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM cards");
        push_card_filters(&mut qb, Uuid::nil(), &query);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM cards WHERE user_id = $1 AND is_read = $2 \
             AND is_favorite = $3 AND (title ILIKE $4 OR description ILIKE $5)"
        );
    }

    #[test]
    fn title_sort_is_case_insensitive() {
        let query = CardQuery {
            sort_by: SortKey::Title,
            sort_order: SortOrder::Asc,
            ..CardQuery::default()
        };
        assert_eq!(order_clause(&query), " ORDER BY lower(title) ASC, id ASC");
        assert_eq!(order_clause(&CardQuery::default()), " ORDER BY saved_at DESC, id DESC");
    }
}
