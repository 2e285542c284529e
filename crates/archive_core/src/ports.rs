//! crates/archive_core/src/ports.rs
//!
//! Defines the service contracts (traits) the core depends on. The hosted
//! relational backend and the hosted auth provider live behind these traits,
//! so the retrieval flow never depends on a concrete database client.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Card, CardDraft, CardPage, CardPatch, CardQuery, Tag, TagDraft, TagPatch};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (database, network).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The hosted backend client. Every operation is scoped to `user_id`; rows
/// owned by anyone else are invisible to it.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    // --- Cards ---
    /// Returns one page (1-based) of cards matching `query`, with their tags
    /// joined in.
    async fn list_cards(
        &self,
        user_id: Uuid,
        query: &CardQuery,
        page: u32,
        limit: u32,
    ) -> PortResult<CardPage>;

    async fn get_card(&self, user_id: Uuid, card_id: Uuid) -> PortResult<Card>;

    /// Inserts the card row only. Tag associations are linked separately.
    async fn insert_card(&self, user_id: Uuid, draft: &CardDraft) -> PortResult<Card>;

    /// Applies the scalar fields of `patch`. `patch.tag_ids` is ignored here.
    async fn update_card(&self, user_id: Uuid, card_id: Uuid, patch: &CardPatch)
        -> PortResult<Card>;

    async fn delete_card(&self, user_id: Uuid, card_id: Uuid) -> PortResult<()>;

    // --- Card <-> Tag junction ---
    /// Adds associations; tags not owned by `user_id` are skipped.
    async fn link_tags(&self, user_id: Uuid, card_id: Uuid, tag_ids: &[Uuid]) -> PortResult<()>;

    /// Removes every association of one card.
    async fn unlink_card(&self, user_id: Uuid, card_id: Uuid) -> PortResult<()>;

    /// Removes every association of one tag.
    async fn unlink_tag(&self, user_id: Uuid, tag_id: Uuid) -> PortResult<()>;

    // --- Tags ---
    async fn list_tags(&self, user_id: Uuid) -> PortResult<Vec<Tag>>;

    async fn insert_tag(&self, user_id: Uuid, draft: &TagDraft) -> PortResult<Tag>;

    async fn update_tag(&self, user_id: Uuid, tag_id: Uuid, patch: &TagPatch) -> PortResult<Tag>;

    async fn delete_tag(&self, user_id: Uuid, tag_id: Uuid) -> PortResult<()>;
}

/// Resolves "who is calling" before every owner-scoped query.
pub trait IdentityProvider: Send + Sync {
    fn current_user_id(&self) -> PortResult<Uuid>;
}

/// Session tokens are issued by the hosted auth provider; this port only
/// turns one back into its owner.
#[async_trait]
pub trait SessionDirectory: Send + Sync {
    async fn resolve_session(&self, token: &str) -> PortResult<Uuid>;
}
