//! crates/archive_core/src/gateway.rs
//!
//! The remote data gateway: a thin typed layer between the list flow and the
//! hosted backend. List operations never fail outright; they answer with an
//! `Envelope` whose `success` flag the caller checks. Single-entity mutations
//! return `Result` and the caller handles the error.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::domain::{Card, CardDraft, CardPage, CardPatch, CardQuery, Tag, TagDraft, TagPatch};
use crate::ports::{ArchiveStore, IdentityProvider, PortError, PortResult};

//=========================================================================================
// Envelope and Error Types
//=========================================================================================

/// The uniform answer of a list operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl<T: Default> Envelope<T> {
    /// A failed answer carrying safe default data.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: T::default(),
            error: Some(message.into()),
        }
    }
}

/// Errors raised by single-entity mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Input rejected before any request was sent.
    #[error("{0}")]
    Validation(String),
    #[error("Not signed in")]
    Unauthenticated,
    #[error("{0}")]
    NotFound(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<PortError> for GatewayError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => GatewayError::NotFound(what),
            PortError::Unauthorized => GatewayError::Unauthenticated,
            PortError::Unexpected(msg) => GatewayError::Backend(msg),
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// The outcome of saving a card. The card row is kept even when linking its
/// tags failed; `tag_link_error` then says why the tags are missing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedCard {
    pub card: Card,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_link_error: Option<String>,
}

//=========================================================================================
// The Gateway
//=========================================================================================

#[derive(Clone)]
pub struct Gateway {
    store: Arc<dyn ArchiveStore>,
    identity: Arc<dyn IdentityProvider>,
}

impl Gateway {
    pub fn new(store: Arc<dyn ArchiveStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { store, identity }
    }

    fn user_id(&self) -> GatewayResult<Uuid> {
        self.identity.current_user_id().map_err(|e| {
            warn!("No authenticated user for gateway call: {}", e);
            GatewayError::Unauthenticated
        })
    }

    // --- Cards ---

    pub async fn list_cards(&self, query: &CardQuery, page: u32, limit: u32) -> Envelope<CardPage> {
        let result = async {
            let user_id = self.user_id()?;
            let page = self.store.list_cards(user_id, query, page, limit).await?;
            Ok::<_, GatewayError>(page)
        }
        .await;

        match result {
            Ok(mut page) => {
                page.cards.iter_mut().for_each(dedup_tags);
                debug!(
                    "Fetched page {}/{} ({} cards)",
                    page.pagination.current_page,
                    page.pagination.total_pages,
                    page.cards.len()
                );
                Envelope::ok(page)
            }
            Err(e) => {
                error!("Failed to list cards: {:?}", e);
                Envelope::failure(format!("Failed to load cards: {}", e))
            }
        }
    }

    pub async fn get_card(&self, card_id: Uuid) -> Envelope<Option<Card>> {
        let result = async {
            let user_id = self.user_id()?;
            let card = self.store.get_card(user_id, card_id).await?;
            Ok::<_, GatewayError>(card)
        }
        .await;

        match result {
            Ok(mut card) => {
                dedup_tags(&mut card);
                Envelope::ok(Some(card))
            }
            Err(e) => {
                error!("Failed to get card {}: {:?}", card_id, e);
                Envelope::failure(format!("Failed to load card: {}", e))
            }
        }
    }

    pub async fn create_card(&self, draft: CardDraft) -> GatewayResult<SavedCard> {
        let title = required("Title", &draft.title)?;
        let user_id = self.user_id()?;
        let draft = CardDraft { title, ..draft };

        let card = self.store.insert_card(user_id, &draft).await.map_err(|e| {
            error!("Failed to create card: {:?}", e);
            GatewayError::from(e)
        })?;

        let tag_ids = unique(&draft.tag_ids);
        if tag_ids.is_empty() {
            return Ok(SavedCard {
                card,
                tag_link_error: None,
            });
        }

        if let Err(e) = self.store.link_tags(user_id, card.id, &tag_ids).await {
            warn!("Card {} saved but its tags could not be linked: {:?}", card.id, e);
            return Ok(SavedCard {
                card,
                tag_link_error: Some(format!("Tags could not be attached: {}", e)),
            });
        }

        let card = self.reload(user_id, card).await;
        Ok(SavedCard {
            card,
            tag_link_error: None,
        })
    }

    /// Scalar fields first, then tag reassignment when the patch asks for
    /// one. A failed reassignment does not undo the scalar update; it is
    /// reported through `tag_link_error` like on creation.
    pub async fn update_card(&self, card_id: Uuid, patch: CardPatch) -> GatewayResult<SavedCard> {
        let title = patch
            .title
            .as_deref()
            .map(|t| required("Title", t))
            .transpose()?;
        let user_id = self.user_id()?;
        let patch = CardPatch { title, ..patch };

        let mut card = self
            .store
            .update_card(user_id, card_id, &patch)
            .await
            .map_err(|e| {
                error!("Failed to update card {}: {:?}", card_id, e);
                GatewayError::from(e)
            })?;

        let Some(tag_ids) = &patch.tag_ids else {
            dedup_tags(&mut card);
            return Ok(SavedCard {
                card,
                tag_link_error: None,
            });
        };

        if let Err(e) = self.relink(user_id, card_id, &unique(tag_ids)).await {
            warn!("Card {} updated but its tags could not be reassigned: {:?}", card_id, e);
            let card = self.reload(user_id, card).await;
            return Ok(SavedCard {
                card,
                tag_link_error: Some(format!("Tags could not be reassigned: {}", e)),
            });
        }

        let card = self.reload(user_id, card).await;
        Ok(SavedCard {
            card,
            tag_link_error: None,
        })
    }

    /// Removes the card's associations before the card itself so no junction
    /// rows are left behind, whether or not the backend cascades.
    pub async fn delete_card(&self, card_id: Uuid) -> GatewayResult<()> {
        let user_id = self.user_id()?;
        let result = match self.store.unlink_card(user_id, card_id).await {
            Ok(()) => self.store.delete_card(user_id, card_id).await,
            Err(e) => Err(e),
        };
        result.map_err(|e| {
            error!("Failed to delete card {}: {:?}", card_id, e);
            e.into()
        })
    }

    // --- Tags ---

    pub async fn list_tags(&self) -> Envelope<Vec<Tag>> {
        let result = async {
            let user_id = self.user_id()?;
            let tags = self.store.list_tags(user_id).await?;
            Ok::<_, GatewayError>(tags)
        }
        .await;

        match result {
            Ok(tags) => Envelope::ok(tags),
            Err(e) => {
                error!("Failed to list tags: {:?}", e);
                Envelope::failure(format!("Failed to load tags: {}", e))
            }
        }
    }

    pub async fn create_tag(&self, draft: TagDraft) -> GatewayResult<Tag> {
        let draft = TagDraft {
            name: required("Tag name", &draft.name)?,
            color: required("Tag color", &draft.color)?,
        };
        let user_id = self.user_id()?;
        self.store.insert_tag(user_id, &draft).await.map_err(|e| {
            error!("Failed to create tag: {:?}", e);
            e.into()
        })
    }

    pub async fn update_tag(&self, tag_id: Uuid, patch: TagPatch) -> GatewayResult<Tag> {
        let patch = TagPatch {
            name: patch
                .name
                .as_deref()
                .map(|n| required("Tag name", n))
                .transpose()?,
            color: patch
                .color
                .as_deref()
                .map(|c| required("Tag color", c))
                .transpose()?,
        };
        let user_id = self.user_id()?;
        self.store
            .update_tag(user_id, tag_id, &patch)
            .await
            .map_err(|e| {
                error!("Failed to update tag {}: {:?}", tag_id, e);
                e.into()
            })
    }

    /// Detaches the tag from every card, then deletes it. Cards stay.
    pub async fn delete_tag(&self, tag_id: Uuid) -> GatewayResult<()> {
        let user_id = self.user_id()?;
        let result = match self.store.unlink_tag(user_id, tag_id).await {
            Ok(()) => self.store.delete_tag(user_id, tag_id).await,
            Err(e) => Err(e),
        };
        result.map_err(|e| {
            error!("Failed to delete tag {}: {:?}", tag_id, e);
            e.into()
        })
    }

    /// Replaces the card's association set.
    async fn relink(&self, user_id: Uuid, card_id: Uuid, tag_ids: &[Uuid]) -> PortResult<()> {
        self.store.unlink_card(user_id, card_id).await?;
        if tag_ids.is_empty() {
            return Ok(());
        }
        self.store.link_tags(user_id, card_id, tag_ids).await
    }

    /// Re-reads a card after linking so its tags are joined in. Falls back to
    /// the copy we already hold.
    async fn reload(&self, user_id: Uuid, card: Card) -> Card {
        match self.store.get_card(user_id, card.id).await {
            Ok(mut fresh) => {
                dedup_tags(&mut fresh);
                fresh
            }
            Err(e) => {
                warn!("Could not reload card {} after linking tags: {:?}", card.id, e);
                card
            }
        }
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

fn required(field: &str, value: &str) -> GatewayResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn unique(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

fn dedup_tags(card: &mut Card) {
    let mut seen = HashSet::new();
    card.tags.retain(|t| seen.insert(t.id));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::session::{AppSession, SessionContext};

    fn signed_in() -> (Arc<InMemoryStore>, Gateway, Uuid) {
        let store = Arc::new(InMemoryStore::new());
        let user_id = Uuid::new_v4();
        let identity = Arc::new(SessionContext::signed_in(AppSession::new(user_id, "t")));
        let gateway = Gateway::new(store.clone(), identity);
        (store, gateway, user_id)
    }

    fn tag(name: &str) -> TagDraft {
        TagDraft {
            name: name.to_string(),
            color: "#3b82f6".to_string(),
        }
    }

    #[tokio::test]
    async fn empty_title_is_rejected_before_any_request() {
        let (store, gateway, _) = signed_in();
        let err = gateway
            .create_card(CardDraft::titled("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
        assert_eq!(store.write_count(), 0);

        let created = gateway.create_card(CardDraft::titled("Foo")).await.unwrap();
        assert_eq!(created.card.title, "Foo");
        assert_eq!(created.card.url, None);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn list_without_session_fails_softly() {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Gateway::new(store.clone(), Arc::new(SessionContext::new()));
        let envelope = gateway.list_cards(&CardQuery::default(), 1, 10).await;
        assert!(!envelope.success);
        assert!(envelope.data.cards.is_empty());
        assert!(envelope.error.is_some());
        assert!(store.list_calls().is_empty());

        let err = gateway.create_tag(tag("rust")).await.unwrap_err();
        assert_eq!(err, GatewayError::Unauthenticated);
    }

    #[tokio::test]
    async fn backend_failure_yields_failed_envelope() {
        let (store, gateway, _) = signed_in();
        store.fail_reads(true);
        let cards = gateway.list_cards(&CardQuery::default(), 1, 10).await;
        assert!(!cards.success);
        assert_eq!(cards.data, CardPage::default());
        let tags = gateway.list_tags().await;
        assert!(!tags.success);
        assert!(tags.data.is_empty());
    }

    #[tokio::test]
    async fn mutations_surface_backend_errors() {
        let (store, gateway, _) = signed_in();
        store.fail_writes(true);
        let err = gateway.create_card(CardDraft::titled("x")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Backend(_)));
        let err = gateway.delete_card(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Backend(_)));
    }

    #[tokio::test]
    async fn listing_collapses_duplicate_tag_rows() {
        let (store, gateway, _) = signed_in();
        let rust = gateway.create_tag(tag("rust")).await.unwrap();
        let draft = CardDraft {
            tag_ids: vec![rust.id, rust.id],
            ..CardDraft::titled("Book")
        };
        gateway.create_card(draft).await.unwrap();

        store.duplicate_join_rows(true);
        let page = gateway.list_cards(&CardQuery::default(), 1, 10).await;
        assert!(page.success);
        assert_eq!(page.data.cards[0].tags, vec![rust]);
    }

    #[tokio::test]
    async fn tag_link_failure_keeps_the_card() {
        let (store, gateway, _) = signed_in();
        let rust = gateway.create_tag(tag("rust")).await.unwrap();
        store.fail_links(true);

        let created = gateway
            .create_card(CardDraft {
                tag_ids: vec![rust.id],
                ..CardDraft::titled("Kept")
            })
            .await
            .unwrap();
        assert!(created.tag_link_error.is_some());
        assert!(created.card.tags.is_empty());

        let page = gateway.list_cards(&CardQuery::unfiltered(), 1, 10).await;
        assert_eq!(page.data.cards.len(), 1);
    }

    #[tokio::test]
    async fn deleting_a_tag_keeps_its_cards() {
        let (store, gateway, _) = signed_in();
        let rust = gateway.create_tag(tag("rust")).await.unwrap();
        let go = gateway.create_tag(tag("go")).await.unwrap();
        for title in ["a", "b"] {
            gateway
                .create_card(CardDraft {
                    tag_ids: vec![rust.id, go.id],
                    ..CardDraft::titled(title)
                })
                .await
                .unwrap();
        }

        gateway.delete_tag(rust.id).await.unwrap();

        let page = gateway.list_cards(&CardQuery::unfiltered(), 1, 10).await;
        assert_eq!(page.data.cards.len(), 2);
        for card in &page.data.cards {
            assert!(!card.has_tag(rust.id));
            assert!(card.has_tag(go.id));
        }
        assert_eq!(store.association_count(), 2);
        assert_eq!(gateway.list_tags().await.data, vec![go]);
    }

    #[tokio::test]
    async fn deleting_a_card_removes_its_associations() {
        let (store, gateway, _) = signed_in();
        let rust = gateway.create_tag(tag("rust")).await.unwrap();
        let created = gateway
            .create_card(CardDraft {
                tag_ids: vec![rust.id],
                ..CardDraft::titled("gone")
            })
            .await
            .unwrap();
        assert_eq!(store.association_count(), 1);

        gateway.delete_card(created.card.id).await.unwrap();
        assert_eq!(store.association_count(), 0);
        assert_eq!(gateway.list_tags().await.data.len(), 1);
    }

    #[tokio::test]
    async fn update_reassigns_tags() {
        let (_, gateway, _) = signed_in();
        let rust = gateway.create_tag(tag("rust")).await.unwrap();
        let go = gateway.create_tag(tag("go")).await.unwrap();
        let created = gateway
            .create_card(CardDraft {
                tag_ids: vec![rust.id],
                ..CardDraft::titled("card")
            })
            .await
            .unwrap();

        let updated = gateway
            .update_card(
                created.card.id,
                CardPatch {
                    title: Some(" renamed ".to_string()),
                    tag_ids: Some(vec![go.id]),
                    ..CardPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.card.title, "renamed");
        assert_eq!(updated.card.tags, vec![go]);
        assert_eq!(updated.tag_link_error, None);

        let err = gateway
            .update_card(
                created.card.id,
                CardPatch {
                    title: Some(String::new()),
                    ..CardPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[tokio::test]
    async fn failed_reassignment_keeps_the_scalar_update() {
        let (store, gateway, _) = signed_in();
        let rust = gateway.create_tag(tag("rust")).await.unwrap();
        let go = gateway.create_tag(tag("go")).await.unwrap();
        let created = gateway
            .create_card(CardDraft {
                tag_ids: vec![rust.id],
                ..CardDraft::titled("card")
            })
            .await
            .unwrap();
        store.fail_links(true);

        let updated = gateway
            .update_card(
                created.card.id,
                CardPatch {
                    title: Some("renamed".to_string()),
                    tag_ids: Some(vec![go.id]),
                    ..CardPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.card.title, "renamed");
        assert!(updated.card.tags.is_empty());
        assert!(updated.tag_link_error.is_some());
    }

    #[tokio::test]
    async fn rows_are_scoped_to_their_owner() {
        let store = Arc::new(InMemoryStore::new());
        let alice = Gateway::new(
            store.clone(),
            Arc::new(SessionContext::signed_in(AppSession::new(Uuid::new_v4(), "a"))),
        );
        let bob = Gateway::new(
            store.clone(),
            Arc::new(SessionContext::signed_in(AppSession::new(Uuid::new_v4(), "b"))),
        );
        let alices_tag = alice.create_tag(tag("private")).await.unwrap();
        let card = alice.create_card(CardDraft::titled("mine")).await.unwrap().card;

        assert!(bob.list_cards(&CardQuery::unfiltered(), 1, 10).await.data.cards.is_empty());
        assert!(bob.list_tags().await.data.is_empty());
        let err = bob.delete_card(card.id).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));

        let bobs = bob
            .create_card(CardDraft {
                tag_ids: vec![alices_tag.id],
                ..CardDraft::titled("theirs")
            })
            .await
            .unwrap();
        assert!(bobs.card.tags.is_empty());
    }

    #[tokio::test]
    async fn get_card_reports_missing_cards() {
        let (_, gateway, _) = signed_in();
        let missing = gateway.get_card(Uuid::new_v4()).await;
        assert!(!missing.success);
        assert_eq!(missing.data, None);

        let card = gateway.create_card(CardDraft::titled("here")).await.unwrap().card;
        let found = gateway.get_card(card.id).await;
        assert_eq!(found.data.map(|c| c.id), Some(card.id));
    }

    #[tokio::test]
    async fn tag_validation_rejects_blank_fields() {
        let (_, gateway, _) = signed_in();
        let err = gateway
            .create_tag(TagDraft {
                name: "ok".to_string(),
                color: " ".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));

        let t = gateway.create_tag(tag("old")).await.unwrap();
        let renamed = gateway
            .update_tag(
                t.id,
                TagPatch {
                    name: Some("new".to_string()),
                    color: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "new");
        assert_eq!(renamed.color, t.color);
    }
}
