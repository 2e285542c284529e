//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.
//!
//! List endpoints always answer 200 with a `{success, data, error?}`
//! envelope. Single-entity mutations answer with a status code and a short
//! message when they fail.

use crate::web::state::AppState;
use archive_core::domain::{
    CardDraft, CardPatch, CardQuery, SortKey, SortOrder, TagDraft, TagPatch,
};
use archive_core::feed::{PAGE_SIZE, STATS_LIMIT};
use archive_core::gateway::GatewayError;
use archive_core::session::AppSession;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::{IntoParams, OpenApi};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_cards_handler,
        get_card_handler,
        create_card_handler,
        update_card_handler,
        delete_card_handler,
        list_tags_handler,
        create_tag_handler,
        update_tag_handler,
        delete_tag_handler,
    ),
    tags(
        (name = "Card Archive API", description = "Save, tag and browse cards.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Request Parameters
//=========================================================================================

/// Query string of `GET /cards`. Omitted filters mean "any".
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CardListParams {
    /// Substring matched against title and description.
    pub search: Option<String>,
    pub is_read: Option<bool>,
    pub is_favorite: Option<bool>,
    /// `created_at` (default) or `title`.
    #[param(value_type = Option<String>)]
    pub sort_by: Option<SortKey>,
    /// `asc` or `desc` (default).
    #[param(value_type = Option<String>)]
    pub sort_order: Option<SortOrder>,
    /// 1-based page number.
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl CardListParams {
    fn into_request(self) -> (CardQuery, u32, u32) {
        let query = CardQuery {
            search: self.search,
            is_read: self.is_read,
            is_favorite: self.is_favorite,
            sort_by: self.sort_by.unwrap_or_default(),
            sort_order: self.sort_order.unwrap_or_default(),
        };
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(PAGE_SIZE).clamp(1, STATS_LIMIT);
        (query, page, limit)
    }
}

/// Turns a gateway failure into a status and a message fit for the client.
fn reject(err: GatewayError) -> (StatusCode, String) {
    match err {
        GatewayError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
        GatewayError::Unauthenticated => (StatusCode::UNAUTHORIZED, "Not signed in".to_string()),
        GatewayError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        GatewayError::Backend(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "The archive could not be updated".to_string(),
        ),
    }
}

//=========================================================================================
// Card Handlers
//=========================================================================================

/// List one page of cards.
#[utoipa::path(
    get,
    path = "/cards",
    params(CardListParams),
    responses(
        (status = 200, description = "Envelope with the page of cards and its pagination block"),
        (status = 401, description = "No valid session")
    )
)]
pub async fn list_cards_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AppSession>,
    Query(params): Query<CardListParams>,
) -> impl IntoResponse {
    let (query, page, limit) = params.into_request();
    Json(state.gateway_for(session).list_cards(&query, page, limit).await)
}

/// Fetch a single card.
#[utoipa::path(
    get,
    path = "/cards/{card_id}",
    params(("card_id" = Uuid, Path, description = "The card to fetch.")),
    responses(
        (status = 200, description = "Envelope with the card, or null when it could not be loaded"),
        (status = 401, description = "No valid session")
    )
)]
pub async fn get_card_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AppSession>,
    Path(card_id): Path<Uuid>,
) -> impl IntoResponse {
    Json(state.gateway_for(session).get_card(card_id).await)
}

/// Save a new card.
#[utoipa::path(
    post,
    path = "/cards",
    request_body(content_type = "application/json", description = "Title (required), optional metadata and tag ids."),
    responses(
        (status = 201, description = "Card created; `tag_link_error` is set when its tags could not be attached"),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "No valid session"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_card_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AppSession>,
    Json(draft): Json<CardDraft>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let created = state
        .gateway_for(session)
        .create_card(draft)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update some fields of a card, including its tag set.
#[utoipa::path(
    patch,
    path = "/cards/{card_id}",
    params(("card_id" = Uuid, Path, description = "The card to update.")),
    request_body(content_type = "application/json", description = "Fields to change; `tag_ids` replaces the tag set."),
    responses(
        (status = 200, description = "The updated card; `tag_link_error` is set when its new tags could not be attached"),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "No such card"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn update_card_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AppSession>,
    Path(card_id): Path<Uuid>,
    Json(patch): Json<CardPatch>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let updated = state
        .gateway_for(session)
        .update_card(card_id, patch)
        .await
        .map_err(reject)?;
    Ok(Json(updated))
}

/// Delete a card and its tag associations.
#[utoipa::path(
    delete,
    path = "/cards/{card_id}",
    params(("card_id" = Uuid, Path, description = "The card to delete.")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "No such card"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn delete_card_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AppSession>,
    Path(card_id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .gateway_for(session)
        .delete_card(card_id)
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Tag Handlers
//=========================================================================================

/// List the caller's tags.
#[utoipa::path(
    get,
    path = "/tags",
    responses(
        (status = 200, description = "Envelope with the caller's tags"),
        (status = 401, description = "No valid session")
    )
)]
pub async fn list_tags_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AppSession>,
) -> impl IntoResponse {
    Json(state.gateway_for(session).list_tags().await)
}

/// Create a tag.
#[utoipa::path(
    post,
    path = "/tags",
    request_body(content_type = "application/json", description = "Name and color."),
    responses(
        (status = 201, description = "Tag created"),
        (status = 400, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_tag_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AppSession>,
    Json(draft): Json<TagDraft>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let tag = state
        .gateway_for(session)
        .create_tag(draft)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(tag)))
}

/// Rename or recolor a tag.
#[utoipa::path(
    patch,
    path = "/tags/{tag_id}",
    params(("tag_id" = Uuid, Path, description = "The tag to update.")),
    request_body(content_type = "application/json", description = "New name and/or color."),
    responses(
        (status = 200, description = "The updated tag"),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "No such tag"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn update_tag_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AppSession>,
    Path(tag_id): Path<Uuid>,
    Json(patch): Json<TagPatch>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let tag = state
        .gateway_for(session)
        .update_tag(tag_id, patch)
        .await
        .map_err(reject)?;
    Ok(Json(tag))
}

/// Delete a tag. Cards carrying it are kept and lose the tag.
#[utoipa::path(
    delete,
    path = "/tags/{tag_id}",
    params(("tag_id" = Uuid, Path, description = "The tag to delete.")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "No such tag"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn delete_tag_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AppSession>,
    Path(tag_id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .gateway_for(session)
        .delete_tag(tag_id)
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}
