pub mod middleware;
pub mod rest;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{get, patch},
    Router,
};
use std::sync::Arc;

pub use middleware::require_auth;
pub use state::AppState;

/// Every archive route, behind the auth middleware.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/cards",
            get(rest::list_cards_handler).post(rest::create_card_handler),
        )
        .route(
            "/cards/{card_id}",
            get(rest::get_card_handler)
                .patch(rest::update_card_handler)
                .delete(rest::delete_card_handler),
        )
        .route(
            "/tags",
            get(rest::list_tags_handler).post(rest::create_tag_handler),
        )
        .route(
            "/tags/{tag_id}",
            patch(rest::update_tag_handler).delete(rest::delete_tag_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ))
        .with_state(state)
}
