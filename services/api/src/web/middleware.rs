//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use archive_core::session::AppSession;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;

use crate::web::state::AppState;

/// Middleware that resolves the auth provider's session cookie into an
/// `AppSession`.
///
/// If valid, inserts the session into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| session_token(cookies, &state.config.session_cookie))
        .map(str::to_string)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let user_id = state.sessions.resolve_session(&token).await.map_err(|e| {
        warn!("Rejected session token: {:?}", e);
        StatusCode::UNAUTHORIZED
    })?;

    req.extensions_mut().insert(AppSession::new(user_id, token));
    Ok(next.run(req).await)
}

/// Finds `name=value` in a `Cookie` header. Empty values count as absent.
pub fn session_token<'a>(cookies: &'a str, name: &str) -> Option<&'a str> {
    cookies
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}
