use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use std::time::Instant;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::models::SecurityStatus;
use crate::state::AppState;

// Read-only view of the limiter, disabled unless an admin token is configured
pub async fn security_status_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let Some(token) = state.admin_token.as_deref() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if !token_matches(bearer_token(&headers), token) {
        warn!("Rejected security status request without valid admin token");
        return (StatusCode::UNAUTHORIZED, "admin authorization required").into_response();
    }

    Json(SecurityStatus::collect(&state, Instant::now(), chrono::Utc::now())).into_response()
}

fn token_matches(provided: Option<&str>, expected: &str) -> bool {
    provided.is_some_and(|p| p.as_bytes().ct_eq(expected.as_bytes()).into())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}
