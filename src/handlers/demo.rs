use axum::{Json, extract::State, response::IntoResponse};
use std::sync::Arc;

use crate::state::AppState;

// Describes the active limits so operators can exercise them by hand
pub async fn ddos_simulation_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let limiter = &state.limiter;
    Json(serde_json::json!({
        "message": "Send more requests than the limit within one window to trigger a block",
        "protection_active": true,
        "rate_limit": limiter.max_requests(),
        "window_seconds": limiter.window().as_secs(),
        "block_duration_seconds": limiter.block_duration().as_secs(),
        "security_headers": {
            "x-admission-protection": "active",
            "x-ratelimit-limit": format!(
                "{} per {} seconds",
                limiter.max_requests(),
                limiter.window().as_secs()
            )
        }
    }))
}

pub async fn suspicious_agent_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "This endpoint is reachable only with a browser User-Agent",
        "note": "Retry with a User-Agent containing 'bot' or 'scraper' to see a 403"
    }))
}
