use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::identity::ClientIdentity;
use crate::state::AppState;

// Everything the gateway does not serve itself goes to the storefront
pub async fn proxy_handler(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let Some(upstream) = state.upstream.as_ref() else {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    };

    let client = ClientIdentity::from_request(&request).key;
    match upstream.forward(&client, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}
