// Limiter state is per process: N gateways allow N times the limit per client.

use axum::{Router, routing::get};
use std::sync::Arc;

pub mod agent;
pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod state;
pub mod upstream;

use handlers::{
    ddos_simulation_handler, health_handler, metrics_handler, proxy_handler,
    security_status_handler, suspicious_agent_handler,
};
use state::AppState;

// Serve with `into_make_service_with_connect_info::<SocketAddr>()`, otherwise
// every client shares the "unknown" rate-limit partition
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/admin/security-status", get(security_status_handler))
        .route("/test/ddos-simulation", get(ddos_simulation_handler))
        .route("/test/suspicious-agent", get(suspicious_agent_handler))
        .fallback(proxy_handler)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::admission_middleware,
        ))
        .with_state(state)
}
