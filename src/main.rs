use clap::Parser;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use storefront_gateway::build_router;
use storefront_gateway::config::Args;
use storefront_gateway::state::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // parse cli arguments
    let args = Args::parse();

    let state = match AppState::from_args(&args) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Refusing to start: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        "Rate limit: {} requests per {} seconds, block for {} seconds",
        state.config.max_requests,
        state.config.window.as_secs(),
        state.config.block_duration.as_secs()
    );
    info!("Rate limit bypass prefixes: {:?}", state.config.bypass_prefixes);
    info!(
        "User-Agent filter: {} deny markers, {} browser tokens",
        state.classifier.deny_len(),
        state.classifier.allow_len()
    );
    match state.upstream.as_ref() {
        Some(upstream) => info!("Forwarding admitted requests to {}", upstream.base_url()),
        None => info!("No upstream configured, unmatched routes answer 404"),
    }
    if state.admin_token.is_none() {
        info!("ADMIN_TOKEN not set, /admin/security-status is disabled");
    }

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {addr}: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!("Gateway running on http://localhost:{}", args.port);

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    if let Err(e) = served {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Gateway shut down");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
