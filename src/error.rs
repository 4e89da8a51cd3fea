use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

// Startup configuration problems - protection is never silently disabled
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    NonPositive { field: &'static str },

    #[error("{field} must not exceed {max_secs} seconds")]
    TooLarge { field: &'static str, max_secs: u64 },

    #[error("idle retention ({retention}s) must not be shorter than the window ({window}s)")]
    RetentionShorterThanWindow { retention: u64, window: u64 },
}

// Anything that stops the gateway from starting
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Invalid admission config: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid upstream: {0}")]
    Upstream(#[from] GatewayError),
}

// Errors raised while forwarding an admitted request upstream
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Request body could not be read: {0}")]
    Body(#[from] axum::Error),

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Invalid upstream url: {0}")]
    InvalidUrl(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match self {
            GatewayError::Body(_) => StatusCode::BAD_REQUEST,
            GatewayError::Upstream(_) | GatewayError::InvalidUrl(_) => StatusCode::BAD_GATEWAY,
        };

        (status, self.to_string()).into_response()
    }
}
