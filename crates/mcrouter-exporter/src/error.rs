//! Error types for the exporter.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Rejected command line or environment configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("mcrouter address must not be empty")]
    EmptyAddress,

    #[error("mcrouter connect timeout must be greater than zero")]
    ZeroTimeout,

    #[error("mcrouter read timeout must be greater than zero")]
    ZeroReadTimeout,

    #[error("web listen address must not be empty")]
    EmptyListenAddress,

    #[error("telemetry path {0:?} must start with '/' and must not be '/'")]
    InvalidTelemetryPath(String),
}

/// Failure to render a scrape as text exposition.
#[derive(Debug, Error)]
#[error("failed to encode metrics: {0}")]
pub struct EncodeError(#[from] pub prometheus::Error);

impl IntoResponse for EncodeError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
    }
}
