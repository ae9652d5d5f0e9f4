//! HTTP listener.
//!
//! Serves the text exposition on the telemetry path and a small landing page
//! on `/`. Every request to the telemetry path runs its own scrape.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use prometheus::TEXT_FORMAT;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{debug, info, warn};

use crate::collector::Collector;
use crate::config::ExporterConfig;
use crate::error::EncodeError;

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    collector: Arc<Collector>,
    telemetry_path: Arc<str>,
}

impl AppState {
    pub fn new(collector: Collector, telemetry_path: &str) -> Self {
        Self {
            collector: Arc::new(collector),
            telemetry_path: Arc::from(telemetry_path),
        }
    }
}

/// Builds the router for the given state.
pub fn router(state: AppState) -> Router {
    let telemetry_path = state.telemetry_path.to_string();

    Router::new()
        .route("/", get(landing_page))
        .route(&telemetry_path, get(metrics_handler))
        .with_state(state)
}

async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse, EncodeError> {
    let metrics = state.collector.scrape().await;
    let body = metrics.encode()?;
    debug!(bytes = body.len(), "served scrape");

    Ok(([(header::CONTENT_TYPE, TEXT_FORMAT)], body))
}

async fn landing_page(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<html>\n\
         <head><title>mcrouter exporter</title></head>\n\
         <body>\n\
         <h1>mcrouter exporter</h1>\n\
         <p><a href=\"{path}\">Metrics</a></p>\n\
         </body>\n\
         </html>\n",
        path = state.telemetry_path
    ))
}

/// Binds the listen address and serves until SIGINT or SIGTERM.
pub async fn serve(config: &ExporterConfig) -> Result<()> {
    let state = AppState::new(Collector::from_config(config), &config.telemetry_path);
    let app = router(state);

    let listener = TcpListener::bind(&config.listen_address)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_address))?;

    info!(
        address = %listener.local_addr().context("failed to read listen address")?,
        path = %config.telemetry_path,
        mcrouter = %config.endpoint(),
        "listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shut down");
    Ok(())
}

/// Resolves on the first SIGINT (Ctrl+C) or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use mcrouter_stats::Endpoint;
    use std::time::Duration;
    use tower::ServiceExt;

    async fn unreachable_state() -> AppState {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let collector = Collector::new(Endpoint::parse(&address), Duration::from_millis(200));
        AppState::new(collector, "/metrics")
    }

    async fn get_path(app: Router, path: &str) -> (StatusCode, String, Option<String>) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        (status, String::from_utf8(body.to_vec()).unwrap(), content_type)
    }

    #[tokio::test]
    async fn test_landing_page_links_metrics() {
        let app = router(unreachable_state().await);
        let (status, body, _) = get_path(app, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<a href=\"/metrics\">"));
    }

    #[tokio::test]
    async fn test_metrics_when_unreachable() {
        let app = router(unreachable_state().await);
        let (status, body, content_type) = get_path(app, "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some(TEXT_FORMAT));
        assert!(body.contains("mcrouter_up 0"));
        assert!(!body.contains("mcrouter_version"));
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let app = router(unreachable_state().await);
        let (status, _, _) = get_path(app, "/nope").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
