//! Tracing subscriber setup.

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;

/// Builds the event filter. `RUST_LOG` wins over `default_level`.
pub fn build_filter(default_level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_level)
            .with_context(|| format!("invalid log level {default_level:?}")),
    }
}

/// Installs the global subscriber. Call once, early in `main`.
pub fn init_logging(default_level: &str, format: LogFormat) -> Result<()> {
    let filter = build_filter(default_level)?;
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    }
    .context("failed to install tracing subscriber")
}
