//! mcrouter exporter CLI
//!
//! Exposes mcrouter stats as Prometheus metrics over HTTP.

use anyhow::Result;
use clap::Parser;
use mcrouter_exporter::{logging, server, ExporterConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ExporterConfig::parse();
    config.validate()?;

    logging::init_logging(&config.log_level, config.log_format)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        mcrouter = %config.endpoint(),
        server_metrics = config.server_metrics,
        admin_requests = config.admin_requests,
        "starting mcrouter exporter"
    );

    server::serve(&config).await
}
