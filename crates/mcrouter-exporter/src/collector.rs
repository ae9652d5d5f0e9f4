//! Scrape collector.
//!
//! Each call to [`Collector::scrape`] opens its own session with mcrouter,
//! runs the enabled readers in order and turns the results into metrics:
//!
//! 1. `stats all`, always
//! 2. `stats servers`, with `--mcrouter-server-metrics`
//! 3. the admin keys, with `--mcrouter-admin-requests`
//!
//! If the session cannot be opened or the first step fails, the scrape
//! reports `mcrouter_up 0` and nothing else. A failure in a later step stops
//! the scrape; the metrics gathered so far are still reported, next to
//! `mcrouter_up 0`.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use mcrouter_stats::{
    parse_stat, parse_value, AdminValue, Endpoint, ServerStatMap, StatMap, StatsClient,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error};

use crate::config::ExporterConfig;
use crate::metrics::{self, ScrapeMetrics};

/// Collects one [`ScrapeMetrics`] per scrape from a single mcrouter.
#[derive(Debug, Clone)]
pub struct Collector {
    endpoint: Endpoint,
    connect_timeout: Duration,
    read_timeout: Option<Duration>,
    server_metrics: bool,
    admin_requests: bool,
}

impl Collector {
    pub fn new(endpoint: Endpoint, connect_timeout: Duration) -> Self {
        Self {
            endpoint,
            connect_timeout,
            read_timeout: None,
            server_metrics: false,
            admin_requests: false,
        }
    }

    pub fn from_config(config: &ExporterConfig) -> Self {
        Self::new(config.endpoint(), config.connect_timeout)
            .with_read_timeout(config.read_timeout)
            .with_server_metrics(config.server_metrics)
            .with_admin_requests(config.admin_requests)
    }

    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn with_server_metrics(mut self, enabled: bool) -> Self {
        self.server_metrics = enabled;
        self
    }

    pub fn with_admin_requests(mut self, enabled: bool) -> Self {
        self.admin_requests = enabled;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Runs one complete scrape. Never fails; failures show up as `up 0`.
    pub async fn scrape(&self) -> ScrapeMetrics {
        let mut gathered = ScrapeMetrics::new();

        let up = match self.try_scrape(&mut gathered).await {
            Ok(()) => 1.0,
            Err(e) => {
                error!(
                    endpoint = %self.endpoint,
                    error = %format!("{e:#}"),
                    "failed to collect stats from mcrouter"
                );
                0.0
            }
        };

        let mut metrics = ScrapeMetrics::new();
        metrics.push(&metrics::UP, up);
        metrics.append(gathered);
        metrics
    }

    async fn try_scrape(&self, metrics: &mut ScrapeMetrics) -> Result<()> {
        let client = StatsClient::connect(&self.endpoint, self.connect_timeout)
            .await
            .context("failed to connect")?;
        let mut client = client.with_read_timeout(self.read_timeout);

        self.collect(&mut client, metrics).await?;

        if let Err(e) = client.close().await {
            debug!(error = %e, "failed to shut down mcrouter connection");
        }
        Ok(())
    }

    /// Runs the enabled readers over an open session.
    pub async fn collect<S>(&self, client: &mut StatsClient<S>, metrics: &mut ScrapeMetrics) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let stats = client.stats().await.context("failed to read stats")?;
        record_stats(&stats, metrics);

        if self.server_metrics {
            let servers = client
                .server_stats()
                .await
                .context("failed to read server stats")?;
            record_server_stats(&servers, metrics);
        }

        if self.admin_requests {
            collect_admin(client, metrics).await?;
        }

        Ok(())
    }
}

/// Records every aggregate metric from a `stats all` reply.
pub fn record_stats(stats: &StatMap, metrics: &mut ScrapeMetrics) {
    metrics.push_labeled(&metrics::VERSION, label(stats, "version"), 1.0);
    metrics.push_labeled(&metrics::COMMAND_ARGS, label(stats, "commandargs"), 1.0);

    for (desc, key) in metrics::AGGREGATE_STATS {
        metrics.push(desc, parse_stat(stats, key));
    }

    for fan_out in metrics::AGGREGATE_FAN_OUTS {
        for (desc, label_value, key) in fan_out.entries() {
            metrics.push_labeled(desc, label_value, parse_stat(stats, &key));
        }
    }

    let cpu_seconds = metrics::CPU_TIME_STATS
        .iter()
        .map(|key| parse_stat(stats, key))
        .sum();
    metrics.push(&metrics::CPU_SECONDS, cpu_seconds);
}

/// Records the per-destination metrics from a `stats servers` reply.
pub fn record_server_stats(servers: &ServerStatMap, metrics: &mut ScrapeMetrics) {
    let mut destinations: Vec<&String> = servers.keys().collect();
    destinations.sort();

    for (desc, field) in metrics::SERVER_STATS {
        for destination in &destinations {
            let value = parse_stat(&servers[*destination], field);
            metrics.push_labeled(desc, destination, value);
        }
    }
}

async fn collect_admin<S>(client: &mut StatsClient<S>, metrics: &mut ScrapeMetrics) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let version = admin_text(client, metrics::ADMIN_VERSION_KEY).await?;
    metrics.push_labeled(&metrics::ADMIN_VERSION, &version, 1.0);

    let config_age = admin_text(client, metrics::ADMIN_CONFIG_AGE_KEY).await?;
    let config_age = parse_value(&config_age)
        .ok_or_else(|| anyhow!("config age {config_age:?} is not a number"))?;
    metrics.push(&metrics::ADMIN_CONFIG_AGE, config_age);

    for (desc, key) in [
        (&metrics::ADMIN_CONFIG_FILE, metrics::ADMIN_CONFIG_FILE_KEY),
        (&metrics::ADMIN_HOSTID, metrics::ADMIN_HOSTID_KEY),
        (&metrics::ADMIN_CONFIG_MD5_DIGEST, metrics::ADMIN_CONFIG_MD5_DIGEST_KEY),
    ] {
        let value = admin_text(client, key).await?;
        metrics.push_labeled(desc, &value, 1.0);
    }

    Ok(())
}

/// Reads an admin value as text. A miss reads as the empty string.
async fn admin_text<S>(client: &mut StatsClient<S>, key: &str) -> Result<String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let value: Option<AdminValue> = client
        .admin_value(key)
        .await
        .with_context(|| format!("failed to read {key}"))?;

    if value.is_none() {
        debug!(key, "admin key not known to mcrouter");
    }
    Ok(String::from_utf8_lossy(value.as_deref().unwrap_or_default()).into_owned())
}

fn label<'a>(stats: &'a StatMap, key: &str) -> &'a str {
    stats.get(key).map(String::as_str).unwrap_or_default()
}
