//! Command line and environment configuration.
//!
//! Every flag can also be set through an `MCROUTER_EXPORTER_*` environment
//! variable; an explicit flag wins over the environment.
//!
//! # Examples
//!
//! ```rust
//! use clap::Parser;
//! use mcrouter_exporter::config::ExporterConfig;
//!
//! let config = ExporterConfig::parse_from([
//!     "mcrouter-exporter",
//!     "--mcrouter-address", "/var/run/mcrouter.sock",
//!     "--mcrouter-timeout", "500ms",
//!     "--mcrouter-server-metrics",
//! ]);
//!
//! assert!(config.validate().is_ok());
//! assert!(config.server_metrics);
//! assert_eq!(config.connect_timeout.as_millis(), 500);
//! ```

use std::time::Duration;

use clap::{Parser, ValueEnum};
use mcrouter_stats::Endpoint;

use crate::error::ConfigError;

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Exporter configuration.
#[derive(Parser, Debug, Clone)]
#[command(name = "mcrouter-exporter")]
#[command(about = "Prometheus exporter for mcrouter", long_about = None)]
#[command(version)]
pub struct ExporterConfig {
    /// mcrouter server address (host:port or unix socket path)
    #[arg(long = "mcrouter-address", env = "MCROUTER_EXPORTER_MCROUTER_ADDRESS", default_value = "localhost:5000")]
    pub address: String,

    /// Timeout for connecting to mcrouter (e.g. 500ms, 1s, 2m)
    #[arg(
        long = "mcrouter-timeout",
        env = "MCROUTER_EXPORTER_MCROUTER_TIMEOUT",
        default_value = "1s",
        value_parser = parse_duration
    )]
    pub connect_timeout: Duration,

    /// Deadline for each read from mcrouter; unbounded when unset
    #[arg(
        long = "mcrouter-read-timeout",
        env = "MCROUTER_EXPORTER_MCROUTER_READ_TIMEOUT",
        value_parser = parse_duration
    )]
    pub read_timeout: Option<Duration>,

    /// Collect per-destination metrics (`stats servers`)
    #[arg(long = "mcrouter-server-metrics", env = "MCROUTER_EXPORTER_MCROUTER_SERVER_METRICS")]
    pub server_metrics: bool,

    /// Collect admin request metrics (`get __mcrouter__.*`)
    #[arg(long = "mcrouter-admin-requests", env = "MCROUTER_EXPORTER_MCROUTER_ADMIN_REQUESTS")]
    pub admin_requests: bool,

    /// Address to expose metrics on
    #[arg(long = "web-listen-address", env = "MCROUTER_EXPORTER_WEB_LISTEN_ADDRESS", default_value = "0.0.0.0:9442")]
    pub listen_address: String,

    /// Path under which to expose metrics
    #[arg(long = "web-telemetry-path", env = "MCROUTER_EXPORTER_WEB_TELEMETRY_PATH", default_value = "/metrics")]
    pub telemetry_path: String,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, env = "MCROUTER_EXPORTER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format
    #[arg(long, env = "MCROUTER_EXPORTER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl ExporterConfig {
    /// Checks the values clap cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::EmptyAddress);
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.read_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::ZeroReadTimeout);
        }
        if self.listen_address.trim().is_empty() {
            return Err(ConfigError::EmptyListenAddress);
        }
        if !self.telemetry_path.starts_with('/') || self.telemetry_path == "/" {
            return Err(ConfigError::InvalidTelemetryPath(self.telemetry_path.clone()));
        }
        Ok(())
    }

    /// The upstream mcrouter endpoint.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::parse(self.address.trim())
    }
}

/// Parses a human-readable duration (`500ms`, `1s`, `1h30m`), or a bare
/// number of seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    if let Ok(seconds) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }
    if let Ok(seconds) = raw.parse::<f64>() {
        return Duration::try_from_secs_f64(seconds)
            .map_err(|e| format!("invalid duration {raw:?}: {e}"));
    }

    humantime::parse_duration(raw).map_err(|e| format!("invalid duration {raw:?}: {e}"))
}
