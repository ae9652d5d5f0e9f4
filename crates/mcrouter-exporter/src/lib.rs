//! # mcrouter exporter
//!
//! Prometheus exporter for mcrouter. Each scrape of the telemetry path opens
//! a fresh session with mcrouter, reads its stats over the text protocol and
//! renders them as metrics under the `mcrouter_` namespace.
//!
//! ## Modules
//!
//! - [`config`]: command line and environment configuration
//! - [`logging`]: tracing subscriber setup
//! - [`metrics`]: metric descriptors and the per-scrape metric set
//! - [`collector`]: one scrape against one mcrouter
//! - [`server`]: HTTP listener and graceful shutdown
//! - [`error`]: error types

#![warn(clippy::all)]

pub mod collector;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod server;

pub use collector::Collector;
pub use config::{ExporterConfig, LogFormat};
pub use error::{ConfigError, EncodeError};
pub use metrics::ScrapeMetrics;
