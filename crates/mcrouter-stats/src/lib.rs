//! # mcrouter stats client
//!
//! An async client for the text stats protocol spoken by mcrouter, the
//! memcached protocol router.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use mcrouter_stats::{parse_stat, Endpoint, StatsClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let endpoint = Endpoint::parse("/var/run/mcrouter/mcrouter.sock");
//!     let mut client = StatsClient::connect(&endpoint, Duration::from_secs(1)).await?;
//!
//!     let stats = client.stats().await?;
//!     println!("uptime: {}s", parse_stat(&stats, "uptime"));
//!
//!     for (destination, fields) in client.server_stats().await? {
//!         println!("{destination}: {}", parse_stat(&fields, "avg_latency"));
//!     }
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`transport`]: endpoints, dialing and the shared line reader
//! - [`protocol`]: the `stats all`, `stats servers` and `get` reply readers
//! - [`client`]: one session per scrape, wrapping the readers
//! - [`coerce`]: string-to-number conversion for stat values
//! - [`error`]: error types

#![warn(clippy::all)]

pub mod client;
pub mod coerce;
pub mod error;
pub mod protocol;
pub mod transport;

// Re-export commonly used types at crate root
pub use client::StatsClient;
pub use coerce::{parse_stat, parse_value};
pub use error::{Result, StatsError};
pub use protocol::{AdminValue, ServerStatMap, StatMap};
pub use transport::Endpoint;
