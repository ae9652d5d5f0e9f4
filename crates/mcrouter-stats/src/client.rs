//! Scrape-scoped client session.
//!
//! A [`StatsClient`] owns one stream for the length of one scrape. The
//! readers run against it in sequence, sharing the same read buffer, and the
//! stream is released when the client is closed or dropped, whichever exit
//! path the scrape takes.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::error::Result;
use crate::protocol::{self, AdminValue, ServerStatMap, StatMap};
use crate::transport::{BoxedStream, Connection, Endpoint};

/// One open session with an mcrouter instance.
///
/// # Examples
///
/// ```rust,no_run
/// use std::time::Duration;
/// use mcrouter_stats::{Endpoint, StatsClient};
///
/// # async fn example() -> mcrouter_stats::Result<()> {
/// let endpoint = Endpoint::parse("localhost:5000");
/// let mut client = StatsClient::connect(&endpoint, Duration::from_secs(1)).await?;
///
/// let stats = client.stats().await?;
/// let servers = client.server_stats().await?;
/// let version = client.admin_value("__mcrouter__.version").await?;
///
/// println!("{} stats, {} destinations, version {:?}", stats.len(), servers.len(), version);
/// client.close().await
/// # }
/// ```
#[derive(Debug)]
pub struct StatsClient<S = BoxedStream> {
    conn: Connection<S>,
}

impl StatsClient<BoxedStream> {
    /// Dials `endpoint` and wraps the new stream.
    pub async fn connect(endpoint: &Endpoint, connect_timeout: Duration) -> Result<Self> {
        let stream = endpoint.connect(connect_timeout).await?;
        debug!(%endpoint, "connected to mcrouter");
        Ok(Self::from_stream(stream))
    }
}

impl<S> StatsClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an already open stream.
    pub fn from_stream(stream: S) -> Self {
        Self {
            conn: Connection::new(stream),
        }
    }

    /// Bounds each individual read; see [`Connection::with_read_timeout`].
    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.conn = self.conn.with_read_timeout(read_timeout);
        self
    }

    /// Reads every aggregate stat (`stats all`).
    pub async fn stats(&mut self) -> Result<StatMap> {
        protocol::read_stats(&mut self.conn).await
    }

    /// Reads per-destination stats (`stats servers`).
    pub async fn server_stats(&mut self) -> Result<ServerStatMap> {
        protocol::read_server_stats(&mut self.conn).await
    }

    /// Reads one admin value (`get <key>`); `None` when the key is unknown.
    pub async fn admin_value(&mut self, key: &str) -> Result<Option<AdminValue>> {
        protocol::read_admin_value(&mut self.conn, key).await
    }

    /// Shuts the stream down and releases it.
    pub async fn close(mut self) -> Result<()> {
        self.conn.shutdown().await
    }
}
