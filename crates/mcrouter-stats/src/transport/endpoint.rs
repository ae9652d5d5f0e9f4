//! Upstream endpoint addressing and stream acquisition.
//!
//! mcrouter listens either on a TCP port or on a unix domain socket. The
//! address string alone decides which: anything containing a path separator
//! is a socket path, everything else is a `host:port` pair.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::debug;

use super::traits::BoxedStream;
use crate::error::{Result, StatsError};

/// Where the upstream mcrouter instance can be reached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `host:port`, resolved at connect time.
    Tcp(String),
    /// Filesystem path of a unix domain socket.
    Unix(PathBuf),
}

impl Endpoint {
    /// Classifies an address string.
    ///
    /// ```
    /// use mcrouter_stats::transport::Endpoint;
    ///
    /// assert!(matches!(Endpoint::parse("localhost:5000"), Endpoint::Tcp(_)));
    /// assert!(matches!(Endpoint::parse("/run/mcrouter.sock"), Endpoint::Unix(_)));
    /// ```
    pub fn parse(address: &str) -> Self {
        if address.contains('/') {
            Endpoint::Unix(PathBuf::from(address))
        } else {
            Endpoint::Tcp(address.to_string())
        }
    }

    /// Opens a new stream to the endpoint.
    ///
    /// `timeout` bounds the whole dial, including name resolution. Failures
    /// are returned as-is; there is no retry.
    pub async fn connect(&self, timeout: Duration) -> Result<BoxedStream> {
        debug!(endpoint = %self, ?timeout, "connecting to mcrouter");

        match self {
            Endpoint::Tcp(address) => {
                let stream = tokio::time::timeout(timeout, TcpStream::connect(address.as_str()))
                    .await
                    .map_err(|_| self.timed_out(timeout))?
                    .map_err(|source| self.dial_failed(source))?;
                Ok(Box::new(stream))
            }
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                let stream = tokio::time::timeout(timeout, tokio::net::UnixStream::connect(path))
                    .await
                    .map_err(|_| self.timed_out(timeout))?
                    .map_err(|source| self.dial_failed(source))?;
                Ok(Box::new(stream))
            }
            #[cfg(not(unix))]
            Endpoint::Unix(_) => Err(self.dial_failed(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "unix domain sockets are not supported on this platform",
            ))),
        }
    }

    fn timed_out(&self, timeout: Duration) -> StatsError {
        StatsError::ConnectTimeout {
            endpoint: self.clone(),
            timeout,
        }
    }

    fn dial_failed(&self, source: std::io::Error) -> StatsError {
        StatsError::Connect {
            endpoint: self.clone(),
            source,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(address) => write!(f, "tcp://{address}"),
            Endpoint::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

impl From<&str> for Endpoint {
    fn from(address: &str) -> Self {
        Endpoint::parse(address)
    }
}
