//! Error types for the stats protocol client.
//!
//! Every reader either returns its complete result or one of these errors;
//! no partial mapping is ever handed back.
//!
//! # Error Taxonomy
//!
//! ```text
//! StatsError
//! ├── connectivity: Connect, ConnectTimeout, Io, Closed, ReadTimeout
//! ├── protocol:     Protocol, Corrupt
//! └── caller:       InvalidKey
//! ```
//!
//! Connectivity errors end the current scrape. Protocol errors are raised by
//! the strict parsers (aggregate line shape, admin `VALUE` header and value
//! terminator); the per-destination reader skips malformed tokens instead.

use std::time::Duration;
use thiserror::Error;

use crate::transport::Endpoint;

/// Result type alias for stats protocol operations.
pub type Result<T> = std::result::Result<T, StatsError>;

/// Errors raised while talking to an mcrouter instance.
#[derive(Debug, Error)]
pub enum StatsError {
    /// Dialing the endpoint failed (refused, unreachable, missing socket).
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: Endpoint,
        #[source]
        source: std::io::Error,
    },

    /// Dialing the endpoint did not complete within the connect timeout.
    #[error("timed out connecting to {endpoint} after {timeout:?}")]
    ConnectTimeout { endpoint: Endpoint, timeout: Duration },

    /// I/O error while writing a command or reading a reply.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The upstream closed the stream before the reply was complete.
    #[error("connection closed before end of reply")]
    Closed,

    /// A single read exceeded the configured read deadline.
    #[error("read timed out after {0:?}")]
    ReadTimeout(Duration),

    /// The admin key cannot be sent as a single command token.
    #[error("invalid admin key: {0:?}")]
    InvalidKey(String),

    /// A reply line did not match the expected grammar.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A value body was not followed by the expected line terminator.
    #[error("corrupt reply: {0}")]
    Corrupt(String),
}

impl StatsError {
    /// Returns `true` for failures of the stream itself rather than of the
    /// reply's content.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            StatsError::Connect { .. }
                | StatsError::ConnectTimeout { .. }
                | StatsError::Io(_)
                | StatsError::Closed
                | StatsError::ReadTimeout(_)
        )
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        StatsError::Protocol(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_classification() {
        assert!(StatsError::Closed.is_connectivity());
        assert!(StatsError::ReadTimeout(Duration::from_secs(1)).is_connectivity());
        assert!(
            StatsError::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe)).is_connectivity()
        );
        assert!(!StatsError::protocol("bad line").is_connectivity());
        assert!(!StatsError::Corrupt("bad tail".to_string()).is_connectivity());
    }

    #[test]
    fn test_connect_error_display_names_endpoint() {
        let err = StatsError::Connect {
            endpoint: Endpoint::parse("localhost:5000"),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        };
        let message = err.to_string();
        assert!(message.contains("tcp://localhost:5000"));
    }

    #[test]
    fn test_connect_timeout_display() {
        let err = StatsError::ConnectTimeout {
            endpoint: Endpoint::parse("/var/run/mcrouter.sock"),
            timeout: Duration::from_millis(250),
        };
        assert_eq!(
            err.to_string(),
            "timed out connecting to unix:///var/run/mcrouter.sock after 250ms"
        );
    }
}
