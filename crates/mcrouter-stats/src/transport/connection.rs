//! Line-oriented connection over a byte stream.
//!
//! mcrouter speaks a memcached-style text protocol: one command line out,
//! a sequence of CRLF-terminated lines back, closed by `END\r\n`. Admin
//! values additionally carry a raw body of a declared length.
//!
//! A [`Connection`] owns the single read buffer for its stream. All readers
//! of one scrape must share it, otherwise bytes buffered ahead by one reply
//! would be invisible to the next.
//!
//! # Examples
//!
//! ```rust
//! use mcrouter_stats::transport::Connection;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> mcrouter_stats::Result<()> {
//! let stream = tokio_test::io::Builder::new()
//!     .write(b"stats all\r\n")
//!     .read(b"STAT pid 1\r\nEND\r\n")
//!     .build();
//!
//! let mut conn = Connection::new(stream);
//! conn.send_command("stats all").await?;
//!
//! assert_eq!(conn.read_reply_line().await?.as_deref(), Some("STAT pid 1\r\n"));
//! assert_eq!(conn.read_reply_line().await?, None);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::trace;

use crate::error::{Result, StatsError};
use crate::protocol::{END_LINE, TERMINATOR};

/// Upper bound on a single value body.
///
/// A garbled size field must not turn into an arbitrarily large allocation.
pub const MAX_VALUE_LEN: usize = 64 * 1024 * 1024;

/// Upper bound on a single reply line, terminator included.
pub const MAX_LINE_LEN: usize = 1024 * 1024;

/// Buffered, line-oriented view of one upstream stream.
///
/// Not meant for concurrent use: each command must have its reply fully
/// drained before the next command is sent.
#[derive(Debug)]
pub struct Connection<S> {
    inner: BufReader<S>,
    read_timeout: Option<Duration>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a freshly opened stream. No read deadline is applied.
    pub fn new(stream: S) -> Self {
        Self {
            inner: BufReader::new(stream),
            read_timeout: None,
        }
    }

    /// Bounds every individual read (one line, or one value body).
    ///
    /// `None` restores the default of waiting indefinitely.
    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Returns the configured read deadline.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// Writes `command` followed by the line terminator and flushes.
    pub async fn send_command(&mut self, command: &str) -> Result<()> {
        trace!(command, "sending command");

        let mut line = String::with_capacity(command.len() + TERMINATOR.len());
        line.push_str(command);
        line.push_str(TERMINATOR);

        let stream = self.inner.get_mut();
        stream.write_all(line.as_bytes()).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Reads one line, terminator included.
    ///
    /// A stream that ends before a newline is seen counts as closed, even if
    /// a partial line was received. A line longer than [`MAX_LINE_LEN`] is a
    /// protocol error.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut buf = Vec::new();
        let mut limited = (&mut self.inner).take(MAX_LINE_LEN as u64);
        with_deadline(self.read_timeout, limited.read_until(b'\n', &mut buf)).await?;

        if !buf.ends_with(b"\n") {
            if buf.len() >= MAX_LINE_LEN {
                return Err(StatsError::protocol(format!(
                    "reply line exceeds limit of {MAX_LINE_LEN} bytes"
                )));
            }
            return Err(StatsError::Closed);
        }

        String::from_utf8(buf)
            .map_err(|e| StatsError::protocol(format!("reply line is not valid UTF-8: {e}")))
    }

    /// Reads one line of a multi-line reply.
    ///
    /// Returns `None` once the `END` sentinel line has been consumed.
    pub async fn read_reply_line(&mut self) -> Result<Option<String>> {
        let line = self.read_line().await?;
        if line == END_LINE {
            return Ok(None);
        }
        Ok(Some(line))
    }

    /// Reads exactly `len` bytes.
    pub async fn read_exact(&mut self, len: usize) -> Result<Vec<u8>> {
        if len > MAX_VALUE_LEN {
            return Err(StatsError::protocol(format!(
                "value length {len} exceeds limit of {MAX_VALUE_LEN} bytes"
            )));
        }

        let mut buf = vec![0u8; len];
        with_deadline(self.read_timeout, self.inner.read_exact(&mut buf))
            .await
            .map_err(|e| match e {
                StatsError::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                    StatsError::Closed
                }
                other => other,
            })?;
        Ok(buf)
    }

    /// Shuts down the write half of the stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.get_mut().shutdown().await?;
        Ok(())
    }
}

async fn with_deadline<F, T>(limit: Option<Duration>, io: F) -> Result<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, io)
            .await
            .map_err(|_| StatsError::ReadTimeout(limit))?
            .map_err(StatsError::from),
        None => io.await.map_err(StatsError::from),
    }
}
