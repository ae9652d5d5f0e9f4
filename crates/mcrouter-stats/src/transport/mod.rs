//! Transport Layer
//!
//! Everything below the reply grammar: where the upstream lives, how a
//! stream to it is opened, and how that stream is read one line at a time.
//!
//! # Components
//!
//! - [`Endpoint`]: `host:port` or unix socket path, and the dial with a
//!   connect timeout
//! - [`StatsStream`] / [`BoxedStream`]: the byte-stream seam every reader
//!   works against
//! - [`Connection`]: the shared line reader, command writer and optional
//!   read deadline
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use mcrouter_stats::transport::{Connection, Endpoint};
//!
//! # async fn example() -> mcrouter_stats::Result<()> {
//! let stream = Endpoint::parse("localhost:5000")
//!     .connect(Duration::from_secs(1))
//!     .await?;
//! let mut conn = Connection::new(stream);
//! conn.send_command("stats all").await?;
//! while let Some(line) = conn.read_reply_line().await? {
//!     print!("{line}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod endpoint;
pub mod traits;

pub use connection::{Connection, MAX_LINE_LEN, MAX_VALUE_LEN};
pub use endpoint::Endpoint;
pub use traits::{BoxedStream, StatsStream};
