//! Stream trait definitions
//!
//! The protocol readers never care which transport carried the bytes. They
//! work against any bidirectional, unpinned async byte stream; the acquirer
//! erases the concrete socket type behind [`BoxedStream`].
//!
//! # Examples
//!
//! ```rust
//! use mcrouter_stats::transport::{BoxedStream, StatsStream};
//!
//! fn erase<S: StatsStream + 'static>(stream: S) -> BoxedStream {
//!     Box::new(stream)
//! }
//!
//! let (client, _server) = tokio::io::duplex(64);
//! let _stream: BoxedStream = erase(client);
//! ```

use tokio::io::{AsyncRead, AsyncWrite};

/// A bidirectional byte stream to an mcrouter instance.
///
/// Implemented for every type that is `AsyncRead + AsyncWrite + Unpin + Send`,
/// which covers `TcpStream`, `UnixStream`, `DuplexStream` and test mocks.
pub trait StatsStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> StatsStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Type-erased stream returned by [`Endpoint::connect`](super::Endpoint::connect).
pub type BoxedStream = Box<dyn StatsStream>;

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn test_boxed_stream_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<BoxedStream>();
    }

    #[tokio::test]
    async fn test_boxed_stream_round_trips_bytes() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut stream: BoxedStream = Box::new(client);

        stream.write_all(b"stats all\r\n").await.unwrap();

        let mut received = [0u8; 11];
        server.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"stats all\r\n");
    }
}
