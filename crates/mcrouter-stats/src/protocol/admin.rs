//! Admin value reader (`get <key>`).
//!
//! mcrouter answers `get __mcrouter__.<name>` with a regular memcached
//! retrieval reply:
//!
//! ```text
//! VALUE <key> <flags> <size>\r\n
//! <size bytes>\r\n
//! END\r\n
//! ```
//!
//! or just `END\r\n` when the key is unknown.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use super::{AdminValue, TERMINATOR};
use crate::error::{Result, StatsError};
use crate::transport::{Connection, MAX_VALUE_LEN};

/// Retrieval verb used for admin requests.
pub const GET_VERB: &str = "get";

const VALUE_TAG: &str = "VALUE";

/// Header line preceding a value body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueHeader {
    pub key: String,
    pub flags: u32,
    pub size: usize,
}

/// Parses a `VALUE <key> <flags> <size>\r\n` line.
///
/// The line must carry exactly these four fields and its terminator. A size
/// whose body and terminator would not fit in [`MAX_VALUE_LEN`] is rejected.
pub fn parse_value_line(line: &str) -> Result<ValueHeader> {
    let malformed =
        || StatsError::protocol(format!("unexpected line in get response: {line:?}"));

    let body = line.strip_suffix(TERMINATOR).ok_or_else(malformed)?;
    let fields: Vec<&str> = body.split(' ').collect();

    let header = match fields.as_slice() {
        [VALUE_TAG, key, flags, size] if !key.is_empty() => ValueHeader {
            key: key.to_string(),
            flags: flags.parse().map_err(|_| malformed())?,
            size: size.parse().map_err(|_| malformed())?,
        },
        _ => return Err(malformed()),
    };

    if header.size > MAX_VALUE_LEN - TERMINATOR.len() {
        return Err(StatsError::protocol(format!(
            "value size {} for {:?} exceeds limit of {MAX_VALUE_LEN} bytes",
            header.size, header.key
        )));
    }
    Ok(header)
}

/// Sends `get <key>` and returns the value body, or `None` on a miss.
///
/// If the reply somehow carries several values, the last one wins.
pub async fn read_admin_value<S>(conn: &mut Connection<S>, key: &str) -> Result<Option<AdminValue>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    validate_key(key)?;
    conn.send_command(&format!("{GET_VERB} {key}")).await?;

    let mut value = None;
    while let Some(line) = conn.read_reply_line().await? {
        let header = parse_value_line(&line)?;
        if header.key != key {
            warn!(requested = key, returned = %header.key, "admin reply carries a different key");
        }

        let mut body = conn.read_exact(header.size + TERMINATOR.len()).await?;
        if !body.ends_with(TERMINATOR.as_bytes()) {
            return Err(StatsError::Corrupt(format!(
                "value for {:?} is not terminated after {} bytes",
                header.key, header.size
            )));
        }
        body.truncate(header.size);
        value = Some(body);
    }

    debug!(key, hit = value.is_some(), "read admin value");
    Ok(value)
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(StatsError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    fn admin_reply(key: &str, body: &[u8]) -> tokio_test::io::Mock {
        Builder::new()
            .write(format!("get {key}\r\n").as_bytes())
            .read(body)
            .build()
    }

    #[test]
    fn test_parse_value_line() {
        let header = parse_value_line("VALUE __mcrouter__.version 0 6\r\n").unwrap();
        assert_eq!(
            header,
            ValueHeader {
                key: "__mcrouter__.version".to_string(),
                flags: 0,
                size: 6,
            }
        );
    }

    #[test]
    fn test_parse_value_line_rejects_malformed() {
        for line in [
            "VALUE k 0 5",
            "VALUE k 0 5\n",
            "VALUE k 0\r\n",
            "VALUE k 0 5 99\r\n",
            "VALUE k x 5\r\n",
            "VALUE k 0 -1\r\n",
            "VALUE  0 5\r\n",
            "STAT k 0 5\r\n",
            "SERVER_ERROR busy\r\n",
        ] {
            assert!(
                matches!(parse_value_line(line), Err(StatsError::Protocol(_))),
                "{line:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_value_line_rejects_oversized_size() {
        let limit = MAX_VALUE_LEN - TERMINATOR.len();
        assert_eq!(
            parse_value_line(&format!("VALUE k 0 {limit}\r\n")).unwrap().size,
            limit
        );

        for size in [limit + 1, usize::MAX] {
            let line = format!("VALUE k 0 {size}\r\n");
            assert!(
                matches!(parse_value_line(&line), Err(StatsError::Protocol(_))),
                "{line:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_read_admin_value_huge_size_is_protocol_error() {
        let mut conn = Connection::new(admin_reply(
            "k",
            b"VALUE k 0 18446744073709551615\r\nhello\r\nEND\r\n",
        ));

        let err = read_admin_value(&mut conn, "k").await.unwrap_err();
        assert!(matches!(err, StatsError::Protocol(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_read_admin_value() {
        let mut conn = Connection::new(admin_reply("k", b"VALUE k 0 5\r\nhello\r\nEND\r\n"));

        let value = read_admin_value(&mut conn, "k").await.unwrap();
        assert_eq!(value.as_deref(), Some(&b"hello"[..]));
    }

    #[tokio::test]
    async fn test_read_admin_value_with_embedded_crlf() {
        let mut conn = Connection::new(admin_reply("k", b"VALUE k 0 4\r\na\r\nb\r\nEND\r\n"));

        let value = read_admin_value(&mut conn, "k").await.unwrap();
        assert_eq!(value.as_deref(), Some(&b"a\r\nb"[..]));
    }

    #[tokio::test]
    async fn test_read_admin_value_miss() {
        let mut conn = Connection::new(admin_reply("__mcrouter__.nope", b"END\r\n"));

        let value = read_admin_value(&mut conn, "__mcrouter__.nope").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_read_admin_value_size_too_small_is_corrupt() {
        let mut conn = Connection::new(admin_reply("k", b"VALUE k 0 3\r\nhello\r\nEND\r\n"));

        let err = read_admin_value(&mut conn, "k").await.unwrap_err();
        assert!(matches!(err, StatsError::Corrupt(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_read_admin_value_size_too_large_is_corrupt() {
        let mut conn = Connection::new(admin_reply("k", b"VALUE k 0 7\r\nhello\r\nEND\r\n"));

        let err = read_admin_value(&mut conn, "k").await.unwrap_err();
        assert!(matches!(err, StatsError::Corrupt(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_read_admin_value_malformed_header() {
        let mut conn = Connection::new(admin_reply("k", b"VALUE k zero 5\r\n"));

        let err = read_admin_value(&mut conn, "k").await.unwrap_err();
        assert!(matches!(err, StatsError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_read_admin_value_truncated_body() {
        let mut conn = Connection::new(admin_reply("k", b"VALUE k 0 5\r\nhel"));

        let err = read_admin_value(&mut conn, "k").await.unwrap_err();
        assert!(matches!(err, StatsError::Closed));
    }

    #[tokio::test]
    async fn test_read_admin_value_last_value_wins() {
        let mut conn = Connection::new(admin_reply(
            "k",
            b"VALUE k 0 3\r\none\r\nVALUE k 0 3\r\ntwo\r\nEND\r\n",
        ));

        let value = read_admin_value(&mut conn, "k").await.unwrap();
        assert_eq!(value.as_deref(), Some(&b"two"[..]));
    }

    #[tokio::test]
    async fn test_read_admin_value_rejects_bad_key() {
        // Nothing is written for a rejected key.
        let mut conn = Connection::new(Builder::new().build());

        for key in ["", "two words", "inject\r\nflush_all"] {
            let err = read_admin_value(&mut conn, key).await.unwrap_err();
            assert!(matches!(err, StatsError::InvalidKey(_)), "{key:?}");
        }
    }

    #[tokio::test]
    async fn test_rejected_key_is_reported_verbatim() {
        let mut conn = Connection::new(Builder::new().build());

        let err = read_admin_value(&mut conn, "version\r\n").await.unwrap_err();
        match err {
            StatsError::InvalidKey(key) => assert_eq!(key, "version\r\n"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
