//! Per-destination stats reader (`stats servers`).
//!
//! Each reply line describes one destination and carries two segments
//! separated by the first `;`:
//!
//! ```text
//! STAT <destination-id> avg_latency_us:302.991 pending_reqs:0 up:5 soft_tko; deleted:4875 found:112675373
//! └──────────────── destination state ────────────────────────────────────┘ └──── result counters ────┘
//! ```
//!
//! mcrouter only prints result counters that are non-zero, and only prints
//! the `soft_tko`/`hard_tko` flags while they are set. Every destination's
//! map is therefore seeded with a fixed zero baseline before the line is
//! applied, so a consumer sees the same keys on every scrape.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::{trim_terminator, ServerStatMap, StatMap};
use crate::error::Result;
use crate::transport::Connection;

/// Command requesting per-destination stats.
pub const STATS_SERVERS_COMMAND: &str = "stats servers";

/// Bare flags that mark a destination state; present means `"1"`.
pub const SERVER_FLAG_FIELDS: [&str; 2] = ["soft_tko", "hard_tko"];

/// Result counters reported only when non-zero.
///
/// See `carbon_result.thrift` in mcrouter.
pub const RESULT_COUNTER_FIELDS: [&str; 10] = [
    "deleted",
    "touched",
    "found",
    "notfound",
    "notstored",
    "stored",
    "exists",
    "timeout",
    "connect_timeout",
    "remote_error",
];

const SEGMENT_SEPARATOR: char = ';';
const PAIR_SEPARATOR: char = ':';
const FLAG_SET: &str = "1";
const ZERO: &str = "0";

/// A fresh map holding every baseline field at `"0"`.
pub fn baseline_stats() -> StatMap {
    SERVER_FLAG_FIELDS
        .iter()
        .chain(RESULT_COUNTER_FIELDS.iter())
        .map(|field| (field.to_string(), ZERO.to_string()))
        .collect()
}

/// Parses one destination line into its identifier and stabilized stats.
///
/// Returns `None` for a line that does not even carry an identifier.
/// Tokens without a `name:value` shape are skipped.
///
/// ```
/// use mcrouter_stats::protocol::parse_server_line;
///
/// let (id, stats) = parse_server_line(
///     "STAT 10.0.0.1:11211:ascii:plain:notcompressed-1000 up:5 soft_tko; deleted:4875\r\n",
/// )
/// .unwrap();
///
/// assert_eq!(id, "10.0.0.1:11211:ascii:plain:notcompressed-1000");
/// assert_eq!(stats["soft_tko"], "1");
/// assert_eq!(stats["hard_tko"], "0");
/// assert_eq!(stats["deleted"], "4875");
/// assert_eq!(stats["found"], "0");
/// ```
pub fn parse_server_line(line: &str) -> Option<(String, StatMap)> {
    let line = trim_terminator(line);

    let (state_segment, counter_segment) = match line.split_once(SEGMENT_SEPARATOR) {
        Some((state, counters)) => (state, Some(counters)),
        None => (line, None),
    };

    let mut state_tokens = tokens(state_segment);
    let _tag = state_tokens.next()?;
    let destination = state_tokens.next()?;

    let mut stats = baseline_stats();

    for token in state_tokens {
        if SERVER_FLAG_FIELDS.contains(&token) {
            stats.insert(token.to_string(), FLAG_SET.to_string());
        } else {
            apply_pair(&mut stats, destination, token);
        }
    }

    if let Some(counters) = counter_segment {
        for token in tokens(counters) {
            apply_pair(&mut stats, destination, token);
        }
    }

    Some((destination.to_string(), stats))
}

/// Sends `stats servers` and collects one stabilized map per destination.
///
/// A destination listed twice keeps only its last line.
pub async fn read_server_stats<S>(conn: &mut Connection<S>) -> Result<ServerStatMap>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    conn.send_command(STATS_SERVERS_COMMAND).await?;

    let mut servers = ServerStatMap::new();
    while let Some(line) = conn.read_reply_line().await? {
        match parse_server_line(&line) {
            Some((destination, stats)) => {
                servers.insert(destination, stats);
            }
            None => debug!(line = trim_terminator(&line), "skipping line without destination"),
        }
    }

    debug!(count = servers.len(), "read per-destination stats");
    Ok(servers)
}

fn tokens(segment: &str) -> impl Iterator<Item = &str> {
    segment.split(' ').filter(|token| !token.is_empty())
}

fn apply_pair(stats: &mut StatMap, destination: &str, token: &str) {
    match token.split_once(PAIR_SEPARATOR) {
        Some((name, value)) => {
            stats.insert(name.to_string(), value.to_string());
        }
        None => debug!(destination, token, "skipping token without name:value shape"),
    }
}
