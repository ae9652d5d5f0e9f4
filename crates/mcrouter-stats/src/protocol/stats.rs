//! Aggregate stats reader (`stats all`).

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::{trim_terminator, StatMap, STAT_TAG};
use crate::error::{Result, StatsError};
use crate::transport::Connection;

/// Command requesting every aggregate stat.
pub const STATS_ALL_COMMAND: &str = "stats all";

/// Splits one `STAT <name> <value...>` line.
///
/// Only the first two spaces are delimiters: the value is the verbatim
/// remainder of the line, so `commandargs` keeps its embedded spaces.
///
/// ```
/// use mcrouter_stats::protocol::parse_stat_line;
///
/// let (name, value) = parse_stat_line("STAT commandargs --port 5000 -f\r\n").unwrap();
/// assert_eq!(name, "commandargs");
/// assert_eq!(value, "--port 5000 -f");
/// ```
pub fn parse_stat_line(line: &str) -> Result<(String, String)> {
    let mut parts = line.splitn(3, ' ');

    match (parts.next(), parts.next(), parts.next()) {
        (Some(STAT_TAG), Some(name), Some(value)) => {
            Ok((name.to_string(), trim_terminator(value).to_string()))
        }
        _ => Err(StatsError::protocol(format!(
            "expected `STAT <name> <value>` line, got {:?}",
            trim_terminator(line)
        ))),
    }
}

/// Sends `stats all` and collects the reply into a [`StatMap`].
///
/// Any malformed line fails the whole call.
pub async fn read_stats<S>(conn: &mut Connection<S>) -> Result<StatMap>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    conn.send_command(STATS_ALL_COMMAND).await?;

    let mut stats = StatMap::new();
    while let Some(line) = conn.read_reply_line().await? {
        let (name, value) = parse_stat_line(&line)?;
        stats.insert(name, value);
    }

    debug!(count = stats.len(), "read aggregate stats");
    Ok(stats)
}
