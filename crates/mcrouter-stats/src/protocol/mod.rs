//! mcrouter stats protocol
//!
//! Readers for the three reply formats the exporter needs from mcrouter's
//! memcached-style text protocol. All lines are CRLF-terminated and every
//! multi-line reply ends with `END\r\n`.
//!
//! # Module Structure
//!
//! - [`stats`]: `stats all`, flat `STAT <name> <value...>` lines
//! - [`servers`]: `stats servers`, one composite line per destination,
//!   stabilized to a fixed baseline field set
//! - [`admin`]: `get <key>`, length-prefixed `VALUE` replies
//!
//! # Wire Format
//!
//! ```text
//! > stats all
//! < STAT version 41.0.0 mcrouter
//! < STAT commandargs --port 5000 --config file:/etc/mcrouter.json
//! < END
//!
//! > stats servers
//! < STAT 10.0.0.1:11211:ascii:plain:notcompressed-1000 avg_latency_us:302.991 up:5 soft_tko; deleted:4875 found:112675373
//! < END
//!
//! > get __mcrouter__.version
//! < VALUE __mcrouter__.version 0 6
//! < 41.0.0
//! < END
//! ```

use std::collections::HashMap;

pub mod admin;
pub mod servers;
pub mod stats;

pub use admin::{parse_value_line, read_admin_value, ValueHeader, GET_VERB};
pub use servers::{
    baseline_stats, parse_server_line, read_server_stats, RESULT_COUNTER_FIELDS,
    SERVER_FLAG_FIELDS, STATS_SERVERS_COMMAND,
};
pub use stats::{parse_stat_line, read_stats, STATS_ALL_COMMAND};

/// Line terminator used in both directions.
pub const TERMINATOR: &str = "\r\n";

/// Sentinel line closing every multi-line reply.
pub const END_LINE: &str = "END\r\n";

/// Tag token opening every `STAT` line.
pub const STAT_TAG: &str = "STAT";

/// Stat name to raw stat value. Later occurrences of a name overwrite
/// earlier ones.
pub type StatMap = HashMap<String, String>;

/// Destination identifier to that destination's stats.
///
/// The identifier (`host:port:protocol:transform:compression-shard`) is an
/// opaque label and is never decoded.
pub type ServerStatMap = HashMap<String, StatMap>;

/// Raw bytes of one admin value.
pub type AdminValue = Vec<u8>;

/// Strips one trailing line terminator (`\r\n`, or a bare `\n`).
pub(crate) fn trim_terminator(line: &str) -> &str {
    line.strip_suffix(TERMINATOR)
        .or_else(|| line.strip_suffix('\n'))
        .unwrap_or(line)
}
