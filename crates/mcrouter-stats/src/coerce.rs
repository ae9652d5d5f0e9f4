//! Stat value coercion.
//!
//! Metric consumers need numbers; mcrouter hands back strings. A stat that
//! is missing reads as `0`. A stat that is present but not numeric reads as
//! NaN and is reported through `tracing`, so one bad field never costs the
//! rest of the scrape.

use tracing::warn;

use crate::protocol::StatMap;

/// Parses a raw stat string as a 64-bit float.
pub fn parse_value(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok()
}

/// Looks up `key` in `stats` and coerces it to `f64`.
///
/// ```
/// use mcrouter_stats::{parse_stat, StatMap};
///
/// let mut stats = StatMap::new();
/// stats.insert("uptime".to_string(), "42".to_string());
/// stats.insert("version".to_string(), "41.0.0 mcrouter".to_string());
///
/// assert_eq!(parse_stat(&stats, "uptime"), 42.0);
/// assert_eq!(parse_stat(&stats, "missing"), 0.0);
/// assert!(parse_stat(&stats, "version").is_nan());
/// ```
pub fn parse_stat(stats: &StatMap, key: &str) -> f64 {
    let Some(raw) = stats.get(key) else {
        return 0.0;
    };

    match raw.parse::<f64>() {
        Ok(value) => value,
        Err(error) => {
            warn!(key, stat = %raw, %error, "failed to parse stat value");
            f64::NAN
        }
    }
}
