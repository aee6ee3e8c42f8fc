//! # Sync Interval
//!
//! Parses `spec.syncInterval` in Go duration notation: one or more
//! `<number><unit>` groups such as `30s`, `5m`, `1h30m` or `1.5h`.
//! Supported units: `ms`, `s`, `m`, `h` and `d`.

use crate::constants::DEFAULT_SYNC_INTERVAL_SECS;
use anyhow::Result;
use regex::Regex;
use std::time::Duration;
use tracing::warn;

/// Parse a Go-style duration string
pub fn parse_go_duration(duration_str: &str) -> Result<Duration> {
    let trimmed = duration_str.trim();
    if trimmed.is_empty() {
        return Err(anyhow::anyhow!("Duration string cannot be empty"));
    }

    let whole = Regex::new(r"^(?:(?:\d+(?:\.\d*)?|\.\d+)(?:ms|s|m|h|d))+$")
        .map_err(|e| anyhow::anyhow!("Failed to compile regex: {e}"))?;
    let group = Regex::new(r"(?P<number>\d+(?:\.\d*)?|\.\d+)(?P<unit>ms|s|m|h|d)")
        .map_err(|e| anyhow::anyhow!("Failed to compile regex: {e}"))?;

    if !whole.is_match(trimmed) {
        return Err(anyhow::anyhow!(
            "Invalid duration format '{trimmed}'. Expected e.g. '30s', '5m', '1h30m'"
        ));
    }

    let mut total_secs = 0f64;
    for captures in group.captures_iter(trimmed) {
        let number: f64 = captures["number"]
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid duration number in '{trimmed}': {e}"))?;
        let unit_secs = match &captures["unit"] {
            "ms" => 0.001,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3_600.0,
            "d" => 86_400.0,
            other => return Err(anyhow::anyhow!("Unknown duration unit '{other}'")),
        };
        total_secs += number * unit_secs;
    }

    Duration::try_from_secs_f64(total_secs)
        .map_err(|e| anyhow::anyhow!("Duration '{trimmed}' out of range: {e}"))
}

/// Effective sync interval; invalid or zero values fall back to five minutes
#[must_use]
pub fn sync_interval(duration_str: &str) -> Duration {
    let default = Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS);
    match parse_go_duration(duration_str) {
        Ok(d) if !d.is_zero() => d,
        Ok(_) => {
            warn!(interval = duration_str, "Sync interval is zero, using default 5m");
            default
        }
        Err(e) => {
            warn!(interval = duration_str, error = %e, "Invalid sync interval, using default 5m");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_units() {
        assert_eq!(parse_go_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_go_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_go_duration("2h").unwrap(), Duration::from_secs(7_200));
        assert_eq!(parse_go_duration("1d").unwrap(), Duration::from_secs(86_400));
        assert_eq!(parse_go_duration("250ms").unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn test_compound_and_fractional() {
        assert_eq!(parse_go_duration("1h30m").unwrap(), Duration::from_secs(5_400));
        assert_eq!(parse_go_duration("1.5h").unwrap(), Duration::from_secs(5_400));
        assert_eq!(parse_go_duration(" 1m30s ").unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn test_invalid_formats() {
        for input in ["", "5", "m", "5x", "5 m", "-5m", "1h-30m"] {
            assert!(parse_go_duration(input).is_err(), "expected error for {input:?}");
        }
    }

    #[test]
    fn test_sync_interval_falls_back_to_default() {
        assert_eq!(sync_interval("garbage"), Duration::from_secs(300));
        assert_eq!(sync_interval("0s"), Duration::from_secs(300));
        assert_eq!(sync_interval("10m"), Duration::from_secs(600));
    }
}
