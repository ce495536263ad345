//! Human-readable TTL strings

use crate::error::{CodexError, Result};
use std::time::Duration;

pub const MINUTE: u64 = 60;
pub const HOUR: u64 = 60 * MINUTE;
pub const DAY: u64 = 24 * HOUR;
pub const WEEK: u64 = 7 * DAY;

/// Parse `"30s"`, `"15m"`, `"6h"`, `"1d"`, `"2w"` or a bare number of seconds
pub fn parse_ttl(input: &str) -> Result<Duration> {
    let value = input.trim().to_ascii_lowercase();
    if value.is_empty() {
        return Err(CodexError::Config("empty TTL".to_string()));
    }

    let (digits, unit) = match value.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => value.split_at(idx),
        None => (value.as_str(), "s"),
    };

    let amount: u64 = digits
        .parse()
        .map_err(|_| CodexError::Config(format!("invalid TTL '{}'", input)))?;

    let multiplier = match unit.trim() {
        "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => MINUTE,
        "h" | "hr" | "hrs" | "hour" | "hours" => HOUR,
        "d" | "day" | "days" => DAY,
        "w" | "week" | "weeks" => WEEK,
        other => {
            return Err(CodexError::Config(format!(
                "invalid TTL unit '{}' in '{}'",
                other, input
            )))
        }
    };

    amount
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| CodexError::Config(format!("TTL '{}' is too large", input)))
}

/// Render seconds with the largest unit that divides them evenly
pub fn format_ttl(duration: Duration) -> String {
    let secs = duration.as_secs();
    for (unit, size) in [("w", WEEK), ("d", DAY), ("h", HOUR), ("m", MINUTE)] {
        if secs >= size && secs % size == 0 {
            return format!("{}{}", secs / size, unit);
        }
    }
    format!("{}s", secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_ttl("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_ttl("15m").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_ttl("6h").unwrap(), Duration::from_secs(21_600));
        assert_eq!(parse_ttl("1d").unwrap(), Duration::from_secs(86_400));
        assert_eq!(parse_ttl("1w").unwrap(), Duration::from_secs(604_800));
        assert_eq!(parse_ttl(" 2 Hours ").unwrap(), Duration::from_secs(7_200));
    }

    #[test]
    fn test_parse_bare_seconds() {
        assert_eq!(parse_ttl("3600").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_ttl("").is_err());
        assert!(parse_ttl("h").is_err());
        assert!(parse_ttl("10y").is_err());
        assert!(parse_ttl("-5m").is_err());
        assert!(parse_ttl("99999999999999999999w").is_err());
    }

    #[test]
    fn test_format_ttl() {
        assert_eq!(format_ttl(Duration::from_secs(604_800)), "1w");
        assert_eq!(format_ttl(Duration::from_secs(7_200)), "2h");
        assert_eq!(format_ttl(Duration::from_secs(90)), "90s");
        assert_eq!(format_ttl(Duration::from_secs(0)), "0s");
    }
}
