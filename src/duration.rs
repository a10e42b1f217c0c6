//! Duration parsing for `x-terraform-resource-timeout` values.
//!
//! Supports decimal values with a unit suffix: "30s", "1.5m", "2h".

use crate::error::Error;
use std::time::Duration;

/// Parses a timeout extension value into a `Duration`.
///
/// Supported formats:
/// - Seconds: "30s", "0.5s"
/// - Minutes: "1m", "2.5m"
/// - Hours: "1h"
///
/// # Errors
///
/// Returns an error if the value is empty, negative, lacks a unit or is not a number.
///
/// # Examples
///
/// ```
/// use openapi_provider::duration::parse_timeout;
/// use std::time::Duration;
///
/// assert_eq!(parse_timeout("30s").unwrap(), Duration::from_secs(30));
/// assert_eq!(parse_timeout("1.5m").unwrap(), Duration::from_secs(90));
/// assert_eq!(parse_timeout("2h").unwrap(), Duration::from_secs(7200));
/// ```
pub fn parse_timeout(s: &str) -> Result<Duration, Error> {
    let s = s.trim();

    if s.is_empty() {
        return Err(invalid(s, "timeout cannot be empty"));
    }

    let (number, multiplier) = if let Some(n) = s.strip_suffix('s') {
        (n, 1.0)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60.0)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 3600.0)
    } else {
        return Err(invalid(s, "expected a unit suffix of 's', 'm' or 'h'"));
    };

    let number = number.trim();
    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(invalid(s, "expected a non-negative decimal number"));
    }

    let value: f64 = number
        .parse()
        .map_err(|_| invalid(s, "expected a non-negative decimal number"))?;

    Duration::try_from_secs_f64(value * multiplier)
        .map_err(|e| invalid(s, &format!("out of range: {e}")))
}

fn invalid(value: &str, reason: &str) -> Error {
    Error::invalid_property(
        crate::constants::EXT_RESOURCE_TIMEOUT,
        format!("invalid timeout '{value}': {reason}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timeout_seconds() {
        assert_eq!(parse_timeout("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_timeout("0s").unwrap(), Duration::ZERO);
        assert_eq!(parse_timeout("0.5s").unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn test_parse_timeout_minutes_and_hours() {
        assert_eq!(parse_timeout("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_timeout("2.5m").unwrap(), Duration::from_secs(150));
        assert_eq!(parse_timeout("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_timeout_with_whitespace() {
        assert_eq!(parse_timeout(" 20s ").unwrap(), Duration::from_secs(20));
    }

    #[test]
    fn test_parse_timeout_invalid() {
        assert!(parse_timeout("").is_err());
        assert!(parse_timeout("30").is_err());
        assert!(parse_timeout("-1s").is_err());
        assert!(parse_timeout("abc").is_err());
        assert!(parse_timeout("s").is_err());
        assert!(parse_timeout("1d").is_err());
        assert!(parse_timeout("1e3s").is_err());
    }
}
