//! Duration syntax for `--since` / `--until`: `<int>[s|m|h|d]`, where a bare
//! integer means seconds.

use crate::error::{QueryError, Result};

/// Parse a duration string into seconds.
///
/// ```
/// use ptx_query::parse_duration;
///
/// assert_eq!(parse_duration("90").unwrap(), 90);
/// assert_eq!(parse_duration("5m").unwrap(), 300);
/// assert_eq!(parse_duration("2h").unwrap(), 7200);
/// assert_eq!(parse_duration("7d").unwrap(), 604800);
/// ```
pub fn parse_duration(s: &str) -> Result<i64> {
    let s = s.trim();
    if s.is_empty() {
        return Err(QueryError::InvalidDuration(s.to_string()));
    }

    let (number, multiplier) = match s.as_bytes()[s.len() - 1] {
        b's' => (&s[..s.len() - 1], 1),
        b'm' => (&s[..s.len() - 1], 60),
        b'h' => (&s[..s.len() - 1], 3600),
        b'd' => (&s[..s.len() - 1], 86400),
        _ => (s, 1),
    };

    let value: i64 = number
        .parse()
        .map_err(|_| QueryError::InvalidDuration(s.to_string()))?;
    if value < 0 {
        return Err(QueryError::InvalidDuration(s.to_string()));
    }

    value
        .checked_mul(multiplier)
        .ok_or_else(|| QueryError::InvalidDuration(s.to_string()))
}
