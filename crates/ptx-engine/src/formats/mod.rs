//! Format parsers: the capability turning raw lines into [`Event`]s.
//!
//! Each parser is stateless (configuration only) and cheap to probe:
//! `can_parse` is a structural check that never allocates much and never
//! fails, which lets the detector score every parser uniformly over a
//! sample without committing to a full parse.

pub mod http;
pub mod json;
pub mod logfmt;
pub mod regex;
pub mod syslog;

pub use http::HttpParser;
pub use json::JsonParser;
pub use logfmt::LogfmtParser;
pub use regex::{Coercion, UserRegexParser};
pub use syslog::SyslogParser;

use crate::event::Event;

/// A line parser.
///
/// Implementations must uphold: if `can_parse(line)` is false then
/// `parse(line, ..)` returns `None` (the converse is not required), and
/// `parse` never panics on malformed input.
pub trait LineParser: Send + Sync {
    /// Short registry name for this parser (`"http"`, `"json"`, ...).
    fn format_name(&self) -> &str;

    /// Cheap structural check; no allocation-heavy work, no failures.
    fn can_parse(&self, line: &str) -> bool;

    /// Parse one line into an event, or `None` when the line does not fit.
    fn parse(&self, line: &str, source: &str) -> Option<Event>;

    /// Confidence over a sample: the fraction of non-empty lines accepted by
    /// `can_parse`. Parsers may override with a sharper estimate.
    fn confidence(&self, sample: &[String]) -> f64 {
        let non_empty: Vec<&String> = sample.iter().filter(|l| !l.trim().is_empty()).collect();
        if non_empty.is_empty() {
            return 0.0;
        }
        let hits = non_empty.iter().filter(|l| self.can_parse(l)).count();
        hits as f64 / non_empty.len() as f64
    }

    /// Parse a batch, preserving line order and dropping unparseable lines.
    fn parse_many(&self, lines: &[String], source: &str) -> Vec<Event> {
        lines
            .iter()
            .filter_map(|line| self.parse(line, source))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_confidence_is_hit_fraction() {
        let parser = JsonParser;
        let sample = vec![
            r#"{"a": 1}"#.to_string(),
            "".to_string(),
            "garbage".to_string(),
            r#"{"b": 2}"#.to_string(),
        ];
        // Two hits out of three non-empty lines.
        let c = parser.confidence(&sample);
        assert!((c - 2.0 / 3.0).abs() < 1e-9, "got {c}");
    }

    #[test]
    fn test_confidence_empty_sample_is_zero() {
        let parser = JsonParser;
        assert_eq!(parser.confidence(&[]), 0.0);
        assert_eq!(parser.confidence(&["   ".to_string()]), 0.0);
    }

    #[test]
    fn test_parse_many_drops_unparseable() {
        let parser = JsonParser;
        let lines = vec![
            r#"{"a": 1}"#.to_string(),
            "not json".to_string(),
            r#"{"a": 2}"#.to_string(),
        ];
        let events = parser.parse_many(&lines, "test");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].get("a"), Some(&crate::Value::Int(1)));
        assert_eq!(events[1].get("a"), Some(&crate::Value::Int(2)));
    }
}
