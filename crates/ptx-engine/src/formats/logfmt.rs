//! Logfmt parser: whitespace-separated `key=value` pairs, with optional
//! double-quoted values (`msg="hello world"`, backslash escapes inside).
//!
//! Values stay strings; the executor's per-pair coercion makes
//! `duration=150` compare numerically anyway. Tokens without `=` are
//! skipped rather than failing the line.

use std::collections::BTreeMap;

use crate::event::Event;
use crate::formats::LineParser;
use crate::timestamp;
use crate::value::Value;

/// Parser for logfmt lines.
pub struct LogfmtParser;

impl LineParser for LogfmtParser {
    fn format_name(&self) -> &str {
        "logfmt"
    }

    fn can_parse(&self, line: &str) -> bool {
        // Two pairs keep single-'=' prose ("E = mc2") from matching.
        pairs(line).take(2).count() >= 2
    }

    fn parse(&self, line: &str, source: &str) -> Option<Event> {
        let mut fields = BTreeMap::new();
        for (key, value) in pairs(line) {
            fields.entry(key).or_insert(Value::Str(value));
        }
        if fields.len() < 2 {
            return None;
        }

        let ts = timestamp::resolve_from_fields(&fields).unwrap_or_else(timestamp::now_epoch);

        let mut event = Event::new(source).with_raw(line).with_timestamp(ts);
        event.fields = fields;
        Some(event)
    }
}

/// Iterate `key=value` pairs, skipping bare tokens.
fn pairs(line: &str) -> impl Iterator<Item = (String, String)> + '_ {
    let mut chars = line.chars().peekable();

    std::iter::from_fn(move || {
        loop {
            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }
            chars.peek()?;

            let mut key = String::new();
            while let Some(&c) = chars.peek() {
                if c == '=' || c.is_whitespace() {
                    break;
                }
                key.push(c);
                chars.next();
            }

            if key.is_empty() || chars.peek() != Some(&'=') {
                // Bare token (or stray '='): drop it and move on.
                chars.next();
                continue;
            }
            chars.next(); // consume '='

            let value = if chars.peek() == Some(&'"') {
                chars.next();
                let mut val = String::new();
                let mut escaped = false;
                for c in chars.by_ref() {
                    if escaped {
                        val.push(c);
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == '"' {
                        break;
                    } else {
                        val.push(c);
                    }
                }
                val
            } else {
                let mut val = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() {
                        break;
                    }
                    val.push(c);
                    chars.next();
                }
                val
            };

            return Some((key, value));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_pairs() {
        let event = LogfmtParser
            .parse("level=info msg=hello logger=app.test", "svc")
            .unwrap();
        assert_eq!(event.get("level"), Some(&Value::Str("info".into())));
        assert_eq!(event.get("msg"), Some(&Value::Str("hello".into())));
        assert_eq!(event.get("logger"), Some(&Value::Str("app.test".into())));
    }

    #[test]
    fn test_quoted_values_and_escapes() {
        let line = r#"level=info msg="hello world" note="say \"hi\"""#;
        let event = LogfmtParser.parse(line, "svc").unwrap();
        assert_eq!(event.get("msg"), Some(&Value::Str("hello world".into())));
        assert_eq!(event.get("note"), Some(&Value::Str("say \"hi\"".into())));
    }

    #[test]
    fn test_bare_tokens_skipped() {
        let event = LogfmtParser
            .parse("key1=value1 garbage key2=value2", "svc")
            .unwrap();
        assert_eq!(event.get("key1"), Some(&Value::Str("value1".into())));
        assert_eq!(event.get("key2"), Some(&Value::Str("value2".into())));
        assert_eq!(event.get("garbage"), None);
    }

    #[test]
    fn test_empty_values_allowed() {
        let event = LogfmtParser.parse(r#"key="" other="#, "svc").unwrap();
        assert_eq!(event.get("key"), Some(&Value::Str("".into())));
        assert_eq!(event.get("other"), Some(&Value::Str("".into())));
    }

    #[test]
    fn test_timestamp_probed_from_ts_field() {
        let event = LogfmtParser
            .parse("level=info ts=2025-12-04T10:00:00Z msg=x", "svc")
            .unwrap();
        assert_eq!(event.timestamp, 1764842400);
    }

    #[test]
    fn test_requires_two_pairs() {
        assert!(!LogfmtParser.can_parse("E = mc2"));
        assert!(!LogfmtParser.can_parse("just words here"));
        assert!(LogfmtParser.can_parse("a=1 b=2"));
        assert!(LogfmtParser.parse("only_one=pair", "svc").is_none());
    }

    #[test]
    fn test_numeric_values_stay_strings() {
        // The executor coerces per comparison; the field itself is a string.
        let event = LogfmtParser.parse("status=200 duration=150", "svc").unwrap();
        assert_eq!(event.get("status"), Some(&Value::Str("200".into())));
    }
}
