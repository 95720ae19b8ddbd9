//! User-defined regex parser: named captures become fields, with optional
//! per-field coercion and timestamp resolution.

use std::collections::HashMap;
use std::str::FromStr;

use regex::Regex;

use crate::error::{EngineError, Result};
use crate::event::Event;
use crate::formats::LineParser;
use crate::timestamp;
use crate::value::Value;

/// Per-field coercion applied after capture. Failed conversions map to the
/// type's zero value rather than dropping the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Int,
    Float,
    Bool,
    Lower,
    Upper,
}

impl FromStr for Coercion {
    type Err = ();
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "int" => Ok(Coercion::Int),
            "float" => Ok(Coercion::Float),
            "bool" => Ok(Coercion::Bool),
            "lower" => Ok(Coercion::Lower),
            "upper" => Ok(Coercion::Upper),
            _ => Err(()),
        }
    }
}

impl Coercion {
    fn apply(&self, raw: &str) -> Value {
        match self {
            Coercion::Int => Value::Int(raw.parse().unwrap_or_default()),
            Coercion::Float => Value::Float(raw.parse().unwrap_or_default()),
            Coercion::Bool => Value::Bool(raw.parse().unwrap_or_default()),
            Coercion::Lower => Value::Str(raw.to_lowercase()),
            Coercion::Upper => Value::Str(raw.to_uppercase()),
        }
    }
}

/// A parser built from a user-supplied regex with named capture groups.
#[derive(Debug)]
pub struct UserRegexParser {
    pattern: Regex,
    timestamp_field: Option<String>,
    timestamp_format: Option<String>,
    coercions: HashMap<String, Coercion>,
}

impl UserRegexParser {
    /// Build a parser. `coercions` maps capture names to one of
    /// `int|float|bool|lower|upper`.
    pub fn new(
        pattern: &str,
        timestamp_field: Option<String>,
        timestamp_format: Option<String>,
        coercions: &HashMap<String, String>,
    ) -> Result<UserRegexParser> {
        let pattern = Regex::new(pattern)?;
        let coercions = coercions
            .iter()
            .map(|(field, kind)| {
                kind.parse()
                    .map(|c| (field.clone(), c))
                    .map_err(|()| EngineError::UnknownCoercion(kind.clone()))
            })
            .collect::<Result<HashMap<String, Coercion>>>()?;

        Ok(UserRegexParser {
            pattern,
            timestamp_field,
            timestamp_format,
            coercions,
        })
    }

    fn resolve_timestamp(&self, event: &Event) -> Option<i64> {
        let field = self.timestamp_field.as_deref()?;
        let raw = match event.get(field)? {
            Value::Int(n) => return Some(timestamp::from_epoch_scalar(*n)),
            v => v.render(),
        };
        match &self.timestamp_format {
            Some(fmt) => timestamp::parse_with_format(&raw, fmt),
            None => timestamp::parse_iso(&raw)
                .or_else(|| raw.parse::<i64>().ok().map(timestamp::from_epoch_scalar)),
        }
    }
}

impl LineParser for UserRegexParser {
    fn format_name(&self) -> &str {
        "regex"
    }

    fn can_parse(&self, line: &str) -> bool {
        self.pattern.is_match(line)
    }

    fn parse(&self, line: &str, source: &str) -> Option<Event> {
        let caps = self.pattern.captures(line)?;

        let mut event = Event::new(source).with_raw(line);
        for name in self.pattern.capture_names().flatten() {
            let Some(m) = caps.name(name) else { continue };
            let value = match self.coercions.get(name) {
                Some(coercion) => coercion.apply(m.as_str()),
                None => Value::Str(m.as_str().to_string()),
            };
            event.set(name, value);
        }

        if let Some(ts) = self.resolve_timestamp(&event) {
            event = event.with_timestamp(ts);
        }
        Some(event)
    }
}
