//! The uniform event record produced by every format parser.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::timestamp;
use crate::value::Value;

/// A normalized log event.
///
/// Events are values: the pipeline passes them by value and no stage mutates
/// a batch it did not produce. Field names are case-sensitive; dotted names
/// (`"request.method"`) encode flattening of structured inputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Seconds since the Unix epoch. Never negative; defaults to "now" at
    /// parse time when the line carries no usable stamp.
    pub timestamp: i64,
    /// Short provenance label: a format name, file path, or remote-source tag.
    pub source: String,
    /// Extracted typed fields.
    pub fields: BTreeMap<String, Value>,
    /// The original line, preserved for formatters and text search.
    pub raw: Option<String>,
}

impl Event {
    /// Create an event stamped "now" with no fields.
    pub fn new(source: &str) -> Event {
        Event {
            timestamp: timestamp::now_epoch(),
            source: source.to_string(),
            fields: BTreeMap::new(),
            raw: None,
        }
    }

    /// Set the timestamp, clamping negatives to zero.
    pub fn with_timestamp(mut self, ts: i64) -> Event {
        self.timestamp = ts.max(0);
        self
    }

    pub fn with_raw(mut self, raw: &str) -> Event {
        self.raw = Some(raw.to_string());
        self
    }

    /// Insert a field, replacing any previous value under the same name.
    pub fn set(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }

    /// Fluent variant of [`Event::set`] for construction.
    pub fn with_field(mut self, name: &str, value: Value) -> Event {
        self.set(name, value);
        self
    }

    /// Get a field value by name.
    ///
    /// A flat key always wins: `"actor.id"` stored as a single field takes
    /// precedence over traversing a nested `actor` map. Dotted traversal only
    /// applies to programmatically built `Map` values, since parsers flatten
    /// structured input.
    pub fn get(&self, name: &str) -> Option<&Value> {
        if let Some(v) = self.fields.get(name) {
            return Some(v);
        }

        if name.contains('.') {
            let (head, rest) = name.split_once('.')?;
            let mut current = self.fields.get(head)?;
            for part in rest.split('.') {
                match current {
                    Value::Map(map) => current = map.get(part)?,
                    _ => return None,
                }
            }
            return Some(current);
        }

        None
    }

    /// Whether the event carries the named field.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// String rendering of a field, or the empty string when absent. This is
    /// the form used for group keys and string-mode comparison.
    pub fn render_field(&self, name: &str) -> String {
        self.get(name).map(Value::render).unwrap_or_default()
    }
}
