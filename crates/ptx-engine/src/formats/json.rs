//! Structured-object parser: one JSON object per line.
//!
//! Nested maps are flattened into dotted field names
//! (`{"req": {"m": "GET"}}` becomes `req.m = "GET"`); lists are kept as
//! list-valued leaves. The event timestamp is resolved by probing a fixed
//! list of well-known field names.

use std::collections::BTreeMap;

use crate::event::Event;
use crate::formats::LineParser;
use crate::timestamp;
use crate::value::Value;

/// Parser for JSON-object-per-line input.
pub struct JsonParser;

impl LineParser for JsonParser {
    fn format_name(&self) -> &str {
        "json"
    }

    fn can_parse(&self, line: &str) -> bool {
        let trimmed = line.trim_start();
        trimmed.starts_with('{')
            && serde_json::from_str::<serde_json::Value>(trimmed)
                .map(|v| v.is_object())
                .unwrap_or(false)
    }

    fn parse(&self, line: &str, source: &str) -> Option<Event> {
        let decoded: serde_json::Value = serde_json::from_str(line.trim()).ok()?;
        let object = decoded.as_object()?;

        let mut fields = BTreeMap::new();
        for (key, value) in object {
            flatten_into(&mut fields, key, value);
        }

        let ts = timestamp::resolve_from_fields(&fields).unwrap_or_else(timestamp::now_epoch);

        let mut event = Event::new(source).with_raw(line).with_timestamp(ts);
        event.fields = fields;
        Some(event)
    }
}

/// Flatten one decoded value into the field map under `key`. Maps recurse
/// with a dotted prefix; everything else is a leaf. An existing flat key is
/// never overwritten, so inputs carrying literal-dot keys keep them.
fn flatten_into(fields: &mut BTreeMap<String, Value>, key: &str, value: &serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (sub_key, sub_value) in map {
                flatten_into(fields, &format!("{key}.{sub_key}"), sub_value);
            }
        }
        other => {
            fields
                .entry(key.to_string())
                .or_insert_with(|| Value::from_json(other));
        }
    }
}
