//! Typed field values and the coercion rules shared by the executor.
//!
//! Comparisons decide numeric-vs-string mode per pair: when both sides have
//! a numeric view the comparison is numeric, otherwise both sides are
//! compared as strings (byte-wise for equality, lexicographic for ordering).

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use ptx_query::parse_numeric;

/// A typed field value.
///
/// The union mirrors JSON scalars plus lists and maps. Flattened parses
/// (dotted field names) never store nested maps; `Map` only appears when a
/// value is constructed programmatically.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// The value rendered as the string used for grouping keys, sorting, and
    /// string-mode comparison. `Null` renders empty, matching the executor's
    /// missing-value rule.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.clone(),
            Value::List(_) | Value::Map(_) => {
                serde_json::to_string(&self.to_json()).unwrap_or_default()
            }
        }
    }

    /// Numeric view of the value, if it has one under the coercion rule.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => f.is_finite().then_some(*f),
            Value::Str(s) => parse_numeric(s),
            _ => None,
        }
    }

    /// Convert from a decoded JSON value. Numbers become `Int` when they fit
    /// in `i64`, `Float` otherwise.
    pub fn from_json(v: &serde_json::Value) -> Value {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(0.0)),
            },
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to a JSON value for serialization.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::Number((*n).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Build a numeric value, collapsing integral floats to `Int` so that
    /// aggregate results display without a trailing fraction.
    pub fn from_f64(f: f64) -> Value {
        if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
            Value::Int(f as i64)
        } else {
            Value::Float(f)
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// Compare two optional values under the executor's ordering rule: numeric
/// when both sides have a numeric view, lexicographic on string renderings
/// otherwise. Missing values render as the empty string.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let num_a = a.and_then(Value::as_number);
    let num_b = b.and_then(Value::as_number);

    if let (Some(x), Some(y)) = (num_a, num_b) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }

    let str_a = a.map(Value::render).unwrap_or_default();
    let str_b = b.map(Value::render).unwrap_or_default();
    str_a.cmp(&str_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_view_of_strings() {
        assert_eq!(Value::Str("200".into()).as_number(), Some(200.0));
        assert_eq!(Value::Str("12.5".into()).as_number(), Some(12.5));
        assert_eq!(Value::Str("abc".into()).as_number(), None);
        assert_eq!(Value::Bool(true).as_number(), None);
    }

    #[test]
    fn test_render_null_is_empty() {
        assert_eq!(Value::Null.render(), "");
    }

    #[test]
    fn test_compare_numeric_mode() {
        // "9" < "10" numerically even though "9" > "10" lexicographically.
        let a = Value::Str("9".into());
        let b = Value::Str("10".into());
        assert_eq!(compare_values(Some(&a), Some(&b)), Ordering::Less);
    }

    #[test]
    fn test_compare_string_mode() {
        let a = Value::Str("apple".into());
        let b = Value::Str("banana".into());
        assert_eq!(compare_values(Some(&a), Some(&b)), Ordering::Less);
    }

    #[test]
    fn test_compare_missing_sorts_as_empty() {
        let b = Value::Str("x".into());
        assert_eq!(compare_values(None, Some(&b)), Ordering::Less);
        assert_eq!(compare_values(None, None), Ordering::Equal);
    }

    #[test]
    fn test_from_f64_collapses_integral() {
        assert_eq!(Value::from_f64(250.0), Value::Int(250));
        assert_eq!(Value::from_f64(0.5), Value::Float(0.5));
    }

    #[test]
    fn test_json_round_trip() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"a": 1, "b": [true, "x"], "c": 2.5}"#).unwrap();
        let value = Value::from_json(&json);
        assert_eq!(value.to_json(), json);
    }
}
