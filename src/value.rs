//! Primitive value type carried through field extraction, stringification,
//! stored-field snapshots, and serialization.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// The caller-supplied document representation: a map from field name to
/// primitive value, matched against the configurable `extract_field`
/// callback.
pub type FieldMap = HashMap<String, FieldValue>;

/// A document field value as seen by the engine: the logical subset of JSON
/// primitives an `extract_field` callback can hand back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<FieldValue>),
}

impl FieldValue {
    /// Nullish for the purposes of §4.4 step 4 ("if nullish, skip") and the
    /// id-field extraction check (`MissingIdField`).
    pub fn is_nullish(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Stringifies a primitive, or joins an array with commas — the exact
    /// rule add() uses before handing text to the tokenizer.
    pub fn stringify(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            FieldValue::String(s) => s.clone(),
            FieldValue::Array(items) => items
                .iter()
                .map(FieldValue::stringify)
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stringify())
    }
}

impl From<JsonValue> for FieldValue {
    fn from(v: JsonValue) -> Self {
        match v {
            JsonValue::Null => FieldValue::Null,
            JsonValue::Bool(b) => FieldValue::Bool(b),
            JsonValue::Number(n) => FieldValue::Number(n.as_f64().unwrap_or(0.0)),
            JsonValue::String(s) => FieldValue::String(s),
            JsonValue::Array(items) => {
                FieldValue::Array(items.into_iter().map(FieldValue::from).collect())
            }
            JsonValue::Object(map) => {
                // Objects have no place in this value model; flatten to their
                // stringified entries rather than losing the data silently.
                FieldValue::Array(
                    map.into_iter()
                        .map(|(k, v)| FieldValue::String(format!("{k}={v}")))
                        .collect(),
                )
            }
        }
    }
}

impl From<FieldValue> for JsonValue {
    fn from(v: FieldValue) -> Self {
        match v {
            FieldValue::Null => JsonValue::Null,
            FieldValue::Bool(b) => JsonValue::Bool(b),
            FieldValue::Number(n) => serde_json::Number::from_f64(n)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            FieldValue::String(s) => JsonValue::String(s),
            FieldValue::Array(items) => {
                JsonValue::Array(items.into_iter().map(JsonValue::from).collect())
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<u64> for FieldValue {
    fn from(n: u64) -> Self {
        FieldValue::Number(n as f64)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

/// Converts between a document's external id field and the engine's
/// generic `ExtId` type parameter.
///
/// `extract_field` hands back an untyped [`FieldValue`]; a `FieldValue`
/// itself can't be `Eq + Hash` (it carries an `f64`), so the engine is
/// generic over any `ExtId` that knows how to read itself out of one and
/// write itself back for serialization, rather than over `FieldValue`
/// directly.
pub trait DocumentId: Eq + Hash + Clone {
    fn from_field_value(value: &FieldValue) -> Option<Self>
    where
        Self: Sized;

    fn to_field_value(&self) -> FieldValue;
}

impl DocumentId for String {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::String(s) => Some(s.clone()),
            FieldValue::Number(n) => Some(n.to_string()),
            FieldValue::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn to_field_value(&self) -> FieldValue {
        FieldValue::String(self.clone())
    }
}

impl DocumentId for u64 {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Number(n) if n.fract() == 0.0 && *n >= 0.0 && *n <= u64::MAX as f64 => {
                Some(*n as u64)
            }
            FieldValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Number(*self as f64)
    }
}

impl DocumentId for i64 {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Number(n)
                if n.fract() == 0.0 && *n >= i64::MIN as f64 && *n <= i64::MAX as f64 =>
            {
                Some(*n as i64)
            }
            FieldValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Number(*self as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_roundtrips_through_field_value() {
        assert_eq!(u64::from_field_value(&FieldValue::Number(7.0)), Some(7u64));
        assert_eq!(7u64.to_field_value(), FieldValue::Number(7.0));
        assert_eq!(
            String::from_field_value(&FieldValue::String("abc".into())),
            Some("abc".to_string())
        );
    }

    #[test]
    fn stringify_joins_arrays_with_commas() {
        let v = FieldValue::Array(vec![1u64.into(), 2u64.into(), 3u64.into()]);
        assert_eq!(v.stringify(), "1,2,3");
    }

    #[test]
    fn stringify_integers_without_trailing_decimal() {
        assert_eq!(FieldValue::Number(100.0).stringify(), "100");
    }

    #[test]
    fn null_is_nullish_nothing_else_is() {
        assert!(FieldValue::Null.is_nullish());
        assert!(!FieldValue::String(String::new()).is_nullish());
        assert!(!FieldValue::Number(0.0).is_nullish());
    }
}
