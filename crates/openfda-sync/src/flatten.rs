//! Record flattening
//!
//! The openFDA API returns nested JSON (an `openfda` sub-object holding
//! brand/manufacturer arrays, plus flat arrays of product codes). The
//! destination stores one flat row per record, so nested objects are
//! collapsed into `parent_child` key paths and arrays are serialized to
//! JSON-array strings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Separator joining nested key paths (`openfda` + `brand_name` ->
/// `openfda_brand_name`)
pub const KEY_SEPARATOR: &str = "_";

/// A single flattened field value
///
/// Flattening reduces every field to a scalar; nested sequences survive
/// only as their JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlatValue {
    /// Absent or empty value
    Null,
    /// Boolean scalar
    Bool(bool),
    /// Numeric scalar
    Number(serde_json::Number),
    /// String scalar, including serialized arrays
    String(String),
}

impl FlatValue {
    /// Convert back to a JSON value
    pub fn to_json(&self) -> Value {
        match self {
            FlatValue::Null => Value::Null,
            FlatValue::Bool(b) => Value::Bool(*b),
            FlatValue::Number(n) => Value::Number(n.clone()),
            FlatValue::String(s) => Value::String(s.clone()),
        }
    }

    /// Borrow the string content, if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FlatValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// A flattened record: ordered mapping from key path to scalar value
pub type FlatRecord = BTreeMap<String, FlatValue>;

/// Flatten a nested JSON object into a single-level record
///
/// Rules:
/// - nested objects recurse, prefixing child keys with `<parent>_<child>`
/// - non-empty arrays are stored as their compact JSON text
/// - empty arrays become [`FlatValue::Null`]
/// - scalars pass through unchanged
///
/// Total over any JSON object; flattening an already-flat object is a
/// no-op.
pub fn flatten(object: &serde_json::Map<String, Value>) -> FlatRecord {
    let mut out = FlatRecord::new();
    flatten_into(&mut out, "", object);
    out
}

fn flatten_into(out: &mut FlatRecord, prefix: &str, object: &serde_json::Map<String, Value>) {
    for (key, value) in object {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}{KEY_SEPARATOR}{key}")
        };

        match value {
            Value::Object(nested) => flatten_into(out, &path, nested),
            Value::Array(items) if items.is_empty() => {
                out.insert(path, FlatValue::Null);
            },
            Value::Array(_) => {
                // Value's Display renders compact JSON
                out.insert(path, FlatValue::String(value.to_string()));
            },
            Value::Null => {
                out.insert(path, FlatValue::Null);
            },
            Value::Bool(b) => {
                out.insert(path, FlatValue::Bool(*b));
            },
            Value::Number(n) => {
                out.insert(path, FlatValue::Number(n.clone()));
            },
            Value::String(s) => {
                out.insert(path, FlatValue::String(s.clone()));
            },
        }
    }
}
