//! Helpers over raw `serde_json::Value` bodies.

use serde_json::Value;

/// Loose truthiness: `null`, `false`, zero, and empty strings, arrays and
/// objects are falsy.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Text for a message field: strings as-is, anything else as compact JSON.
pub(crate) fn message_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
