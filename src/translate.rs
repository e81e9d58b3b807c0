//! Recursive payload translation.
//!
//! Translation is keyed by the payload's field names, not by the text they
//! hold: for every string value inside an object, the field name is looked up
//! and the cached translation, if any, replaces the value. Two fields holding
//! the same text can therefore translate differently. Nested objects are
//! walked; arrays, numbers, booleans and nulls are copied unchanged.
//!
//! Input is assumed acyclic, which `serde_json::Value` guarantees.

use serde_json::{Map, Value};

/// Translate `payload` using `lookup` to resolve field names.
///
/// A non-object top level has no field names to key on and is returned as is.
pub fn translate_value<F>(payload: &Value, lookup: &F) -> Value
where
    F: Fn(&str) -> Option<String>,
{
    match payload {
        Value::Object(map) => Value::Object(translate_object(map, lookup)),
        other => other.clone(),
    }
}

fn translate_object<F>(map: &Map<String, Value>, lookup: &F) -> Map<String, Value>
where
    F: Fn(&str) -> Option<String>,
{
    map.iter()
        .map(|(field, value)| {
            let translated = match value {
                Value::String(text) => {
                    Value::String(lookup(field.as_str()).unwrap_or_else(|| text.clone()))
                }
                Value::Object(nested) => Value::Object(translate_object(nested, lookup)),
                Value::Array(_) | Value::Number(_) | Value::Bool(_) | Value::Null => value.clone(),
            };
            (field.clone(), translated)
        })
        .collect()
}
