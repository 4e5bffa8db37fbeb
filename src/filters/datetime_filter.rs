//! Built-in `datetime` filter: mandatory on every `datetime` attribute.

use serde_json::Value;

use crate::datetime;
use crate::document::Document;
use crate::engine::DatabaseConfig;
use crate::error::DatabaseResult;

/// `_config` is unused here: canonical timestamps are always UTC-tagged
/// (see [`crate::datetime`]), so there is no caller-local zone to apply.
/// A host filter that does need the default timezone can read it through
/// the same parameter.
pub fn encode(value: &Value, _document: &Document, _config: &DatabaseConfig) -> DatabaseResult<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(s) => Ok(Value::String(datetime::encode(s))),
        other => Ok(other.clone()),
    }
}

pub fn decode(value: &Value, _document: &Document, _config: &DatabaseConfig) -> DatabaseResult<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(s) => Ok(Value::String(datetime::decode(s))),
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_passes_through() {
        let doc = Document::empty();
        let config = DatabaseConfig::default();
        assert_eq!(encode(&Value::Null, &doc, &config).unwrap(), Value::Null);
        assert_eq!(decode(&Value::Null, &doc, &config).unwrap(), Value::Null);
    }

    #[test]
    fn encode_canonicalizes_timestamp() {
        let doc = Document::empty();
        let config = DatabaseConfig::default();
        let encoded = encode(&json!("2024-01-02T03:04:05Z"), &doc, &config).unwrap();
        assert!(encoded.as_str().unwrap().starts_with("2024-01-02T03:04:05"));
    }
}
