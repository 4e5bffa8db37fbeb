//! Format registry (§4.6.1, ADDED).
//!
//! Attributes may declare an optional `format` name plus `formatOptions`.
//! Formats are validated the same way filters are (§4.1): a process-wide
//! registry of built-ins, shadowed by a per-instance registry, keyed by
//! `(type, format_name)` so the same format name can mean different things
//! for different attribute types.

use std::collections::HashMap;

use serde_json::Value;

use crate::constants::TYPE_STRING;
use crate::error::{DatabaseError, DatabaseResult};

/// A format validator: given an attribute's declared `formatOptions` and a
/// candidate value, returns whether the value conforms.
pub type FormatCheck = fn(options: &Value, value: &Value) -> bool;

#[derive(Clone)]
pub struct FormatRegistry {
    entries: HashMap<(String, String), FormatCheck>,
}

impl FormatRegistry {
    /// A registry pre-loaded with the two mandatory built-ins.
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            entries: HashMap::new(),
        };
        registry.register(TYPE_STRING, "email", email_check);
        registry.register(TYPE_STRING, "enum", enum_check);
        registry
    }

    pub fn register(&mut self, attribute_type: &str, name: &str, check: FormatCheck) {
        self.entries
            .insert((attribute_type.to_string(), name.to_string()), check);
    }

    pub fn is_registered(&self, attribute_type: &str, name: &str) -> bool {
        self.entries
            .contains_key(&(attribute_type.to_string(), name.to_string()))
    }

    pub fn validate(
        &self,
        attribute_type: &str,
        name: &str,
        options: &Value,
        value: &Value,
    ) -> DatabaseResult<bool> {
        let check = self
            .entries
            .get(&(attribute_type.to_string(), name.to_string()))
            .ok_or_else(|| {
                DatabaseError::generic(format!(
                    "unknown format '{name}' for type '{attribute_type}'"
                ))
            })?;
        Ok(check(options, value))
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn email_check(_options: &Value, value: &Value) -> bool {
    match value.as_str() {
        Some(s) => !s.is_empty() && s.contains('@') && !s.starts_with('@') && !s.ends_with('@'),
        None => false,
    }
}

fn enum_check(options: &Value, value: &Value) -> bool {
    let Some(value) = value.as_str() else {
        return false;
    };
    options
        .get("elements")
        .and_then(Value::as_array)
        .map(|elements| elements.iter().filter_map(Value::as_str).any(|e| e == value))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn email_format_rejects_missing_at_sign() {
        let registry = FormatRegistry::with_builtins();
        assert!(!registry
            .validate(TYPE_STRING, "email", &Value::Null, &json!("not-an-email"))
            .unwrap());
        assert!(registry
            .validate(TYPE_STRING, "email", &Value::Null, &json!("a@b.com"))
            .unwrap());
    }

    #[test]
    fn enum_format_checks_membership() {
        let registry = FormatRegistry::with_builtins();
        let options = json!({"elements": ["draft", "live"]});
        assert!(registry
            .validate(TYPE_STRING, "enum", &options, &json!("live"))
            .unwrap());
        assert!(!registry
            .validate(TYPE_STRING, "enum", &options, &json!("archived"))
            .unwrap());
    }

    #[test]
    fn unregistered_format_is_generic_error() {
        let registry = FormatRegistry::with_builtins();
        let err = registry
            .validate(TYPE_STRING, "phone", &Value::Null, &json!("555"))
            .unwrap_err();
        assert_eq!(err.code(), "generic");
    }
}
