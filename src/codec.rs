//! Codec Pipeline (C5, §4.5): encode / decode / cast between in-memory
//! documents and backend rows.

use serde_json::Value;

use crate::constants::{
    INTERNAL_ATTRIBUTES, TYPE_BOOLEAN, TYPE_FLOAT, TYPE_INTEGER, TYPE_STRING,
};
use crate::document::{Document, SetMode};
use crate::engine::DatabaseConfig;
use crate::error::DatabaseResult;
use crate::filters::FilterRegistry;
use crate::schema::types::{Attribute, Collection};

/// Encodes `document` for the backend: substitutes defaults, applies each
/// attribute's filter chain in forward order, and wraps/unwraps
/// array-vs-scalar shape around the chain.
pub fn encode(
    collection: &Collection,
    filters: &FilterRegistry,
    document: &Document,
    config: &DatabaseConfig,
) -> DatabaseResult<Document> {
    let mut encoded = document.clone();

    for attribute in non_relationship_attributes(collection) {
        let raw = document.get_attribute(&attribute.id).cloned();
        let value = match raw {
            None | Some(Value::Null) => attribute.default.clone().unwrap_or(Value::Null),
            Some(v) => v,
        };

        let elements: Vec<Value> = match &value {
            Value::Array(items) if attribute.array => items.clone(),
            Value::Null => vec![Value::Null],
            other => vec![other.clone()],
        };

        let mut transformed = Vec::with_capacity(elements.len());
        for element in elements {
            if element.is_null() {
                transformed.push(element);
                continue;
            }
            let mut current = element;
            for filter_name in &attribute.filters {
                let filter = filters.resolve(filter_name)?;
                current = (filter.encode)(&current, document, config)?;
            }
            transformed.push(current);
        }

        let result = if attribute.array {
            Value::Array(transformed)
        } else {
            transformed.into_iter().next().unwrap_or(Value::Null)
        };
        encoded.set_attribute(&attribute.id, result, SetMode::Assign);
    }

    Ok(encoded)
}

/// Decodes a backend row into an in-memory document, applying each
/// attribute's filter chain in **reversed** order. When `selections` is
/// non-empty, only those keys (plus system fields) are written back after
/// every attribute has been decoded — earlier filters may have
/// side-effects later filters depend on, so the restriction happens last.
pub fn decode(
    collection: &Collection,
    filters: &FilterRegistry,
    document: &Document,
    selections: &[String],
    config: &DatabaseConfig,
) -> DatabaseResult<Document> {
    let mut decoded = document.clone();

    for attribute in non_relationship_attributes(collection) {
        let Some(raw) = document.get_attribute(&attribute.id).cloned() else {
            continue;
        };

        let elements: Vec<Value> = match &raw {
            Value::Array(items) if attribute.array => items.clone(),
            other => vec![other.clone()],
        };

        let mut transformed = Vec::with_capacity(elements.len());
        for element in elements {
            if element.is_null() {
                transformed.push(element);
                continue;
            }
            let mut current = element;
            for filter_name in attribute.filters.iter().rev() {
                let filter = filters.resolve(filter_name)?;
                current = (filter.decode)(&current, document, config)?;
            }
            transformed.push(current);
        }

        let result = if attribute.array {
            Value::Array(transformed)
        } else {
            transformed.into_iter().next().unwrap_or(Value::Null)
        };
        decoded.set_attribute(&attribute.id, result, SetMode::Assign);
    }

    if !selections.is_empty() {
        let mut restricted = Document::empty();
        let keys: Vec<String> = selections
            .iter()
            .cloned()
            .chain(INTERNAL_ATTRIBUTES.iter().map(|s| s.to_string()))
            .collect();
        for key in &keys {
            if let Some(value) = decoded.get_attribute(key) {
                restricted.set_attribute(key, value.clone(), SetMode::Assign);
            }
        }
        restricted.set_permissions(decoded.raw_permissions());
        return Ok(restricted);
    }

    Ok(decoded)
}

/// Coerces each non-null value to its declared primitive type, for
/// adapters that report `get_support_for_casting() == false`.
pub fn cast(collection: &Collection, document: &Document) -> Document {
    let mut casted = document.clone();
    for attribute in non_relationship_attributes(collection) {
        let Some(value) = document.get_attribute(&attribute.id).cloned() else {
            continue;
        };
        let new_value = if attribute.array {
            let items = match value {
                Value::Array(items) => items,
                Value::String(s) => serde_json::from_str(&s).unwrap_or_default(),
                other => vec![other],
            };
            Value::Array(items.into_iter().map(|v| cast_scalar(attribute, v)).collect())
        } else {
            cast_scalar(attribute, value)
        };
        casted.set_attribute(&attribute.id, new_value, SetMode::Assign);
    }
    casted
}

fn cast_scalar(attribute: &Attribute, value: Value) -> Value {
    if value.is_null() {
        return value;
    }
    match attribute.attr_type.as_str() {
        t if t == TYPE_BOOLEAN => match value {
            Value::String(s) => Value::Bool(s == "true" || s == "1"),
            Value::Number(n) => Value::Bool(n.as_i64() != Some(0)),
            other => other,
        },
        t if t == TYPE_INTEGER => match &value {
            Value::String(s) => s.parse::<i64>().map(Value::from).unwrap_or(value),
            _ => value,
        },
        t if t == TYPE_FLOAT => match &value {
            Value::String(s) => s.parse::<f64>().map(Value::from).unwrap_or(value),
            _ => value,
        },
        t if t == TYPE_STRING => value,
        _ => value,
    }
}

fn non_relationship_attributes(collection: &Collection) -> impl Iterator<Item = &Attribute> {
    collection.attributes.iter().filter(|a| !a.is_relationship())
}
