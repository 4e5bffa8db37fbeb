//! Structure and index validators (§3, §4.3, §4.4).
//!
//! Mirrors the strictness style of a schema validator that rejects rather
//! than coerces: missing required attributes, undeclared attributes, nulls
//! on required fields, type mismatches and bad formats are all rejections,
//! never silent fixups.

use serde_json::Value;

use crate::constants::{
    INDEX_ARRAY, INDEX_FULLTEXT, INDEX_KEY, INDEX_SPATIAL, INDEX_UNIQUE, INTERNAL_ATTRIBUTES,
    TYPE_BOOLEAN, TYPE_DATETIME, TYPE_FLOAT, TYPE_INTEGER, TYPE_RELATIONSHIP, TYPE_STRING,
};
use crate::document::Document;
use crate::format::FormatRegistry;
use crate::schema::types::{Attribute, Collection, Index};

/// Validates a document's attribute values against a collection's declared
/// attributes. Returns a human-readable reason on the first failure found;
/// `None` means the document is structurally valid.
pub struct StructureValidator<'a> {
    collection: &'a Collection,
    formats: &'a FormatRegistry,
}

impl<'a> StructureValidator<'a> {
    pub fn new(collection: &'a Collection, formats: &'a FormatRegistry) -> Self {
        Self { collection, formats }
    }

    pub fn is_valid(&self, document: &Document) -> bool {
        self.description(document).is_none()
    }

    /// Returns `None` if valid, or a description of the first violation.
    pub fn description(&self, document: &Document) -> Option<String> {
        for key in document.as_map().keys() {
            if INTERNAL_ATTRIBUTES.contains(&key.as_str()) || key == "$permissions" {
                continue;
            }
            if !self.collection.has_attribute(key) && !self.collection_relationship(key) {
                return Some(format!("Unknown attribute: \"{key}\""));
            }
        }

        for attribute in &self.collection.attributes {
            if attribute.is_relationship() {
                continue;
            }
            let value = document.get_attribute(&attribute.id);
            if let Some(reason) = self.validate_attribute(attribute, value) {
                return Some(reason);
            }
        }

        None
    }

    fn collection_relationship(&self, key: &str) -> bool {
        self.collection
            .attributes
            .iter()
            .any(|a| a.is_relationship() && a.id.eq_ignore_ascii_case(key))
    }

    fn validate_attribute(&self, attribute: &Attribute, value: Option<&Value>) -> Option<String> {
        let missing_or_null = matches!(value, None | Some(Value::Null));

        if attribute.required && missing_or_null {
            return Some(format!("Missing required attribute: \"{}\"", attribute.id));
        }

        let Some(value) = value else {
            return None;
        };
        if value.is_null() {
            return None;
        }

        if attribute.array {
            let Value::Array(items) = value else {
                return Some(format!("Attribute \"{}\" must be an array", attribute.id));
            };
            for item in items {
                if let Some(reason) = self.validate_scalar(attribute, item) {
                    return Some(reason);
                }
            }
            return None;
        }

        self.validate_scalar(attribute, value)
    }

    fn validate_scalar(&self, attribute: &Attribute, value: &Value) -> Option<String> {
        let type_ok = match attribute.attr_type.as_str() {
            t if t == TYPE_STRING => value.is_string(),
            t if t == TYPE_INTEGER => value.is_i64() || value.is_u64(),
            t if t == TYPE_FLOAT => value.is_f64() || value.is_i64() || value.is_u64(),
            t if t == TYPE_BOOLEAN => value.is_boolean(),
            t if t == TYPE_DATETIME => value.is_string(),
            _ => true,
        };
        if !type_ok {
            return Some(format!(
                "Attribute \"{}\" must be of type {}",
                attribute.id, attribute.attr_type
            ));
        }

        if attribute.attr_type == TYPE_STRING {
            if let Some(s) = value.as_str() {
                if s.len() as u64 > attribute.size {
                    return Some(format!(
                        "Attribute \"{}\" exceeds maximum length of {}",
                        attribute.id, attribute.size
                    ));
                }
            }
        }

        if let Some(format) = &attribute.format {
            let valid = self
                .formats
                .validate(&attribute.attr_type, format, &attribute.format_options, value)
                .unwrap_or(false);
            if !valid {
                return Some(format!(
                    "Attribute \"{}\" does not match format \"{}\"",
                    attribute.id, format
                ));
            }
        }

        None
    }
}

/// Validates an index descriptor against a collection's attributes and an
/// adapter's capability limits.
pub struct IndexValidator<'a> {
    collection: &'a Collection,
    max_attributes: usize,
    supports_unique: bool,
}

impl<'a> IndexValidator<'a> {
    pub fn new(collection: &'a Collection, max_attributes: usize, supports_unique: bool) -> Self {
        Self {
            collection,
            max_attributes,
            supports_unique,
        }
    }

    pub fn is_valid(&self, index: &Index) -> bool {
        self.description(index).is_none()
    }

    pub fn description(&self, index: &Index) -> Option<String> {
        if index.attributes.is_empty() {
            return Some("Index must contain at least one attribute".to_string());
        }
        if index.attributes.len() > self.max_attributes {
            return Some(format!(
                "Index attributes exceed maximum of {}",
                self.max_attributes
            ));
        }
        for attribute_id in &index.attributes {
            if !self.collection.has_attribute(attribute_id) {
                return Some(format!("Unknown attribute: \"{attribute_id}\""));
            }
        }
        match index.index_type.as_str() {
            t if t == INDEX_UNIQUE && !self.supports_unique => {
                Some("Adapter does not support unique indexes".to_string())
            }
            t if t == INDEX_FULLTEXT && !self.supports_unique => {
                // Fulltext is gated on the same capability flag as unique
                // indexes, unchanged from how the underlying adapter reports it.
                Some("Adapter does not support fulltext indexes".to_string())
            }
            t if t == INDEX_KEY || t == INDEX_SPATIAL || t == INDEX_ARRAY => None,
            t if t == INDEX_UNIQUE || t == INDEX_FULLTEXT => None,
            other => Some(format!("Unknown index type: \"{other}\"")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn books() -> Collection {
        let mut collection = Collection::new("books", "books");
        collection
            .attributes
            .push(Attribute::new("title", TYPE_STRING, 256).required(true));
        collection
            .attributes
            .push(Attribute::new("pages", TYPE_INTEGER, 0).required(false));
        collection
    }

    #[test]
    fn rejects_missing_required_attribute() {
        let collection = books();
        let formats = FormatRegistry::with_builtins();
        let validator = StructureValidator::new(&collection, &formats);
        let doc = Document::from_map(json!({"pages": 10}).as_object().unwrap().clone());
        assert!(!validator.is_valid(&doc));
    }

    #[test]
    fn rejects_unknown_attribute() {
        let collection = books();
        let formats = FormatRegistry::with_builtins();
        let validator = StructureValidator::new(&collection, &formats);
        let doc = Document::from_map(
            json!({"title": "Dune", "isbn": "x"}).as_object().unwrap().clone(),
        );
        assert!(!validator.is_valid(&doc));
    }

    #[test]
    fn accepts_well_formed_document() {
        let collection = books();
        let formats = FormatRegistry::with_builtins();
        let validator = StructureValidator::new(&collection, &formats);
        let doc = Document::from_map(
            json!({"title": "Dune", "pages": 412}).as_object().unwrap().clone(),
        );
        assert!(validator.is_valid(&doc));
    }

    #[test]
    fn rejects_type_mismatch() {
        let collection = books();
        let formats = FormatRegistry::with_builtins();
        let validator = StructureValidator::new(&collection, &formats);
        let doc = Document::from_map(
            json!({"title": "Dune", "pages": "many"}).as_object().unwrap().clone(),
        );
        assert!(!validator.is_valid(&doc));
    }

    #[test]
    fn index_rejects_unknown_attribute() {
        let collection = books();
        let index = Index::new("idx_isbn", INDEX_KEY, vec!["isbn".to_string()]);
        let validator = IndexValidator::new(&collection, 16, true);
        assert!(!validator.is_valid(&index));
    }

    #[test]
    fn index_rejects_unsupported_unique() {
        let collection = books();
        let index = Index::new("idx_title", INDEX_UNIQUE, vec!["title".to_string()]);
        let validator = IndexValidator::new(&collection, 16, false);
        assert!(!validator.is_valid(&index));
    }
}
