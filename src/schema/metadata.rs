//! The hard-coded `_metadata` collection description (C2, §4.2).
//!
//! `_metadata`'s own shape never goes through the Schema Manager: it is
//! returned from memory so the catalog can describe itself without a
//! chicken-and-egg bootstrap step.

use serde_json::json;

use crate::constants::{METADATA_COLLECTION, TYPE_STRING};
use crate::document::{permission_string, Document, Permission, SetMode};
use crate::schema::types::{Attribute, Collection};

/// The `_metadata` collection descriptor: `name`, `attributes`, `indexes`
/// stored as large JSON-filtered string fields, plus `$permissions`.
pub fn collection() -> Collection {
    let mut collection = Collection::new(METADATA_COLLECTION, METADATA_COLLECTION);
    collection.attributes = vec![
        Attribute::new("name", TYPE_STRING, 256).required(true),
        Attribute::new("attributes", TYPE_STRING, 1_000_000)
            .required(false)
            .with_filter("json"),
        Attribute::new("indexes", TYPE_STRING, 1_000_000)
            .required(false)
            .with_filter("json"),
    ];
    collection
}

/// The hard-coded document `getDocument("_metadata", "_metadata")` returns:
/// a description of the metadata collection describing itself.
pub fn bootstrap_document() -> Document {
    let collection = collection();
    let mut document = Document::empty();
    document.set_attribute(
        "$id",
        json!(METADATA_COLLECTION),
        SetMode::Assign,
    );
    document.set_attribute(
        "$collection",
        json!(METADATA_COLLECTION),
        SetMode::Assign,
    );
    document.set_attribute("name", json!(METADATA_COLLECTION), SetMode::Assign);
    document.set_attribute(
        "attributes",
        serde_json::to_value(&collection.attributes).unwrap_or(json!([])),
        SetMode::Assign,
    );
    document.set_attribute(
        "indexes",
        serde_json::to_value(&collection.indexes).unwrap_or(json!([])),
        SetMode::Assign,
    );
    document.set_permissions(vec![permission_string(Permission::Read, "any")]);
    document
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_document_describes_itself() {
        let doc = bootstrap_document();
        assert_eq!(doc.get_id(), Some(METADATA_COLLECTION));
        assert_eq!(
            doc.get_attribute("name").and_then(|v| v.as_str()),
            Some(METADATA_COLLECTION)
        );
    }

    #[test]
    fn collection_declares_json_filtered_fields() {
        let collection = collection();
        let attrs = collection.find_attribute("attributes").unwrap();
        assert!(attrs.filters.contains(&"json".to_string()));
    }
}
