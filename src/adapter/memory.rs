//! In-memory reference adapter.
//!
//! Stands in for a real storage backend purely so the crate's own test
//! suite can exercise the Document Engine and Schema Manager end-to-end.
//! Not the product — just a fixture.

use std::collections::HashMap;

use crate::document::{Document, SetMode};
use crate::error::{DatabaseError, DatabaseResult};
use crate::query::{Method, Query};
use crate::schema::types::{Attribute, Index};

use super::{next_internal_id, Adapter};

struct CollectionState {
    attributes: Vec<Attribute>,
    indexes: Vec<Index>,
    documents: HashMap<String, Document>,
    insertion_order: Vec<String>,
    internal_counter: u64,
}

impl CollectionState {
    fn new() -> Self {
        Self {
            attributes: Vec::new(),
            indexes: Vec::new(),
            documents: HashMap::new(),
            insertion_order: Vec::new(),
            internal_counter: 0,
        }
    }
}

/// A namespaced, process-local map of collections to documents.
pub struct InMemoryAdapter {
    namespace: String,
    default_database: String,
    databases: Vec<String>,
    collections: HashMap<String, CollectionState>,
}

impl InMemoryAdapter {
    pub fn new() -> Self {
        Self {
            namespace: String::new(),
            default_database: String::new(),
            databases: Vec::new(),
            collections: HashMap::new(),
        }
    }

    fn collection_mut(&mut self, collection: &str) -> DatabaseResult<&mut CollectionState> {
        self.collections
            .get_mut(collection)
            .ok_or_else(|| DatabaseError::generic(format!("Collection not found: \"{collection}\"")))
    }

    fn collection(&self, collection: &str) -> DatabaseResult<&CollectionState> {
        self.collections
            .get(collection)
            .ok_or_else(|| DatabaseError::generic(format!("Collection not found: \"{collection}\"")))
    }
}

impl Default for InMemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Adapter for InMemoryAdapter {
    fn set_namespace(&mut self, namespace: &str) {
        self.namespace = namespace.to_string();
    }

    fn get_namespace(&self) -> String {
        self.namespace.clone()
    }

    fn set_default_database(&mut self, name: &str) {
        self.default_database = name.to_string();
    }

    fn get_default_database(&self) -> String {
        self.default_database.clone()
    }

    fn ping(&self) -> DatabaseResult<bool> {
        Ok(true)
    }

    fn create_database(&mut self, name: &str) -> DatabaseResult<()> {
        if self.databases.iter().any(|d| d == name) {
            return Err(DatabaseError::duplicate(format!("Database already exists: \"{name}\"")));
        }
        self.databases.push(name.to_string());
        Ok(())
    }

    fn delete_database(&mut self, name: &str) -> DatabaseResult<()> {
        self.databases.retain(|d| d != name);
        Ok(())
    }

    fn list_databases(&self) -> Vec<String> {
        self.databases.clone()
    }

    fn exists(&self, database: &str, collection: Option<&str>) -> bool {
        let database_known = self.databases.iter().any(|d| d == database);
        match collection {
            Some(id) => database_known && self.collection_exists(id),
            None => database_known,
        }
    }

    fn collection_exists(&self, collection: &str) -> bool {
        self.collections.contains_key(collection)
    }

    fn create_collection(&mut self, collection: &str) -> DatabaseResult<()> {
        if self.collections.contains_key(collection) {
            return Err(DatabaseError::duplicate(format!(
                "Collection already exists: \"{collection}\""
            )));
        }
        self.collections.insert(collection.to_string(), CollectionState::new());
        Ok(())
    }

    fn delete_collection(&mut self, collection: &str) -> DatabaseResult<()> {
        self.collections.remove(collection);
        Ok(())
    }

    fn create_attribute(&mut self, collection: &str, attribute: &Attribute) -> DatabaseResult<()> {
        let state = self.collection_mut(collection)?;
        state.attributes.push(attribute.clone());
        Ok(())
    }

    fn update_attribute(&mut self, collection: &str, attribute: &Attribute) -> DatabaseResult<()> {
        let state = self.collection_mut(collection)?;
        if let Some(existing) = state
            .attributes
            .iter_mut()
            .find(|a| a.id.eq_ignore_ascii_case(&attribute.id))
        {
            *existing = attribute.clone();
            Ok(())
        } else {
            Err(DatabaseError::generic(format!(
                "Attribute not found: \"{}\"",
                attribute.id
            )))
        }
    }

    fn delete_attribute(&mut self, collection: &str, attribute_id: &str) -> DatabaseResult<()> {
        let state = self.collection_mut(collection)?;
        state.attributes.retain(|a| !a.id.eq_ignore_ascii_case(attribute_id));
        for document in state.documents.values_mut() {
            document.remove_attribute(attribute_id);
        }
        Ok(())
    }

    fn rename_attribute(&mut self, collection: &str, old_id: &str, new_id: &str) -> DatabaseResult<()> {
        let state = self.collection_mut(collection)?;
        if let Some(attribute) = state
            .attributes
            .iter_mut()
            .find(|a| a.id.eq_ignore_ascii_case(old_id))
        {
            attribute.id = new_id.to_string();
        }
        for document in state.documents.values_mut() {
            if let Some(value) = document.remove_attribute(old_id) {
                document.set_attribute(new_id, value, SetMode::Assign);
            }
        }
        Ok(())
    }

    fn create_index(&mut self, collection: &str, index: &Index) -> DatabaseResult<()> {
        let state = self.collection_mut(collection)?;
        state.indexes.push(index.clone());
        Ok(())
    }

    fn delete_index(&mut self, collection: &str, index_id: &str) -> DatabaseResult<()> {
        let state = self.collection_mut(collection)?;
        state.indexes.retain(|i| !i.id.eq_ignore_ascii_case(index_id));
        Ok(())
    }

    fn rename_index(&mut self, collection: &str, old_id: &str, new_id: &str) -> DatabaseResult<()> {
        let state = self.collection_mut(collection)?;
        if let Some(index) = state.indexes.iter_mut().find(|i| i.id.eq_ignore_ascii_case(old_id)) {
            index.id = new_id.to_string();
        }
        Ok(())
    }

    fn get_document(&self, collection: &str, id: &str) -> DatabaseResult<Option<Document>> {
        let state = self.collection(collection)?;
        Ok(state.documents.get(id).cloned())
    }

    fn create_document(&mut self, collection: &str, mut document: Document) -> DatabaseResult<Document> {
        let state = self.collection_mut(collection)?;
        let id = document
            .get_id()
            .ok_or_else(|| DatabaseError::generic("Document is missing \"$id\""))?
            .to_string();
        if state.documents.contains_key(&id) {
            return Err(DatabaseError::duplicate(format!("Document already exists: \"{id}\"")));
        }
        let internal_id = next_internal_id(&mut state.internal_counter);
        document.set_attribute("$internalId", serde_json::Value::String(internal_id), SetMode::Assign);
        state.documents.insert(id.clone(), document.clone());
        state.insertion_order.push(id);
        Ok(document)
    }

    fn update_document(&mut self, collection: &str, document: Document) -> DatabaseResult<Document> {
        let state = self.collection_mut(collection)?;
        let id = document
            .get_id()
            .ok_or_else(|| DatabaseError::generic("Document is missing \"$id\""))?
            .to_string();
        state.documents.insert(id, document.clone());
        Ok(document)
    }

    fn delete_document(&mut self, collection: &str, id: &str) -> DatabaseResult<()> {
        let state = self.collection_mut(collection)?;
        state.documents.remove(id);
        state.insertion_order.retain(|existing| existing != id);
        Ok(())
    }

    fn increase_document_attribute(
        &mut self,
        collection: &str,
        id: &str,
        attribute: &str,
        delta: f64,
        min: Option<f64>,
        max: Option<f64>,
    ) -> DatabaseResult<f64> {
        let state = self.collection_mut(collection)?;
        let document = state
            .documents
            .get_mut(id)
            .ok_or_else(|| DatabaseError::generic(format!("Document not found: \"{id}\"")))?;
        let current = document
            .get_attribute(attribute)
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        let updated = current + delta;
        if let Some(max) = max {
            if updated > max {
                return Err(DatabaseError::generic("Value exceeds the maximum bound"));
            }
        }
        if let Some(min) = min {
            if updated < min {
                return Err(DatabaseError::generic("Value exceeds the minimum bound"));
            }
        }
        let stored = if updated.fract() == 0.0 {
            serde_json::Value::from(updated as i64)
        } else {
            serde_json::Value::from(updated)
        };
        document.set_attribute(attribute, stored, SetMode::Assign);
        Ok(updated)
    }

    fn find(
        &self,
        collection: &str,
        filters: &[Query],
        limit: u64,
        offset: u64,
        order_attributes: &[String],
        order_types: &[&str],
        cursor: Option<&str>,
        cursor_direction: &str,
    ) -> DatabaseResult<Vec<Document>> {
        let state = self.collection(collection)?;
        let mut rows: Vec<Document> = state
            .insertion_order
            .iter()
            .filter_map(|id| state.documents.get(id).cloned())
            .filter(|doc| filters.iter().all(|q| matches_filter(doc, q)))
            .collect();

        for (attribute, &order) in order_attributes.iter().zip(order_types.iter()) {
            let descending = order == crate::constants::ORDER_DESC;
            rows.sort_by(|a, b| {
                let av = a.get_attribute(attribute).cloned().unwrap_or(serde_json::Value::Null);
                let bv = b.get_attribute(attribute).cloned().unwrap_or(serde_json::Value::Null);
                let ordering = compare_values(&av, &bv);
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        if let Some(cursor_id) = cursor {
            if let Some(position) = rows.iter().position(|d| d.get_id() == Some(cursor_id)) {
                rows = if cursor_direction == crate::constants::CURSOR_BEFORE {
                    rows[..position].to_vec()
                } else {
                    rows[position + 1..].to_vec()
                };
            }
        }

        let start = offset as usize;
        if start >= rows.len() {
            return Ok(Vec::new());
        }
        let end = if limit == 0 {
            rows.len()
        } else {
            (start + limit as usize).min(rows.len())
        };
        Ok(rows[start..end].to_vec())
    }

    fn count(&self, collection: &str, filters: &[Query], max: u64) -> DatabaseResult<u64> {
        let state = self.collection(collection)?;
        let count = state
            .documents
            .values()
            .filter(|doc| filters.iter().all(|q| matches_filter(doc, q)))
            .count() as u64;
        Ok(if max > 0 { count.min(max) } else { count })
    }

    fn sum(&self, collection: &str, attribute: &str, filters: &[Query], max: u64) -> DatabaseResult<f64> {
        let state = self.collection(collection)?;
        let mut total = 0.0;
        let mut considered = 0u64;
        for document in state.documents.values() {
            if !filters.iter().all(|q| matches_filter(document, q)) {
                continue;
            }
            if max > 0 && considered >= max {
                break;
            }
            total += document.get_attribute(attribute).and_then(|v| v.as_f64()).unwrap_or(0.0);
            considered += 1;
        }
        Ok(total)
    }

    fn get_limit_for_attributes(&self) -> usize {
        1024
    }

    fn get_limit_for_indexes(&self) -> usize {
        64
    }

    fn get_limit_for_string(&self) -> u64 {
        1_000_000
    }

    fn get_limit_for_int(&self) -> u64 {
        i64::MAX as u64
    }

    fn get_count_of_attributes(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(|s| s.attributes.len())
            .unwrap_or(0)
    }

    fn get_count_of_indexes(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(|s| s.indexes.len())
            .unwrap_or(0)
    }

    fn get_count_of_default_attributes(&self) -> usize {
        0
    }

    fn get_count_of_default_indexes(&self) -> usize {
        0
    }

    fn get_document_size_limit(&self) -> u64 {
        16_000_000
    }

    fn get_attribute_width(&self, attribute: &Attribute) -> u64 {
        let scalar = match attribute.attr_type.as_str() {
            t if t == crate::constants::TYPE_STRING => attribute.size.max(1),
            t if t == crate::constants::TYPE_INTEGER => 8,
            t if t == crate::constants::TYPE_FLOAT => 8,
            t if t == crate::constants::TYPE_BOOLEAN => 1,
            t if t == crate::constants::TYPE_DATETIME => 30,
            t if t == crate::constants::TYPE_RELATIONSHIP => 0,
            _ => attribute.size.max(1),
        };
        if attribute.array {
            scalar * 4
        } else {
            scalar
        }
    }

    fn get_support_for_index(&self) -> bool {
        true
    }

    fn get_support_for_unique_index(&self) -> bool {
        true
    }

    fn get_support_for_casting(&self) -> bool {
        true
    }

    fn get_keywords(&self) -> Vec<&'static str> {
        Vec::new()
    }
}

fn matches_filter(document: &Document, query: &Query) -> bool {
    let Some(value) = document.get_attribute(query.get_attribute()) else {
        return matches!(query.get_method(), Method::IsNull);
    };
    match query.get_method() {
        Method::Equal => query.get_values().iter().any(|v| v == value),
        Method::NotEqual => query.get_values().iter().all(|v| v != value),
        Method::LessThan => query.get_values().first().is_some_and(|v| compare_values(value, v).is_lt()),
        Method::LessThanEqual => query.get_values().first().is_some_and(|v| compare_values(value, v).is_le()),
        Method::GreaterThan => query.get_values().first().is_some_and(|v| compare_values(value, v).is_gt()),
        Method::GreaterThanEqual => query.get_values().first().is_some_and(|v| compare_values(value, v).is_ge()),
        Method::Contains => match (value, query.get_values().first()) {
            (serde_json::Value::Array(items), Some(needle)) => items.contains(needle),
            (serde_json::Value::String(s), Some(needle)) => {
                needle.as_str().is_some_and(|n| s.contains(n))
            }
            _ => false,
        },
        Method::Search => value
            .as_str()
            .zip(query.get_values().first().and_then(|v| v.as_str()))
            .is_some_and(|(haystack, needle)| haystack.to_lowercase().contains(&needle.to_lowercase())),
        Method::Between => {
            let values = query.get_values();
            values.len() == 2
                && compare_values(value, &values[0]).is_ge()
                && compare_values(value, &values[1]).is_le()
        }
        Method::IsNull => value.is_null(),
        Method::IsNotNull => !value.is_null(),
        Method::StartsWith => value
            .as_str()
            .zip(query.get_values().first().and_then(|v| v.as_str()))
            .is_some_and(|(s, prefix)| s.starts_with(prefix)),
        Method::EndsWith => value
            .as_str()
            .zip(query.get_values().first().and_then(|v| v.as_str()))
            .is_some_and(|(s, suffix)| s.ends_with(suffix)),
        _ => true,
    }
}

fn compare_values(a: &serde_json::Value, b: &serde_json::Value) -> std::cmp::Ordering {
    use serde_json::Value;
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .unwrap_or(0.0)
            .partial_cmp(&b.as_f64().unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => std::cmp::Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::Attribute;
    use serde_json::json;

    fn sample_document(id: &str, title: &str) -> Document {
        let mut doc = Document::empty();
        doc.set_attribute("$id", json!(id), SetMode::Assign);
        doc.set_attribute("title", json!(title), SetMode::Assign);
        doc
    }

    #[test]
    fn create_and_get_document_round_trips() {
        let mut adapter = InMemoryAdapter::new();
        adapter.create_collection("books").unwrap();
        adapter.create_document("books", sample_document("b1", "Dune")).unwrap();
        let fetched = adapter.get_document("books", "b1").unwrap().unwrap();
        assert_eq!(fetched.get_attribute("title"), Some(&json!("Dune")));
        assert!(fetched.get_internal_id().is_some());
    }

    #[test]
    fn duplicate_document_id_is_rejected() {
        let mut adapter = InMemoryAdapter::new();
        adapter.create_collection("books").unwrap();
        adapter.create_document("books", sample_document("b1", "Dune")).unwrap();
        let err = adapter
            .create_document("books", sample_document("b1", "Again"))
            .unwrap_err();
        assert_eq!(err.code(), "duplicate");
    }

    #[test]
    fn increase_respects_max_bound() {
        let mut adapter = InMemoryAdapter::new();
        adapter.create_collection("counters").unwrap();
        let mut doc = Document::empty();
        doc.set_attribute("$id", json!("c1"), SetMode::Assign);
        doc.set_attribute("count", json!(5), SetMode::Assign);
        adapter.create_document("counters", doc).unwrap();

        let err = adapter
            .increase_document_attribute("counters", "c1", "count", 3.0, None, Some(7.0))
            .unwrap_err();
        assert_eq!(err.code(), "generic");

        let value = adapter
            .increase_document_attribute("counters", "c1", "count", 2.0, None, Some(7.0))
            .unwrap();
        assert_eq!(value, 7.0);
    }

    #[test]
    fn rename_attribute_moves_stored_values() {
        let mut adapter = InMemoryAdapter::new();
        adapter.create_collection("books").unwrap();
        adapter
            .create_attribute("books", &Attribute::new("title", crate::constants::TYPE_STRING, 128))
            .unwrap();
        adapter.create_document("books", sample_document("b1", "Dune")).unwrap();
        adapter.rename_attribute("books", "title", "name").unwrap();
        let fetched = adapter.get_document("books", "b1").unwrap().unwrap();
        assert_eq!(fetched.get_attribute("title"), None);
        assert_eq!(fetched.get_attribute("name"), Some(&json!("Dune")));
    }

    #[test]
    fn exists_checks_database_then_collection() {
        let mut adapter = InMemoryAdapter::new();
        adapter.create_database("main").unwrap();
        adapter.create_collection("books").unwrap();
        assert!(adapter.exists("main", None));
        assert!(adapter.exists("main", Some("books")));
        assert!(!adapter.exists("main", Some("missing")));
        assert!(!adapter.exists("other", None));
    }

    #[test]
    fn attribute_width_scales_with_declared_size_and_array_shape() {
        let adapter = InMemoryAdapter::new();
        let string_attr = Attribute::new("title", crate::constants::TYPE_STRING, 128);
        assert_eq!(adapter.get_attribute_width(&string_attr), 128);
        let array_attr = Attribute::new("tags", crate::constants::TYPE_STRING, 32).array(true);
        assert_eq!(adapter.get_attribute_width(&array_attr), 128);
        let int_attr = Attribute::new("pages", crate::constants::TYPE_INTEGER, 0);
        assert_eq!(adapter.get_attribute_width(&int_attr), 8);
    }

    #[test]
    fn find_respects_limit_and_filter() {
        let mut adapter = InMemoryAdapter::new();
        adapter.create_collection("books").unwrap();
        adapter.create_document("books", sample_document("b1", "Dune")).unwrap();
        adapter.create_document("books", sample_document("b2", "Paper Towns")).unwrap();
        let results = adapter
            .find("books", &[Query::equal("title", json!("Dune"))], 10, 0, &[], &[], None, "after")
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get_id(), Some("b1"));
    }
}
