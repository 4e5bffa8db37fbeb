//! Document Engine (C7, §4.7): CRUD plus find/count/sum, orchestrating the
//! Gate, Codec Pipeline, Cache and Adapter behind one sequential API.

use std::cell::Cell;

use serde_json::{json, Value};

use crate::adapter::Adapter;
use crate::cache::Cache;
use crate::codec::{cast, decode, encode};
use crate::constants::{
    cache_key, cache_key_wildcard, events, INTERNAL_ATTRIBUTES, METADATA_COLLECTION, TYPE_FLOAT,
    TYPE_INTEGER,
};
use crate::datetime;
use crate::document::{Document, Permission, SetMode};
use crate::error::{DatabaseError, DatabaseResult};
use crate::events::EventBus;
use crate::filters::FilterRegistry;
use crate::format::FormatRegistry;
use crate::gate;
use crate::id;
use crate::query::{group_by_type, Query};
use crate::query_normalizer;
use crate::relationship::{self, ReadAction, RelationshipValue};
use crate::schema::types::{Attribute, Collection};
use crate::schema::{metadata, SchemaManager};
use crate::validator::StructureValidator;

/// Engine-constructor configuration (§1.1 ADDED).
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub namespace: String,
    pub default_ttl: u64,
    pub default_timezone: String,
    pub max_relationship_depth: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            default_ttl: crate::constants::DEFAULT_CACHE_TTL,
            default_timezone: "UTC".to_string(),
            max_relationship_depth: relationship::MAX_FETCH_DEPTH,
        }
    }
}

/// The single logical actor per instance described in the concurrency
/// model: one engine, issued operations sequentially, against one
/// adapter/cache pair.
pub struct Engine<A: Adapter, C: Cache> {
    adapter: A,
    cache: C,
    filters: FilterRegistry,
    formats: FormatRegistry,
    events: EventBus,
    config: DatabaseConfig,
    fetch_depth: Cell<u32>,
}

impl<A: Adapter, C: Cache> Engine<A, C> {
    pub fn new(mut adapter: A, cache: C, config: DatabaseConfig) -> Self {
        adapter.set_namespace(&config.namespace);
        Self {
            adapter,
            cache,
            filters: FilterRegistry::new(),
            formats: FormatRegistry::with_builtins(),
            events: EventBus::new(),
            config,
            fetch_depth: Cell::new(0),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn filters_mut(&mut self) -> &mut FilterRegistry {
        &mut self.filters
    }

    pub fn formats_mut(&mut self) -> &mut FormatRegistry {
        &mut self.formats
    }

    pub fn schema(&mut self) -> SchemaManager<'_, A, C> {
        SchemaManager::new(&mut self.adapter, &self.events, &self.formats, &self.cache, &self.config.namespace)
    }

    pub fn get_document(&mut self, collection_id: &str, id: &str, queries: &[Query]) -> DatabaseResult<Document> {
        if id.is_empty() {
            return Ok(Document::empty());
        }
        if collection_id == METADATA_COLLECTION && id == METADATA_COLLECTION {
            return Ok(metadata::bootstrap_document());
        }

        let collection = self.schema().get_collection(collection_id)?;
        let grouped = group_by_type(queries);
        for selection in &grouped.selections {
            if !INTERNAL_ATTRIBUTES.contains(&selection.as_str()) && !collection.has_attribute(selection) {
                return Err(DatabaseError::generic(format!("Unknown attribute: \"{selection}\"")));
            }
        }

        let is_metadata = collection_id == METADATA_COLLECTION;
        let fingerprint = selection_fingerprint(&grouped.selections);
        let key = cache_key(&self.config.namespace, collection_id, id, &fingerprint);

        if let Some(cached) = self.cache.load(&key, self.config.default_ttl) {
            if let Some(document) = Document::from_json_str(&cached) {
                if is_metadata || gate::is_valid(&document, Permission::Read) {
                    return Ok(document);
                }
                return Ok(Document::empty());
            }
        }

        let Some(mut document) = self.adapter.get_document(collection_id, id)? else {
            return Ok(Document::empty());
        };
        document.set_attribute("$collection", json!(collection_id), SetMode::Assign);

        if !is_metadata && !gate::is_valid(&document, Permission::Read) {
            return Ok(Document::empty());
        }

        document = self.resolve_read_relationships(&collection, document)?;
        if !self.adapter.get_support_for_casting() {
            document = cast(&collection, &document);
        }
        let decoded = decode(&collection, &self.filters, &document, &grouped.selections, &self.config)?;

        self.cache.save(&key, decoded.to_json_string());
        if !is_metadata {
            self.events.trigger(
                events::DOCUMENT_READ,
                json!({ "collectionId": collection_id, "documentId": id }),
            );
        }

        Ok(decoded)
    }

    pub fn create_document(&mut self, collection_id: &str, mut document: Document) -> DatabaseResult<Document> {
        let collection = self.schema().get_collection(collection_id)?;

        let document_id = document
            .get_id()
            .filter(|existing| !existing.is_empty())
            .map(str::to_string)
            .unwrap_or_else(id::unique);
        if !id::is_valid_key(&document_id) {
            return Err(DatabaseError::structure(format!("Invalid document id: \"{document_id}\"")));
        }
        let now = datetime::now();
        document.set_attribute("$id", json!(document_id), SetMode::Assign);
        document.set_attribute("$collection", json!(collection_id), SetMode::Assign);
        document.set_attribute("$createdAt", json!(now), SetMode::Assign);
        document.set_attribute("$updatedAt", json!(now), SetMode::Assign);

        let (stripped, pending) = extract_relationship_values(&collection, document)?;
        let encoded = encode(&collection, &self.filters, &stripped, &self.config)?;

        let validator = StructureValidator::new(&collection, &self.formats);
        if let Some(reason) = validator.description(&encoded) {
            return Err(DatabaseError::structure(reason));
        }

        let created = self.adapter.create_document(collection_id, encoded)?;
        self.apply_relationship_writes(collection_id, &created, pending)?;

        if collection_id != METADATA_COLLECTION {
            self.events.trigger(
                events::DOCUMENT_CREATE,
                json!({ "collectionId": collection_id, "documentId": created.get_id() }),
            );
        }

        decode(&collection, &self.filters, &created, &[], &self.config)
    }

    pub fn update_document(&mut self, collection_id: &str, id: &str, patch: Document) -> DatabaseResult<Document> {
        if id.is_empty() {
            return Err(DatabaseError::generic("Document id is required"));
        }
        let collection = self.schema().get_collection(collection_id)?;
        let is_metadata = collection_id == METADATA_COLLECTION;

        let prior = gate::skip(|| self.adapter.get_document(collection_id, id))?
            .ok_or_else(|| DatabaseError::generic(format!("Document not found: \"{id}\"")))?;
        if !is_metadata && !gate::is_valid(&prior, Permission::Update) {
            return Err(DatabaseError::authorization("Caller lacks update permission"));
        }

        let mut merged = prior.clone();
        for key in patch.keys() {
            if let Some(value) = patch.get_attribute(key) {
                merged.set_attribute(key, value.clone(), SetMode::Assign);
            }
        }
        merged.set_attribute("$updatedAt", json!(datetime::now()), SetMode::Assign);

        let (stripped, pending) = extract_relationship_values(&collection, merged)?;
        let encoded = encode(&collection, &self.filters, &stripped, &self.config)?;

        let validator = StructureValidator::new(&collection, &self.formats);
        if let Some(reason) = validator.description(&encoded) {
            return Err(DatabaseError::structure(reason));
        }

        let updated = self.adapter.update_document(collection_id, encoded)?;
        self.apply_relationship_writes(collection_id, &updated, pending)?;

        self.cache.purge(&cache_key_wildcard(&self.config.namespace, collection_id, id));
        if !is_metadata {
            self.events.trigger(
                events::DOCUMENT_UPDATE,
                json!({ "collectionId": collection_id, "documentId": id }),
            );
        }

        decode(&collection, &self.filters, &updated, &[], &self.config)
    }

    pub fn delete_document(&mut self, collection_id: &str, id: &str) -> DatabaseResult<()> {
        let is_metadata = collection_id == METADATA_COLLECTION;
        let prior = gate::skip(|| self.adapter.get_document(collection_id, id))?
            .ok_or_else(|| DatabaseError::generic(format!("Document not found: \"{id}\"")))?;
        if !is_metadata && !gate::is_valid(&prior, Permission::Delete) {
            return Err(DatabaseError::authorization("Caller lacks delete permission"));
        }

        self.cache.purge(&cache_key_wildcard(&self.config.namespace, collection_id, id));
        self.adapter.delete_document(collection_id, id)?;

        if !is_metadata {
            self.events.trigger(
                events::DOCUMENT_DELETE,
                json!({ "collectionId": collection_id, "documentId": id }),
            );
        }
        Ok(())
    }

    pub fn increase_document_attribute(
        &mut self,
        collection_id: &str,
        id: &str,
        attribute_id: &str,
        value: f64,
        max: Option<f64>,
    ) -> DatabaseResult<f64> {
        if value <= 0.0 {
            return Err(DatabaseError::generic("Value for increase must be positive"));
        }
        self.adjust_document_attribute(collection_id, id, attribute_id, value, None, max)
    }

    pub fn decrease_document_attribute(
        &mut self,
        collection_id: &str,
        id: &str,
        attribute_id: &str,
        value: f64,
        min: Option<f64>,
    ) -> DatabaseResult<f64> {
        if value <= 0.0 {
            return Err(DatabaseError::generic("Value for decrease must be positive"));
        }
        self.adjust_document_attribute(collection_id, id, attribute_id, -value, min, None)
    }

    fn adjust_document_attribute(
        &mut self,
        collection_id: &str,
        id: &str,
        attribute_id: &str,
        delta: f64,
        min: Option<f64>,
        max: Option<f64>,
    ) -> DatabaseResult<f64> {
        let collection = self.schema().get_collection(collection_id)?;
        let attribute = collection
            .find_attribute(attribute_id)
            .ok_or_else(|| DatabaseError::generic(format!("Attribute not found: \"{attribute_id}\"")))?;
        if attribute.attr_type != TYPE_INTEGER && attribute.attr_type != TYPE_FLOAT {
            return Err(DatabaseError::generic(format!(
                "Attribute \"{attribute_id}\" is not numeric"
            )));
        }

        let prior = gate::skip(|| self.adapter.get_document(collection_id, id))?
            .ok_or_else(|| DatabaseError::generic(format!("Document not found: \"{id}\"")))?;
        if !gate::is_valid(&prior, Permission::Update) {
            return Err(DatabaseError::authorization("Caller lacks update permission"));
        }

        let result = self
            .adapter
            .increase_document_attribute(collection_id, id, attribute_id, delta, min, max)?;
        self.cache.purge(&cache_key_wildcard(&self.config.namespace, collection_id, id));
        Ok(result)
    }

    pub fn find(&mut self, collection_id: &str, queries: &[Query]) -> DatabaseResult<Vec<Document>> {
        let collection = self.schema().get_collection(collection_id)?;
        let grouped = group_by_type(queries);

        if let Some(cursor) = &grouped.cursor {
            if self.adapter.get_document(collection_id, cursor)?.is_none() {
                return Err(DatabaseError::generic("Cursor document does not belong to this collection"));
            }
        }

        let normalized_filters = query_normalizer::normalize(&collection, &grouped.filters);
        let rows = self.adapter.find(
            collection_id,
            &normalized_filters,
            grouped.limit,
            grouped.offset,
            &grouped.order_attributes,
            &grouped.order_types,
            grouped.cursor.as_deref(),
            grouped.cursor_direction,
        )?;

        let casts_itself = self.adapter.get_support_for_casting();
        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let row = if casts_itself { row } else { cast(&collection, &row) };
            results.push(decode(&collection, &self.filters, &row, &grouped.selections, &self.config)?);
        }

        if collection_id != METADATA_COLLECTION {
            self.events.trigger(
                events::DOCUMENT_FIND,
                json!({ "collectionId": collection_id, "count": results.len() }),
            );
        }

        Ok(results)
    }

    pub fn find_one(&mut self, collection_id: &str, queries: &[Query]) -> DatabaseResult<Option<Document>> {
        let mut limited = queries.to_vec();
        limited.push(Query::limit(1));
        Ok(self.find(collection_id, &limited)?.into_iter().next())
    }

    pub fn count(&mut self, collection_id: &str, queries: &[Query], max: u64) -> DatabaseResult<u64> {
        let collection = self.schema().get_collection(collection_id)?;
        let grouped = group_by_type(queries);
        let normalized = query_normalizer::normalize(&collection, &grouped.filters);
        self.adapter.count(collection_id, &normalized, max)
    }

    pub fn sum(&mut self, collection_id: &str, attribute_id: &str, queries: &[Query], max: u64) -> DatabaseResult<f64> {
        let collection = self.schema().get_collection(collection_id)?;
        let grouped = group_by_type(queries);
        let normalized = query_normalizer::normalize(&collection, &grouped.filters);
        self.adapter.sum(collection_id, attribute_id, &normalized, max)
    }

    fn resolve_read_relationships(&mut self, collection: &Collection, mut document: Document) -> DatabaseResult<Document> {
        let relationship_attributes: Vec<Attribute> =
            collection.attributes.iter().filter(|a| a.is_relationship()).cloned().collect();

        for attribute in relationship_attributes {
            let Some(options) = attribute.options.as_ref() else { continue };
            match relationship::read_action(options.relation_type, options.side) {
                ReadAction::NoHydration => {
                    document.remove_attribute(&attribute.id);
                }
                ReadAction::HydrateById { gated_on_two_way } => {
                    if gated_on_two_way && !options.two_way {
                        document.remove_attribute(&attribute.id);
                        continue;
                    }
                    let related_id = document.get_attribute(&attribute.id).and_then(Value::as_str).map(str::to_string);
                    if let Some(related_id) = related_id {
                        if self.fetch_depth.get() < self.config.max_relationship_depth {
                            self.fetch_depth.set(self.fetch_depth.get() + 1);
                            let hydrated = self.get_document(&options.related_collection, &related_id, &[]);
                            self.fetch_depth.set(self.fetch_depth.get().saturating_sub(1));
                            let hydrated = hydrated?;
                            if !hydrated.is_empty() {
                                document.set_attribute(&attribute.id, hydrated.into_value(), SetMode::Assign);
                            }
                        }
                    }
                }
                ReadAction::FindMany => {
                    let parent_id = document.get_id().unwrap_or_default().to_string();
                    let queries = vec![Query::equal(options.two_way_key.clone(), json!(parent_id))];
                    let mut children = self.find(&options.related_collection, &queries)?;
                    for child in &mut children {
                        child.remove_attribute(&options.two_way_key);
                    }
                    document.set_attribute(
                        &attribute.id,
                        Value::Array(children.into_iter().map(Document::into_value).collect()),
                        SetMode::Assign,
                    );
                }
            }
        }

        Ok(document)
    }

    fn apply_relationship_writes(
        &mut self,
        parent_collection_id: &str,
        parent_document: &Document,
        pending: Vec<(Attribute, RelationshipValue)>,
    ) -> DatabaseResult<()> {
        let parent_id = parent_document.get_id().unwrap_or_default().to_string();
        for (attribute, value) in pending {
            self.apply_relationship_value(parent_collection_id, &parent_id, &attribute, value)?;
        }
        Ok(())
    }

    fn apply_relationship_value(
        &mut self,
        parent_collection_id: &str,
        parent_id: &str,
        attribute: &Attribute,
        value: RelationshipValue,
    ) -> DatabaseResult<()> {
        let Some(options) = attribute.options.clone() else {
            return Err(DatabaseError::generic(format!(
                "Relationship attribute \"{}\" is missing its options",
                attribute.id
            )));
        };

        match value {
            RelationshipValue::Null => Ok(()),
            RelationshipValue::List(items) => {
                for item in items {
                    self.apply_relationship_value(parent_collection_id, parent_id, attribute, item)?;
                }
                Ok(())
            }
            RelationshipValue::Id(child_id) => self.link_related(parent_collection_id, parent_id, &options, &child_id),
            RelationshipValue::Nested(map) => {
                let nested = Document::from_map(map);
                let child_id = match nested.get_id() {
                    Some(existing_id) if self.adapter.get_document(&options.related_collection, existing_id)?.is_some() => {
                        self.update_document(&options.related_collection, existing_id, nested.clone())?;
                        existing_id.to_string()
                    }
                    _ => {
                        let created = self.create_document(&options.related_collection, nested)?;
                        created.get_id().unwrap_or_default().to_string()
                    }
                };
                self.link_related(parent_collection_id, parent_id, &options, &child_id)
            }
        }
    }

    fn link_related(
        &mut self,
        parent_collection_id: &str,
        parent_id: &str,
        options: &crate::schema::types::RelationOptions,
        child_id: &str,
    ) -> DatabaseResult<()> {
        if relationship::should_backpatch_two_way_id(options.relation_type, options.two_way) {
            if let Some(mut child) = self.adapter.get_document(&options.related_collection, child_id)? {
                child.set_attribute(&options.two_way_key, json!(parent_id), SetMode::Assign);
                self.adapter.update_document(&options.related_collection, child)?;
            }
        }

        if options.relation_type == crate::schema::types::RelationType::ManyToMany {
            let junction_id = relationship::junction_collection_id(parent_collection_id, &options.related_collection);
            let mut row = Document::empty();
            row.set_attribute("$id", json!(id::unique()), SetMode::Assign);
            row.set_attribute("id", json!(parent_id), SetMode::Assign);
            row.set_attribute("twoWayId", json!(child_id), SetMode::Assign);
            self.adapter.create_document(&junction_id, row)?;
        }

        Ok(())
    }
}

fn extract_relationship_values(
    collection: &Collection,
    mut document: Document,
) -> DatabaseResult<(Document, Vec<(Attribute, RelationshipValue)>)> {
    let mut pending = Vec::new();
    for attribute in collection.attributes.iter().filter(|a| a.is_relationship()) {
        if let Some(raw) = document.remove_attribute(&attribute.id) {
            pending.push((attribute.clone(), relationship::classify(&raw)?));
        }
    }
    Ok((document, pending))
}

fn selection_fingerprint(selections: &[String]) -> String {
    if selections.is_empty() {
        return "*".to_string();
    }
    let mut sorted = selections.to_vec();
    sorted.sort();
    sorted.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::InMemoryAdapter;
    use crate::cache::InMemoryCache;
    use crate::constants::TYPE_STRING;
    use crate::document::{permission_string, Permission as Perm};
    use crate::identity::with_roles;
    use crate::schema::types::Attribute as Attr;

    fn engine() -> Engine<InMemoryAdapter, InMemoryCache> {
        Engine::new(InMemoryAdapter::new(), InMemoryCache::new(), DatabaseConfig::default())
    }

    fn permissive_document(id: &str) -> Document {
        let mut doc = Document::empty();
        doc.set_attribute("$id", json!(id), SetMode::Assign);
        doc.set_permissions(vec![
            permission_string(Perm::Read, "any"),
            permission_string(Perm::Update, "any"),
            permission_string(Perm::Delete, "any"),
        ]);
        doc
    }

    #[test]
    fn create_then_read_round_trips_and_stamps_timestamps() {
        let mut engine = engine();
        engine
            .schema()
            .create_collection("books", "books", vec![Attr::new("title", TYPE_STRING, 128).required(true)], vec![])
            .unwrap();

        let mut doc = permissive_document("b1");
        doc.set_attribute("title", json!("X"), SetMode::Assign);
        engine.create_document("books", doc).unwrap();

        let fetched = engine.get_document("books", "b1", &[]).unwrap();
        assert_eq!(fetched.get_attribute("title"), Some(&json!("X")));
        assert_eq!(fetched.get_created_at(), fetched.get_updated_at());
    }

    #[test]
    fn cache_invalidates_after_update() {
        let mut engine = engine();
        engine.schema().create_collection("books", "books", vec![Attr::new("title", TYPE_STRING, 128)], vec![]).unwrap();
        let mut doc = permissive_document("b1");
        doc.set_attribute("title", json!("X"), SetMode::Assign);
        engine.create_document("books", doc).unwrap();

        engine.get_document("books", "b1", &[]).unwrap();
        let mut patch = Document::empty();
        patch.set_attribute("title", json!("Y"), SetMode::Assign);
        engine.update_document("books", "b1", patch).unwrap();

        let refetched = engine.get_document("books", "b1", &[]).unwrap();
        assert_eq!(refetched.get_attribute("title"), Some(&json!("Y")));
    }

    #[test]
    fn update_denied_without_permission() {
        let mut engine = engine();
        engine.schema().create_collection("books", "books", vec![Attr::new("title", TYPE_STRING, 128)], vec![]).unwrap();
        let mut doc = Document::empty();
        doc.set_attribute("$id", json!("b1"), SetMode::Assign);
        doc.set_permissions(vec![permission_string(Perm::Update, "user:alice")]);
        doc.set_attribute("title", json!("X"), SetMode::Assign);
        engine.create_document("books", doc).unwrap();

        let mut patch = Document::empty();
        patch.set_attribute("title", json!("Y"), SetMode::Assign);
        let result = with_roles(vec!["user:bob".to_string()], || engine.update_document("books", "b1", patch));
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().code(), "authorization");
    }

    #[test]
    fn increase_respects_declared_bound() {
        let mut engine = engine();
        engine
            .schema()
            .create_collection("counters", "counters", vec![Attr::new("count", crate::constants::TYPE_INTEGER, 0)], vec![])
            .unwrap();
        let mut doc = permissive_document("c1");
        doc.set_attribute("count", json!(5), SetMode::Assign);
        engine.create_document("counters", doc).unwrap();

        let err = engine.increase_document_attribute("counters", "c1", "count", 3.0, Some(7.0)).unwrap_err();
        assert_eq!(err.code(), "generic");
        let value = engine.increase_document_attribute("counters", "c1", "count", 2.0, Some(7.0)).unwrap();
        assert_eq!(value, 7.0);
    }

    #[test]
    fn one_to_many_hydration_strips_back_pointer() {
        let mut engine = engine();
        engine.schema().create_collection("author", "author", vec![], vec![]).unwrap();
        engine.schema().create_collection("book", "book", vec![Attr::new("title", TYPE_STRING, 128)], vec![]).unwrap();
        engine
            .schema()
            .create_relationship("author", "book", crate::schema::types::RelationType::OneToMany, true, "books", "author")
            .unwrap();

        engine.create_document("author", permissive_document("a1")).unwrap();
        let mut b1 = permissive_document("b1");
        b1.set_attribute("title", json!("One"), SetMode::Assign);
        b1.set_attribute("author", json!("a1"), SetMode::Assign);
        engine.create_document("book", b1).unwrap();
        let mut b2 = permissive_document("b2");
        b2.set_attribute("title", json!("Two"), SetMode::Assign);
        b2.set_attribute("author", json!("a1"), SetMode::Assign);
        engine.create_document("book", b2).unwrap();

        let author = engine.get_document("author", "a1", &[]).unwrap();
        let books = author.get_attribute("books").and_then(Value::as_array).unwrap();
        assert_eq!(books.len(), 2);
        assert!(books.iter().all(|b| b.get("author").is_none()));
    }

    #[test]
    fn oversized_document_id_is_rejected() {
        let mut engine = engine();
        engine.schema().create_collection("books", "books", vec![], vec![]).unwrap();
        let mut doc = permissive_document(&"x".repeat(256));
        doc.set_attribute("title", json!("X"), SetMode::Assign);
        let err = engine.create_document("books", doc).unwrap_err();
        assert_eq!(err.code(), "structure");
    }
}
