//! Schema Manager (C6, §4.6).
//!
//! Owns the lifecycle of collections, attributes, indexes and
//! relationships. Every mutating operation follows the same six-step
//! contract: load-or-reject, validate against adapter limits,
//! case-insensitive uniqueness, type/format/filter validation, adapter
//! mutation mirrored into `_metadata`, then event emission.

use serde_json::{json, Value};

use crate::adapter::Adapter;
use crate::cache::Cache;
use crate::constants::{
    cache_key_collection_wildcard, events, INDEX_FULLTEXT, METADATA_COLLECTION, TYPE_BOOLEAN,
    TYPE_DATETIME, TYPE_FLOAT, TYPE_INTEGER, TYPE_RELATIONSHIP, TYPE_STRING,
};
use crate::document::{Document, SetMode};
use crate::error::{DatabaseError, DatabaseResult};
use crate::events::EventBus;
use crate::format::FormatRegistry;
use crate::id;
use crate::schema::metadata;
use crate::schema::types::{
    Attribute, Collection, Index, RelationOptions, RelationSide, RelationType,
};
use crate::validator::IndexValidator;

/// Schema-mutation surface over an [`Adapter`], its `_metadata` mirror, and
/// the [`Cache`] collection-level entries must be purged from on delete.
pub struct SchemaManager<'a, A: Adapter, C: Cache> {
    adapter: &'a mut A,
    events: &'a EventBus,
    formats: &'a FormatRegistry,
    cache: &'a C,
    namespace: &'a str,
}

impl<'a, A: Adapter, C: Cache> SchemaManager<'a, A, C> {
    pub fn new(
        adapter: &'a mut A,
        events: &'a EventBus,
        formats: &'a FormatRegistry,
        cache: &'a C,
        namespace: &'a str,
    ) -> Self {
        Self { adapter, events, formats, cache, namespace }
    }

    /// Loads a collection's descriptor out of its `_metadata` mirror.
    pub fn get_collection(&self, id: &str) -> DatabaseResult<Collection> {
        if id == METADATA_COLLECTION {
            return Ok(metadata::collection());
        }
        let document = self
            .adapter
            .get_document(METADATA_COLLECTION, id)?
            .ok_or_else(|| DatabaseError::generic(format!("Collection not found: \"{id}\"")))?;
        collection_from_document(&document)
    }

    pub fn list_collections(&self) -> DatabaseResult<Vec<Collection>> {
        let rows = self.adapter.find(METADATA_COLLECTION, &[], 0, 0, &[], &[], None, "after")?;
        rows.iter().map(collection_from_document).collect()
    }

    pub fn create_collection(
        &mut self,
        id: &str,
        name: &str,
        attributes: Vec<Attribute>,
        permissions: Vec<String>,
    ) -> DatabaseResult<Collection> {
        if !id::is_valid_key(id) {
            return Err(DatabaseError::structure(format!("Invalid collection id: \"{id}\"")));
        }
        if self.adapter.collection_exists(id) {
            return Err(DatabaseError::duplicate(format!("Collection already exists: \"{id}\"")));
        }
        check_duplicate_attribute_ids(&attributes)?;
        let blank = Collection::new(id, name);
        self.check_limits(id, &blank, &attributes, 0)?;

        self.adapter.create_collection(id)?;
        for attribute in &attributes {
            self.adapter.create_attribute(id, attribute)?;
        }

        let mut collection = Collection::new(id, name);
        collection.attributes = attributes;
        collection.permissions = permissions;
        self.save_metadata(&collection)?;
        self.events.trigger(events::COLLECTION_CREATE, json!({ "collectionId": id }));
        Ok(collection)
    }

    pub fn delete_collection(&mut self, id: &str) -> DatabaseResult<()> {
        // Read-metadata, adapter-delete, metadata-delete — in that order
        // (a prior ordering deleted the adapter collection before reading
        // its metadata document, losing the ability to clean up junctions).
        let collection = self.get_collection(id)?;
        self.adapter.delete_collection(id)?;
        self.adapter.delete_document(METADATA_COLLECTION, id)?;
        self.cache.purge_collection(&cache_key_collection_wildcard(self.namespace, id));
        self.events.trigger(
            events::COLLECTION_DELETE,
            json!({ "collectionId": id, "name": collection.name }),
        );
        Ok(())
    }

    pub fn create_attribute(&mut self, collection_id: &str, mut attribute: Attribute) -> DatabaseResult<Collection> {
        if !id::is_valid_key(&attribute.id) {
            return Err(DatabaseError::structure(format!("Invalid attribute id: \"{}\"", attribute.id)));
        }
        let mut collection = self.get_collection(collection_id)?;

        if collection.has_attribute(&attribute.id) {
            return Err(DatabaseError::duplicate(format!(
                "Attribute already exists: \"{}\"",
                attribute.id
            )));
        }
        if attribute.required && attribute.default.as_ref().is_some_and(|d| !d.is_null()) {
            return Err(DatabaseError::generic(
                "Cannot set a default value on a required attribute",
            ));
        }
        self.validate_type_and_format(&attribute)?;
        attribute.ensure_mandatory_filters();
        self.check_limits(collection_id, &collection, std::slice::from_ref(&attribute), 0)?;

        self.adapter.create_attribute(collection_id, &attribute)?;
        collection.attributes.push(attribute.clone());
        self.save_metadata(&collection)?;
        self.events.trigger(
            events::ATTRIBUTE_CREATE,
            json!({ "collectionId": collection_id, "attributeId": attribute.id }),
        );
        Ok(collection)
    }

    pub fn update_attribute(&mut self, collection_id: &str, updated: Attribute) -> DatabaseResult<Collection> {
        let mut collection = self.get_collection(collection_id)?;
        if collection.find_attribute(&updated.id).is_none() {
            return Err(DatabaseError::generic(format!(
                "Attribute not found: \"{}\"",
                updated.id
            )));
        }
        if updated.required && updated.default.as_ref().is_some_and(|d| !d.is_null()) {
            return Err(DatabaseError::generic(
                "Cannot set a default value on a required attribute",
            ));
        }
        self.validate_type_and_format(&updated)?;

        self.adapter.update_attribute(collection_id, &updated)?;
        if let Some(slot) = collection.find_attribute_mut(&updated.id) {
            *slot = updated.clone();
        }
        self.save_metadata(&collection)?;
        self.events.trigger(
            events::ATTRIBUTE_UPDATE,
            json!({ "collectionId": collection_id, "attributeId": updated.id }),
        );
        Ok(collection)
    }

    pub fn delete_attribute(&mut self, collection_id: &str, attribute_id: &str) -> DatabaseResult<Collection> {
        let mut collection = self.get_collection(collection_id)?;
        if !collection.has_attribute(attribute_id) {
            return Err(DatabaseError::generic(format!("Attribute not found: \"{attribute_id}\"")));
        }
        self.adapter.delete_attribute(collection_id, attribute_id)?;
        collection.attributes.retain(|a| !a.id.eq_ignore_ascii_case(attribute_id));
        self.save_metadata(&collection)?;
        self.events.trigger(
            events::ATTRIBUTE_DELETE,
            json!({ "collectionId": collection_id, "attributeId": attribute_id }),
        );
        Ok(collection)
    }

    /// Renames an attribute id, rewriting every index that references it.
    pub fn rename_attribute(
        &mut self,
        collection_id: &str,
        old_id: &str,
        new_id: &str,
    ) -> DatabaseResult<Collection> {
        if !id::is_valid_key(new_id) {
            return Err(DatabaseError::structure(format!("Invalid attribute id: \"{new_id}\"")));
        }
        let mut collection = self.get_collection(collection_id)?;
        if !collection.has_attribute(old_id) {
            return Err(DatabaseError::generic(format!("Attribute not found: \"{old_id}\"")));
        }
        if collection.has_attribute(new_id) {
            return Err(DatabaseError::duplicate(format!("Attribute already exists: \"{new_id}\"")));
        }

        self.adapter.rename_attribute(collection_id, old_id, new_id)?;
        if let Some(attribute) = collection.find_attribute_mut(old_id) {
            attribute.id = new_id.to_string();
        }
        for index in &mut collection.indexes {
            for slot in &mut index.attributes {
                if slot.eq_ignore_ascii_case(old_id) {
                    *slot = new_id.to_string();
                }
            }
        }
        self.save_metadata(&collection)?;
        self.events.trigger(
            events::ATTRIBUTE_UPDATE,
            json!({ "collectionId": collection_id, "attributeId": new_id }),
        );
        Ok(collection)
    }

    pub fn create_index(&mut self, collection_id: &str, index: Index) -> DatabaseResult<Collection> {
        let mut collection = self.get_collection(collection_id)?;
        if collection.has_index(&index.id) {
            return Err(DatabaseError::duplicate(format!("Index already exists: \"{}\"", index.id)));
        }

        let supports_unique = self.adapter.get_support_for_unique_index();
        let validator = IndexValidator::new(&collection, self.adapter.get_limit_for_indexes(), supports_unique);
        if let Some(reason) = validator.description(&index) {
            return Err(DatabaseError::limit(reason));
        }
        if self.adapter.get_count_of_indexes(collection_id) >= self.adapter.get_limit_for_indexes() {
            return Err(DatabaseError::limit("Index limit exceeded"));
        }

        self.adapter.create_index(collection_id, &index)?;
        collection.indexes.push(index.clone());
        self.save_metadata(&collection)?;
        self.events.trigger(
            events::INDEX_CREATE,
            json!({ "collectionId": collection_id, "indexId": index.id }),
        );
        Ok(collection)
    }

    pub fn delete_index(&mut self, collection_id: &str, index_id: &str) -> DatabaseResult<Collection> {
        let mut collection = self.get_collection(collection_id)?;
        if !collection.has_index(index_id) {
            return Err(DatabaseError::generic(format!("Index not found: \"{index_id}\"")));
        }
        self.adapter.delete_index(collection_id, index_id)?;
        collection.indexes.retain(|i| !i.id.eq_ignore_ascii_case(index_id));
        self.save_metadata(&collection)?;
        self.events.trigger(
            events::INDEX_DELETE,
            json!({ "collectionId": collection_id, "indexId": index_id }),
        );
        Ok(collection)
    }

    pub fn rename_index(&mut self, collection_id: &str, old_id: &str, new_id: &str) -> DatabaseResult<Collection> {
        let mut collection = self.get_collection(collection_id)?;
        if !collection.has_index(old_id) {
            return Err(DatabaseError::generic(format!("Index not found: \"{old_id}\"")));
        }
        if collection.has_index(new_id) {
            return Err(DatabaseError::duplicate(format!("Index already exists: \"{new_id}\"")));
        }
        self.adapter.rename_index(collection_id, old_id, new_id)?;
        if let Some(index) = collection.indexes.iter_mut().find(|i| i.id.eq_ignore_ascii_case(old_id)) {
            index.id = new_id.to_string();
        }
        self.save_metadata(&collection)?;
        self.events.trigger(
            events::INDEX_CREATE,
            json!({ "collectionId": collection_id, "indexId": new_id }),
        );
        Ok(collection)
    }

    /// Creates a relationship attribute on `parent_id` and its mirror on
    /// `child_id`; for `manyToMany` also materializes the junction
    /// collection.
    pub fn create_relationship(
        &mut self,
        parent_id: &str,
        child_id: &str,
        relation_type: RelationType,
        two_way: bool,
        parent_key: &str,
        child_key: &str,
    ) -> DatabaseResult<()> {
        let parent_attribute = Attribute {
            options: Some(RelationOptions {
                related_collection: child_id.to_string(),
                relation_type,
                two_way,
                two_way_key: child_key.to_string(),
                on_update: "restrict".to_string(),
                on_delete: "restrict".to_string(),
                side: RelationSide::Parent,
            }),
            ..Attribute::new(parent_key, TYPE_RELATIONSHIP, 0)
        };
        let child_attribute = Attribute {
            options: Some(RelationOptions {
                related_collection: parent_id.to_string(),
                relation_type: relation_type.mirrored(),
                two_way,
                two_way_key: parent_key.to_string(),
                on_update: "restrict".to_string(),
                on_delete: "restrict".to_string(),
                side: RelationSide::Child,
            }),
            ..Attribute::new(child_key, TYPE_RELATIONSHIP, 0)
        };

        let mut parent = self.get_collection(parent_id)?;
        parent.attributes.push(parent_attribute.clone());
        self.adapter.create_attribute(parent_id, &parent_attribute)?;
        self.save_metadata(&parent)?;

        let mut child = self.get_collection(child_id)?;
        child.attributes.push(child_attribute.clone());
        self.adapter.create_attribute(child_id, &child_attribute)?;
        self.save_metadata(&child)?;

        if relation_type == RelationType::ManyToMany {
            let junction_id = format!("{parent_id}_{child_id}");
            let junction_attributes = vec![
                Attribute::new("id", TYPE_STRING, 36).required(true),
                Attribute::new("twoWayId", TYPE_STRING, 36).required(true),
            ];
            self.create_collection(&junction_id, &junction_id, junction_attributes, Vec::new())?;
        }

        self.events.trigger(
            events::RELATIONSHIP_CREATE,
            json!({ "parentId": parent_id, "childId": child_id }),
        );
        Ok(())
    }

    fn validate_type_and_format(&self, attribute: &Attribute) -> DatabaseResult<()> {
        let known_type = [TYPE_STRING, TYPE_INTEGER, TYPE_FLOAT, TYPE_BOOLEAN, TYPE_DATETIME, TYPE_RELATIONSHIP]
            .contains(&attribute.attr_type.as_str());
        if !known_type {
            return Err(DatabaseError::generic(format!("Unknown attribute type: \"{}\"", attribute.attr_type)));
        }
        if attribute.attr_type == TYPE_DATETIME && !attribute.filters.iter().any(|f| f == "datetime") {
            // ensure_mandatory_filters() is expected to have already run;
            // this is the final gate before the adapter sees the attribute.
            return Err(DatabaseError::generic("datetime attributes require the \"datetime\" filter"));
        }
        if let Some(format) = &attribute.format {
            if !self.formats.is_registered(&attribute.attr_type, format) {
                return Err(DatabaseError::generic(format!(
                    "Unknown format \"{format}\" for type \"{}\"",
                    attribute.attr_type
                )));
            }
        }
        for filter in &attribute.filters {
            // Presence is enough here; resolution against the live registry
            // happens in the Codec Pipeline, which also allows per-instance
            // filters the Schema Manager doesn't know about.
            if filter.is_empty() {
                return Err(DatabaseError::generic("Empty filter name"));
            }
        }
        if attribute.attr_type == TYPE_STRING && attribute.size > self.adapter.get_limit_for_string() {
            return Err(DatabaseError::limit(format!(
                "Attribute size {} exceeds the adapter maximum of {}",
                attribute.size,
                self.adapter.get_limit_for_string()
            )));
        }
        if attribute.attr_type == TYPE_INTEGER {
            let limit = if attribute.signed {
                self.adapter.get_limit_for_int() / 2
            } else {
                self.adapter.get_limit_for_int()
            };
            if attribute.size > limit {
                return Err(DatabaseError::limit(format!(
                    "Attribute size {} exceeds the adapter maximum of {limit}",
                    attribute.size
                )));
            }
        }
        Ok(())
    }

    /// Validates that adding `new_attributes`/`new_indexes` to `collection`
    /// stays within the adapter's attribute/index counts and row width.
    /// Invoked before the adapter mutation on every operation that grows a
    /// collection's shape, so limits are enforced before they're exceeded
    /// rather than after.
    fn check_limits(
        &self,
        collection_id: &str,
        collection: &Collection,
        new_attributes: &[Attribute],
        new_indexes: usize,
    ) -> DatabaseResult<()> {
        let attrs = self.adapter.get_count_of_attributes(collection_id)
            + self.adapter.get_count_of_default_attributes()
            + new_attributes.len();
        if attrs > self.adapter.get_limit_for_attributes() {
            return Err(DatabaseError::limit("Attribute limit exceeded"));
        }
        let indexes = self.adapter.get_count_of_indexes(collection_id)
            + self.adapter.get_count_of_default_indexes()
            + new_indexes;
        if indexes > self.adapter.get_limit_for_indexes() {
            return Err(DatabaseError::limit("Index limit exceeded"));
        }

        let existing_width: u64 = collection
            .attributes
            .iter()
            .map(|a| self.adapter.get_attribute_width(a))
            .sum();
        let added_width: u64 = new_attributes.iter().map(|a| self.adapter.get_attribute_width(a)).sum();
        if existing_width + added_width > self.adapter.get_document_size_limit() {
            return Err(DatabaseError::limit("Row width exceeds the adapter's document size limit"));
        }
        Ok(())
    }

    fn save_metadata(&mut self, collection: &Collection) -> DatabaseResult<()> {
        let document = document_from_collection(collection);
        if self.adapter.get_document(METADATA_COLLECTION, &collection.id)?.is_some() {
            self.adapter.update_document(METADATA_COLLECTION, document)?;
        } else {
            self.adapter.create_document(METADATA_COLLECTION, document)?;
        }
        Ok(())
    }
}

fn check_duplicate_attribute_ids(attributes: &[Attribute]) -> DatabaseResult<()> {
    for (i, a) in attributes.iter().enumerate() {
        for b in &attributes[i + 1..] {
            if a.id.eq_ignore_ascii_case(&b.id) {
                return Err(DatabaseError::duplicate(format!("Attribute already exists: \"{}\"", a.id)));
            }
        }
    }
    Ok(())
}

fn document_from_collection(collection: &Collection) -> Document {
    let mut document = Document::empty();
    document.set_attribute("$id", json!(collection.id), SetMode::Assign);
    document.set_attribute("$collection", json!(METADATA_COLLECTION), SetMode::Assign);
    document.set_attribute("name", json!(collection.name), SetMode::Assign);
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
    document.set_permissions(collection.permissions.clone());
    document
}

fn collection_from_document(document: &Document) -> DatabaseResult<Collection> {
    let id = document
        .get_id()
        .ok_or_else(|| DatabaseError::generic("Metadata document is missing \"$id\""))?
        .to_string();
    let name = document
        .get_attribute("name")
        .and_then(Value::as_str)
        .unwrap_or(&id)
        .to_string();
    let attributes: Vec<Attribute> = document
        .get_attribute("attributes")
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| DatabaseError::generic(format!("Malformed attribute metadata: {e}")))?
        .unwrap_or_default();
    let indexes: Vec<Index> = document
        .get_attribute("indexes")
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| DatabaseError::generic(format!("Malformed index metadata: {e}")))?
        .unwrap_or_default();

    Ok(Collection {
        id,
        name,
        attributes,
        indexes,
        permissions: document.raw_permissions(),
    })
}
