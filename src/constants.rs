//! Bit-exact constants shared by every component.
//!
//! Kept as plain `&'static str` / `const` values rather than enums in the
//! spots where the specification requires the literal wire string — several
//! of these end up persisted into `_metadata` documents, so the literal
//! text matters more than the Rust type.

/// Attribute/type name constants (persisted into attribute descriptors).
pub const TYPE_STRING: &str = "string";
pub const TYPE_INTEGER: &str = "integer";
pub const TYPE_FLOAT: &str = "double";
pub const TYPE_BOOLEAN: &str = "boolean";
pub const TYPE_DATETIME: &str = "datetime";
pub const TYPE_RELATIONSHIP: &str = "relationship";

/// Index type constants.
pub const INDEX_KEY: &str = "key";
pub const INDEX_FULLTEXT: &str = "fulltext";
pub const INDEX_UNIQUE: &str = "unique";
pub const INDEX_SPATIAL: &str = "spatial";
pub const INDEX_ARRAY: &str = "array";

/// Relationship cardinality constants.
pub const RELATION_ONE_TO_ONE: &str = "oneToOne";
pub const RELATION_ONE_TO_MANY: &str = "oneToMany";
pub const RELATION_MANY_TO_ONE: &str = "manyToOne";
pub const RELATION_MANY_TO_MANY: &str = "manyToMany";

/// Relationship side constants.
pub const SIDE_PARENT: &str = "parent";
pub const SIDE_CHILD: &str = "child";

/// Sort order constants.
pub const ORDER_ASC: &str = "ASC";
pub const ORDER_DESC: &str = "DESC";

/// Cursor direction constants.
pub const CURSOR_BEFORE: &str = "before";
pub const CURSOR_AFTER: &str = "after";

/// The id of the self-describing metadata collection.
pub const METADATA_COLLECTION: &str = "_metadata";

/// The catch-all event-bus channel token.
pub const EVENT_ALL: &str = "*";

/// Maximum length, in bytes, of any `$id` (collection, attribute, index,
/// document).
pub const KEY_LENGTH_LIMIT: usize = 255;

/// Default cache TTL, in seconds.
pub const DEFAULT_CACHE_TTL: u64 = 86_400;

/// Reserved document system fields.
pub const SYSTEM_ID: &str = "$id";
pub const SYSTEM_COLLECTION: &str = "$collection";
pub const SYSTEM_CREATED_AT: &str = "$createdAt";
pub const SYSTEM_UPDATED_AT: &str = "$updatedAt";
pub const SYSTEM_PERMISSIONS: &str = "$permissions";
pub const SYSTEM_INTERNAL_ID: &str = "$internalId";

/// Internal attributes that are always encoded/decoded alongside the
/// collection's user-defined attributes.
pub const INTERNAL_ATTRIBUTES: &[&str] =
    &[SYSTEM_ID, SYSTEM_COLLECTION, SYSTEM_CREATED_AT, SYSTEM_UPDATED_AT];

/// Schema-mutation and document-lifecycle event names.
pub mod events {
    pub const COLLECTION_CREATE: &str = "collection_create";
    pub const COLLECTION_DELETE: &str = "collection_delete";
    pub const ATTRIBUTE_CREATE: &str = "attribute_create";
    pub const ATTRIBUTE_UPDATE: &str = "attribute_update";
    pub const ATTRIBUTE_DELETE: &str = "attribute_delete";
    pub const INDEX_CREATE: &str = "index_create";
    pub const INDEX_DELETE: &str = "index_delete";
    pub const RELATIONSHIP_CREATE: &str = "relationship_create";
    pub const DOCUMENT_CREATE: &str = "document_create";
    pub const DOCUMENT_READ: &str = "document_read";
    pub const DOCUMENT_UPDATE: &str = "document_update";
    pub const DOCUMENT_DELETE: &str = "document_delete";
    pub const DOCUMENT_FIND: &str = "document_find";
}

/// Builds the write-through cache key for a single document.
///
/// `selection` is either `"*"` (full document) or the hex digest of the
/// requested attribute list.
pub fn cache_key(namespace: &str, collection: &str, doc_id: &str, selection: &str) -> String {
    format!("cache-{namespace}:{collection}:{doc_id}:{selection}")
}

/// Builds the purge pattern that invalidates every selection-partitioned
/// entry for one document.
pub fn cache_key_wildcard(namespace: &str, collection: &str, doc_id: &str) -> String {
    format!("cache-{namespace}:{collection}:{doc_id}:*")
}

/// Builds the purge pattern that invalidates every cached entry for an
/// entire collection, used when the collection itself is deleted.
pub fn cache_key_collection_wildcard(namespace: &str, collection: &str) -> String {
    format!("cache-{namespace}:{collection}:*")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_matches_spec_format() {
        assert_eq!(
            cache_key("ns", "books", "b1", "*"),
            "cache-ns:books:b1:*"
        );
    }

    #[test]
    fn wildcard_always_ends_in_star() {
        assert!(cache_key_wildcard("ns", "books", "b1").ends_with(":*"));
    }

    #[test]
    fn collection_wildcard_has_no_document_segment() {
        assert_eq!(cache_key_collection_wildcard("ns", "books"), "cache-ns:books:*");
    }
}
