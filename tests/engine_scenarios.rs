//! End-to-end scenarios exercising the public `Engine` API over the
//! in-memory adapter/cache fixtures.

use meridiandb::document::{permission_string, Permission};
use meridiandb::schema::types::{Attribute, RelationType};
use meridiandb::{constants, identity, Document, Engine, InMemoryAdapter, InMemoryCache, Query, SetMode};
use serde_json::json;

fn engine() -> Engine<InMemoryAdapter, InMemoryCache> {
    Engine::new(InMemoryAdapter::new(), InMemoryCache::new(), Default::default())
}

fn readable(id: &str) -> Document {
    let mut doc = Document::empty();
    doc.set_attribute("$id", json!(id), SetMode::Assign);
    doc.set_permissions(vec![
        permission_string(Permission::Read, "any"),
        permission_string(Permission::Update, "any"),
        permission_string(Permission::Delete, "any"),
    ]);
    doc
}

/// S1: a created document round-trips through `getDocument` unchanged.
#[test]
fn s1_create_then_read_round_trip() {
    let mut db = engine();
    db.schema()
        .create_collection("books", "Books", vec![Attribute::new("title", constants::TYPE_STRING, 128)], vec![])
        .unwrap();

    let mut doc = readable("b1");
    doc.set_attribute("title", json!("Dune"), SetMode::Assign);
    db.create_document("books", doc).unwrap();

    let fetched = db.get_document("books", "b1", &[]).unwrap();
    assert_eq!(fetched.get_attribute("title"), Some(&json!("Dune")));
    assert_eq!(fetched.get_id(), Some("b1"));
}

/// S2: attribute ids collide case-insensitively.
#[test]
fn s2_case_insensitive_attribute_collision_is_rejected() {
    let mut db = engine();
    db.schema()
        .create_collection("books", "Books", vec![Attribute::new("Title", constants::TYPE_STRING, 128)], vec![])
        .unwrap();

    let err = db.schema().create_attribute("books", Attribute::new("title", constants::TYPE_STRING, 64)).unwrap_err();
    assert_eq!(err.code(), "duplicate");
}

/// S3: a required attribute with no default is rejected when missing.
#[test]
fn s3_required_attribute_without_default_rejects_missing_value() {
    let mut db = engine();
    db.schema()
        .create_collection(
            "books",
            "Books",
            vec![Attribute::new("title", constants::TYPE_STRING, 128).required(true)],
            vec![],
        )
        .unwrap();

    let doc = readable("b1");
    let err = db.create_document("books", doc).unwrap_err();
    assert_eq!(err.code(), "structure");
}

/// S4: oneToMany hydration on the parent side strips the child's
/// back-pointer attribute from each hydrated child.
#[test]
fn s4_one_to_many_hydration_strips_back_pointer() {
    let mut db = engine();
    db.schema().create_collection("author", "Author", vec![], vec![]).unwrap();
    db.schema()
        .create_collection("book", "Book", vec![Attribute::new("title", constants::TYPE_STRING, 128)], vec![])
        .unwrap();
    db.schema()
        .create_relationship("author", "book", RelationType::OneToMany, true, "books", "author")
        .unwrap();

    db.create_document("author", readable("a1")).unwrap();
    let mut b1 = readable("b1");
    b1.set_attribute("title", json!("One"), SetMode::Assign);
    b1.set_attribute("author", json!("a1"), SetMode::Assign);
    db.create_document("book", b1).unwrap();

    let author = db.get_document("author", "a1", &[]).unwrap();
    let books = author.get_attribute("books").and_then(|v| v.as_array()).unwrap();
    assert_eq!(books.len(), 1);
    assert!(books[0].get("author").is_none());
}

/// S5: a cached read reflects a subsequent update once the cache key is
/// purged.
#[test]
fn s5_cache_is_invalidated_by_update() {
    let mut db = engine();
    db.schema().create_collection("books", "Books", vec![Attribute::new("title", constants::TYPE_STRING, 128)], vec![]).unwrap();
    let mut doc = readable("b1");
    doc.set_attribute("title", json!("X"), SetMode::Assign);
    db.create_document("books", doc).unwrap();

    db.get_document("books", "b1", &[]).unwrap();
    let mut patch = Document::empty();
    patch.set_attribute("title", json!("Y"), SetMode::Assign);
    db.update_document("books", "b1", patch).unwrap();

    let refetched = db.get_document("books", "b1", &[]).unwrap();
    assert_eq!(refetched.get_attribute("title"), Some(&json!("Y")));
}

/// S6: a caller without update permission is denied, not silently ignored.
#[test]
fn s6_update_without_permission_is_denied() {
    let mut db = engine();
    db.schema().create_collection("books", "Books", vec![Attribute::new("title", constants::TYPE_STRING, 128)], vec![]).unwrap();

    let mut doc = Document::empty();
    doc.set_attribute("$id", json!("b1"), SetMode::Assign);
    doc.set_permissions(vec![permission_string(Permission::Update, "user:alice")]);
    doc.set_attribute("title", json!("X"), SetMode::Assign);
    db.create_document("books", doc).unwrap();

    let mut patch = Document::empty();
    patch.set_attribute("title", json!("Y"), SetMode::Assign);
    let result = identity::with_roles(vec!["user:bob".to_string()], || db.update_document("books", "b1", patch));
    assert!(result.is_err());
    assert_eq!(result.unwrap_err().code(), "authorization");
}

/// S7: `increaseDocumentAttribute` rejects a delta that would overshoot the
/// declared bound but accepts one that lands exactly on it.
#[test]
fn s7_increase_respects_declared_bound() {
    let mut db = engine();
    db.schema()
        .create_collection("counters", "Counters", vec![Attribute::new("count", constants::TYPE_INTEGER, 0)], vec![])
        .unwrap();
    let mut doc = readable("c1");
    doc.set_attribute("count", json!(5), SetMode::Assign);
    db.create_document("counters", doc).unwrap();

    let err = db.increase_document_attribute("counters", "c1", "count", 3.0, Some(7.0)).unwrap_err();
    assert_eq!(err.code(), "generic");

    let value = db.increase_document_attribute("counters", "c1", "count", 2.0, Some(7.0)).unwrap();
    assert_eq!(value, 7.0);
}

/// §8 invariant: deleting a document purges every cached selection for it,
/// not just the `*` selection.
#[test]
fn deleting_a_document_purges_every_cached_selection() {
    let mut db = engine();
    db.schema().create_collection("books", "Books", vec![Attribute::new("title", constants::TYPE_STRING, 128)], vec![]).unwrap();
    let mut doc = readable("b1");
    doc.set_attribute("title", json!("X"), SetMode::Assign);
    db.create_document("books", doc).unwrap();

    db.get_document("books", "b1", &[]).unwrap();
    db.get_document("books", "b1", &[Query::select(vec!["title".to_string()])]).unwrap();
    db.delete_document("books", "b1").unwrap();

    let after = db.get_document("books", "b1", &[]).unwrap();
    assert!(after.is_empty());
}

/// §8 invariant: an empty id short-circuits `getDocument` to the empty
/// sentinel rather than reaching the adapter.
#[test]
fn empty_id_returns_empty_document_without_touching_the_adapter() {
    let mut db = engine();
    db.schema().create_collection("books", "Books", vec![], vec![]).unwrap();
    let result = db.get_document("books", "", &[]).unwrap();
    assert!(result.is_empty());
}

/// §8 invariant: a read denied by the permission gate returns the empty
/// sentinel rather than an authorization error.
#[test]
fn read_denied_by_gate_returns_empty_not_an_error() {
    let mut db = engine();
    db.schema().create_collection("books", "Books", vec![], vec![]).unwrap();
    let mut doc = Document::empty();
    doc.set_attribute("$id", json!("b1"), SetMode::Assign);
    doc.set_permissions(vec![permission_string(Permission::Read, "user:alice")]);
    db.create_document("books", doc).unwrap();

    let result = identity::with_roles(vec!["user:bob".to_string()], || db.get_document("books", "b1", &[])).unwrap();
    assert!(result.is_empty());
}

/// §8 invariant: deleting a collection removes it from the metadata
/// catalog, so a subsequent document operation against it fails.
#[test]
fn deleted_collection_is_no_longer_addressable() {
    let mut db = engine();
    db.schema().create_collection("books", "Books", vec![], vec![]).unwrap();
    db.schema().delete_collection("books").unwrap();

    let err = db.create_document("books", readable("b1")).unwrap_err();
    assert!(err.code() == "generic" || err.code() == "structure");
}
