//! Adapter contract (§6, consumed).
//!
//! The pluggable storage backend. The core depends on this trait, not on
//! any concrete implementation; [`memory`] supplies an in-memory adapter
//! used purely as the crate's own test fixture.

pub mod memory;

use crate::document::Document;
use crate::error::DatabaseResult;
use crate::query::Query;
use crate::schema::types::{Attribute, Index};

pub use memory::InMemoryAdapter;

/// Row-shaped result of a `find` call before decode/cast.
pub type Row = Document;

/// The storage backend contract every Document Engine / Schema Manager
/// operation ultimately bottoms out in.
pub trait Adapter {
    fn set_namespace(&mut self, namespace: &str);
    fn get_namespace(&self) -> String;

    /// The database a bare `exists`/capability query targets when the
    /// caller doesn't name one explicitly.
    fn set_default_database(&mut self, name: &str);
    fn get_default_database(&self) -> String;

    fn ping(&self) -> DatabaseResult<bool>;

    fn create_database(&mut self, name: &str) -> DatabaseResult<()>;
    fn delete_database(&mut self, name: &str) -> DatabaseResult<()>;
    fn list_databases(&self) -> Vec<String>;

    /// Whether `database` exists, and — when `collection` is given —
    /// whether that collection exists within it.
    fn exists(&self, database: &str, collection: Option<&str>) -> bool;

    fn collection_exists(&self, collection: &str) -> bool;
    fn create_collection(&mut self, collection: &str) -> DatabaseResult<()>;
    fn delete_collection(&mut self, collection: &str) -> DatabaseResult<()>;

    fn create_attribute(&mut self, collection: &str, attribute: &Attribute) -> DatabaseResult<()>;
    fn update_attribute(&mut self, collection: &str, attribute: &Attribute) -> DatabaseResult<()>;
    fn delete_attribute(&mut self, collection: &str, attribute_id: &str) -> DatabaseResult<()>;
    fn rename_attribute(
        &mut self,
        collection: &str,
        old_id: &str,
        new_id: &str,
    ) -> DatabaseResult<()>;

    fn create_index(&mut self, collection: &str, index: &Index) -> DatabaseResult<()>;
    fn delete_index(&mut self, collection: &str, index_id: &str) -> DatabaseResult<()>;
    fn rename_index(&mut self, collection: &str, old_id: &str, new_id: &str) -> DatabaseResult<()>;

    fn get_document(&self, collection: &str, id: &str) -> DatabaseResult<Option<Document>>;
    fn create_document(&mut self, collection: &str, document: Document) -> DatabaseResult<Document>;
    fn update_document(&mut self, collection: &str, document: Document) -> DatabaseResult<Document>;
    fn delete_document(&mut self, collection: &str, id: &str) -> DatabaseResult<()>;

    /// Applies `delta` to an integer/float attribute, clamping to
    /// `min`/`max` when given, and returns the resulting value.
    fn increase_document_attribute(
        &mut self,
        collection: &str,
        id: &str,
        attribute: &str,
        delta: f64,
        min: Option<f64>,
        max: Option<f64>,
    ) -> DatabaseResult<f64>;

    #[allow(clippy::too_many_arguments)]
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
    ) -> DatabaseResult<Vec<Row>>;

    fn count(&self, collection: &str, filters: &[Query], max: u64) -> DatabaseResult<u64>;
    fn sum(&self, collection: &str, attribute: &str, filters: &[Query], max: u64) -> DatabaseResult<f64>;

    fn get_limit_for_attributes(&self) -> usize;
    fn get_limit_for_indexes(&self) -> usize;
    fn get_limit_for_string(&self) -> u64;
    fn get_limit_for_int(&self) -> u64;
    fn get_count_of_attributes(&self, collection: &str) -> usize;
    fn get_count_of_indexes(&self, collection: &str) -> usize;

    /// Attributes the backend itself reserves on every collection, outside
    /// whatever the Schema Manager has declared (e.g. a backend that keeps
    /// its own bookkeeping columns). Counted against
    /// [`Self::get_limit_for_attributes`] alongside the declared ones.
    fn get_count_of_default_attributes(&self) -> usize;

    /// Indexes the backend reserves on every collection, counted against
    /// [`Self::get_limit_for_indexes`] alongside the declared ones.
    fn get_count_of_default_indexes(&self) -> usize;

    fn get_document_size_limit(&self) -> u64;

    /// The backend column width, in bytes, that declaring `attribute`
    /// would add to a row. Used by the Schema Manager's row-width check
    /// against [`Self::get_document_size_limit`].
    fn get_attribute_width(&self, attribute: &Attribute) -> u64;

    fn get_support_for_index(&self) -> bool;
    fn get_support_for_unique_index(&self) -> bool;
    fn get_support_for_casting(&self) -> bool;
    fn get_keywords(&self) -> Vec<&'static str>;
}

/// Assigns the next `$internalId` for a collection's monotonic counter.
pub fn next_internal_id(counter: &mut u64) -> String {
    *counter += 1;
    counter.to_string()
}
