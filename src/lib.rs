//! A schema-managed document database facade over a pluggable storage
//! backend.
//!
//! The [`engine::Engine`] is the single entry point a caller needs:
//! construct one over an [`adapter::Adapter`] and a [`cache::Cache`], then
//! drive collection/attribute/index/relationship lifecycle through
//! [`engine::Engine::schema`] and document operations through its own
//! methods. Everything else in this crate is a collaborator the engine
//! composes internally.

pub mod adapter;
pub mod cache;
pub mod codec;
pub mod constants;
pub mod datetime;
pub mod document;
pub mod engine;
pub mod error;
pub mod events;
pub mod filters;
pub mod format;
pub mod gate;
pub mod id;
pub mod identity;
pub mod observability;
pub mod query;
pub mod query_normalizer;
pub mod relationship;
pub mod schema;
pub mod validator;

pub use adapter::{Adapter, InMemoryAdapter};
pub use cache::{Cache, InMemoryCache};
pub use document::{Document, Permission, SetMode};
pub use engine::{DatabaseConfig, Engine};
pub use error::{DatabaseError, DatabaseResult};
pub use query::{Method, Query};
pub use schema::SchemaManager;
