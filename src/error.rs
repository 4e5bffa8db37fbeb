//! # Core Error Types
//!
//! One unified error enum for every failure the core can raise. The error
//! *kinds* are the ones the specification calls out (authorization,
//! duplicate, limit, structure, generic) — components do not grow their own
//! error types, since the engine-wide contract cares about the kind, not
//! which component raised it.

use thiserror::Error;

/// Result type returned by every public operation in this crate.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Unified error type for the document database facade.
#[derive(Debug, Clone, Error)]
pub enum DatabaseError {
    /// The permission gate denied a mutation (update/delete).
    #[error("authorization: {0}")]
    Authorization(String),

    /// A case-insensitive id collision, or an attempt to recreate an
    /// existing collection.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// An adapter-reported limit (attribute count, index count, row width,
    /// string/int size) would be exceeded.
    #[error("limit: {0}")]
    Limit(String),

    /// The structure validator rejected a document.
    #[error("structure: {0}")]
    Structure(String),

    /// Anything else: unknown type/format, missing collection/attribute,
    /// filter not found, unsupported index type, malformed relationship
    /// value, cursor from the wrong collection, unknown select attribute,
    /// a violated numeric bound, a non-positive increase/decrease value.
    #[error("generic: {0}")]
    Generic(String),

    /// The adapter or cache raised an error; bubbled through unchanged
    /// except for being wrapped so callers can match on `DatabaseError`.
    #[error("backend: {0}")]
    Backend(String),
}

impl DatabaseError {
    /// Short machine-readable code for the error kind, stable across
    /// message wording changes.
    pub fn code(&self) -> &'static str {
        match self {
            DatabaseError::Authorization(_) => "authorization",
            DatabaseError::Duplicate(_) => "duplicate",
            DatabaseError::Limit(_) => "limit",
            DatabaseError::Structure(_) => "structure",
            DatabaseError::Generic(_) => "generic",
            DatabaseError::Backend(_) => "backend",
        }
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }

    pub fn duplicate(msg: impl Into<String>) -> Self {
        Self::Duplicate(msg.into())
    }

    pub fn limit(msg: impl Into<String>) -> Self {
        Self::Limit(msg.into())
    }

    pub fn structure(msg: impl Into<String>) -> Self {
        Self::Structure(msg.into())
    }

    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(DatabaseError::authorization("x").code(), "authorization");
        assert_eq!(DatabaseError::duplicate("x").code(), "duplicate");
        assert_eq!(DatabaseError::limit("x").code(), "limit");
        assert_eq!(DatabaseError::structure("x").code(), "structure");
        assert_eq!(DatabaseError::generic("x").code(), "generic");
        assert_eq!(DatabaseError::backend("x").code(), "backend");
    }

    #[test]
    fn display_includes_kind_prefix() {
        let err = DatabaseError::duplicate("attribute 'title' already exists");
        assert!(err.to_string().starts_with("duplicate:"));
    }
}
