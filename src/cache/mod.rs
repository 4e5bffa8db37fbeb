//! Cache contract (§6, §4.4) and an in-memory reference implementation.

pub mod memory;

pub use memory::InMemoryCache;

/// Write-through cache backing the Document Engine. Keys follow
/// `cache-{namespace}:{collection}:{docId}:{selection|"*"}`
/// (see [`crate::constants::cache_key`]).
pub trait Cache {
    /// Loads a cached value, or `None` on miss or expiry past `ttl_seconds`.
    fn load(&self, key: &str, ttl_seconds: u64) -> Option<String>;

    fn save(&self, key: &str, value: String);

    /// Purges every entry whose key matches `pattern`, where a trailing
    /// `*` is a wildcard suffix.
    fn purge(&self, pattern: &str);

    /// Purges every cached entry belonging to a whole collection, used when
    /// the collection itself is deleted rather than one of its documents.
    /// `pattern` is a collection-level wildcard (see
    /// [`crate::constants::cache_key_collection_wildcard`]). Default
    /// implementations can just delegate to [`Self::purge`]; backends with a
    /// cheaper collection-scoped eviction path can override it.
    fn purge_collection(&self, pattern: &str) {
        self.purge(pattern);
    }
}
