//! In-memory reference cache.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use super::Cache;

struct Entry {
    value: String,
    stored_at: Instant,
}

/// A process-local cache keyed by the exact cache-key string, with
/// wildcard-suffix purge support.
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache for InMemoryCache {
    fn load(&self, key: &str, ttl_seconds: u64) -> Option<String> {
        let entries = self.entries.lock().unwrap();
        let entry = entries.get(key)?;
        if entry.stored_at.elapsed().as_secs() > ttl_seconds {
            return None;
        }
        Some(entry.value.clone())
    }

    fn save(&self, key: &str, value: String) {
        self.entries.lock().unwrap().insert(
            key.to_string(),
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    fn purge(&self, pattern: &str) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(prefix) = pattern.strip_suffix('*') {
            entries.retain(|key, _| !key.starts_with(prefix));
        } else {
            entries.remove(pattern);
        }
    }
}
