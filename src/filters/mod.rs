//! Filter Registry (C1).
//!
//! A two-level lookup: a per-instance map shadows a process-wide map, both
//! keyed by filter name. The process-wide map is populated with the two
//! mandatory built-ins (`json`, `datetime`) exactly once, mirroring how the
//! specification frames the ambient identity oracle and gate counters as
//! "scoped process-wide state" elsewhere in the engine.

mod datetime_filter;
mod json_filter;

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;

use crate::document::Document;
use crate::engine::DatabaseConfig;
use crate::error::{DatabaseError, DatabaseResult};

/// One direction of a filter: encode (document → backend) or decode
/// (backend → document). `config` gives a filter access to engine-level
/// state (e.g. the default timezone) a host's custom filter may need but
/// the built-ins mostly ignore.
pub type FilterFn = fn(&Value, &Document, &DatabaseConfig) -> DatabaseResult<Value>;

#[derive(Clone, Copy, Debug)]
pub struct Filter {
    pub encode: FilterFn,
    pub decode: FilterFn,
}

fn builtin_registry() -> &'static Mutex<HashMap<String, Filter>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, Filter>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map = HashMap::new();
        map.insert(
            "json".to_string(),
            Filter {
                encode: json_filter::encode,
                decode: json_filter::decode,
            },
        );
        map.insert(
            "datetime".to_string(),
            Filter {
                encode: datetime_filter::encode,
                decode: datetime_filter::decode,
            },
        );
        Mutex::new(map)
    })
}

/// Per-instance filter registry. Entries here shadow the process-wide
/// built-ins for the same name, letting one engine override `json` (say,
/// for a non-default canonical form) without affecting sibling engines.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    instance: HashMap<String, Filter>,
}

impl FilterRegistry {
    /// Creates a registry backed by the process-wide built-ins. Touching
    /// the built-in registry here is what guarantees idempotent
    /// registration: `builtin_registry()` initializes once no matter how
    /// many engines are constructed.
    pub fn new() -> Self {
        let _ = builtin_registry();
        Self {
            instance: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, filter: Filter) {
        self.instance.insert(name.into(), filter);
    }

    pub fn get(&self, name: &str) -> Option<Filter> {
        if let Some(filter) = self.instance.get(name) {
            return Some(*filter);
        }
        builtin_registry().lock().unwrap().get(name).copied()
    }

    pub fn resolve(&self, name: &str) -> DatabaseResult<Filter> {
        self.get(name)
            .ok_or_else(|| DatabaseError::generic(format!("filter '{name}' not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtins_are_resolvable_on_every_fresh_instance() {
        let registry = FilterRegistry::new();
        assert!(registry.get("json").is_some());
        assert!(registry.get("datetime").is_some());
    }

    #[test]
    fn missing_filter_is_generic_error() {
        let registry = FilterRegistry::new();
        let err = registry.resolve("does-not-exist").unwrap_err();
        assert_eq!(err.code(), "generic");
    }

    #[test]
    fn instance_registration_shadows_builtin() {
        fn passthrough_encode(v: &Value, _doc: &Document, _config: &DatabaseConfig) -> DatabaseResult<Value> {
            Ok(v.clone())
        }
        fn passthrough_decode(v: &Value, _doc: &Document, _config: &DatabaseConfig) -> DatabaseResult<Value> {
            Ok(v.clone())
        }

        let mut registry = FilterRegistry::new();
        registry.register(
            "json",
            Filter {
                encode: passthrough_encode,
                decode: passthrough_decode,
            },
        );
        let filter = registry.resolve("json").unwrap();
        let doc = Document::empty();
        let config = DatabaseConfig::default();
        assert_eq!((filter.encode)(&json!("x"), &doc, &config).unwrap(), json!("x"));
    }

    #[test]
    fn custom_filter_can_read_default_timezone_from_config() {
        fn tag_with_zone(v: &Value, _doc: &Document, config: &DatabaseConfig) -> DatabaseResult<Value> {
            let Value::String(s) = v else { return Ok(v.clone()) };
            Ok(Value::String(format!("{s}@{}", config.default_timezone)))
        }
        fn identity(v: &Value, _doc: &Document, _config: &DatabaseConfig) -> DatabaseResult<Value> {
            Ok(v.clone())
        }

        let mut registry = FilterRegistry::new();
        registry.register(
            "zone-tag",
            Filter {
                encode: tag_with_zone,
                decode: identity,
            },
        );
        let filter = registry.resolve("zone-tag").unwrap();
        let doc = Document::empty();
        let mut config = DatabaseConfig::default();
        config.default_timezone = "America/Chicago".to_string();
        assert_eq!(
            (filter.encode)(&json!("2024-01-01"), &doc, &config).unwrap(),
            json!("2024-01-01@America/Chicago")
        );
    }
}
