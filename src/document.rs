//! Document value object.
//!
//! Specified as an external collaborator: the core only needs the
//! operations listed in the specification's "Collaborator contracts"
//! section (get/set attribute, permission-set accessors, emptiness). It is
//! implemented here so the crate is self-contained and its test suite can
//! exercise the Document Engine end-to-end.

use serde_json::{Map, Value};

use crate::constants::{
    SYSTEM_COLLECTION, SYSTEM_CREATED_AT, SYSTEM_ID, SYSTEM_INTERNAL_ID, SYSTEM_PERMISSIONS,
    SYSTEM_UPDATED_AT,
};

/// How [`Document::set_attribute`] combines a new value with an existing
/// one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    /// Replace the attribute outright.
    Assign,
    /// If both the existing and new values are arrays, concatenate them;
    /// otherwise behaves like `Assign`.
    Append,
}

/// A permission action kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    Create,
    Read,
    Update,
    Delete,
}

impl Permission {
    fn label(self) -> &'static str {
        match self {
            Permission::Create => "create",
            Permission::Read => "read",
            Permission::Update => "update",
            Permission::Delete => "delete",
        }
    }
}

/// An ordered mapping of attribute name to value, with reserved system
/// fields. Value-typed: cloning a `Document` yields an independent
/// snapshot, matching the specification's "mutation produces a new logical
/// version" rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: Map<String, Value>,
}

impl Document {
    /// An empty document — the sentinel `getDocument` returns when `id` is
    /// empty or the gate denies read access.
    pub fn empty() -> Self {
        Self { fields: Map::new() }
    }

    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::from_map(map),
            _ => Self::empty(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get_id(&self) -> Option<&str> {
        self.fields.get(SYSTEM_ID).and_then(Value::as_str)
    }

    pub fn get_internal_id(&self) -> Option<&str> {
        self.fields.get(SYSTEM_INTERNAL_ID).and_then(Value::as_str)
    }

    pub fn get_collection(&self) -> Option<&str> {
        self.fields.get(SYSTEM_COLLECTION).and_then(Value::as_str)
    }

    pub fn get_created_at(&self) -> Option<&str> {
        self.fields.get(SYSTEM_CREATED_AT).and_then(Value::as_str)
    }

    pub fn get_updated_at(&self) -> Option<&str> {
        self.fields.get(SYSTEM_UPDATED_AT).and_then(Value::as_str)
    }

    pub fn get_attribute(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set_attribute(&mut self, name: &str, value: Value, mode: SetMode) -> &mut Self {
        match mode {
            SetMode::Assign => {
                self.fields.insert(name.to_string(), value);
            }
            SetMode::Append => {
                let merged = match (self.fields.get(name), &value) {
                    (Some(Value::Array(existing)), Value::Array(incoming)) => {
                        let mut combined = existing.clone();
                        combined.extend(incoming.clone());
                        Value::Array(combined)
                    }
                    _ => value,
                };
                self.fields.insert(name.to_string(), merged);
            }
        }
        self
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn get_array_copy(&self) -> Map<String, Value> {
        self.fields.clone()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    /// Returns the permission role tokens that grant `kind` on this
    /// document, parsed out of the flat `$permissions` list.
    pub fn get_permissions(&self, kind: Permission) -> Vec<String> {
        let prefix = format!("{}(\"", kind.label());
        self.raw_permissions()
            .iter()
            .filter_map(|p| {
                p.strip_prefix(&prefix)
                    .and_then(|rest| rest.strip_suffix('"').or_else(|| rest.strip_suffix("\")")))
                    .map(|role| role.trim_end_matches(')').to_string())
            })
            .collect()
    }

    pub fn raw_permissions(&self) -> Vec<String> {
        match self.fields.get(SYSTEM_PERMISSIONS) {
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn set_permissions(&mut self, permissions: Vec<String>) -> &mut Self {
        self.fields.insert(
            SYSTEM_PERMISSIONS.to_string(),
            Value::Array(permissions.into_iter().map(Value::String).collect()),
        );
        self
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.fields
    }

    /// Serializes the document for the write-through cache.
    pub fn to_json_string(&self) -> String {
        Value::Object(self.fields.clone()).to_string()
    }

    /// Deserializes a document previously written by [`Self::to_json_string`].
    pub fn from_json_str(s: &str) -> Option<Self> {
        serde_json::from_str::<Value>(s).ok().map(Self::from_value)
    }
}

/// Builds a permission string in the canonical `action("role")` shape.
pub fn permission_string(kind: Permission, role: &str) -> String {
    format!("{}(\"{}\")", kind.label(), role)
}
