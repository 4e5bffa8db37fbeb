//! Collection/Attribute/Index descriptor types (§3).

use serde::{Deserialize, Serialize};

use crate::constants::{
    RELATION_MANY_TO_MANY, RELATION_MANY_TO_ONE, RELATION_ONE_TO_MANY, RELATION_ONE_TO_ONE,
    SIDE_CHILD, SIDE_PARENT, TYPE_DATETIME,
};

/// A relationship's cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationType {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl RelationType {
    pub fn as_str(self) -> &'static str {
        match self {
            RelationType::OneToOne => RELATION_ONE_TO_ONE,
            RelationType::OneToMany => RELATION_ONE_TO_MANY,
            RelationType::ManyToOne => RELATION_MANY_TO_ONE,
            RelationType::ManyToMany => RELATION_MANY_TO_MANY,
        }
    }

    /// The mirror cardinality seen from the related collection's side.
    pub fn mirrored(self) -> RelationType {
        match self {
            RelationType::OneToOne => RelationType::OneToOne,
            RelationType::OneToMany => RelationType::ManyToOne,
            RelationType::ManyToOne => RelationType::OneToMany,
            RelationType::ManyToMany => RelationType::ManyToMany,
        }
    }
}

/// Which side of a two-way relationship an attribute represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationSide {
    Parent,
    Child,
}

impl RelationSide {
    pub fn as_str(self) -> &'static str {
        match self {
            RelationSide::Parent => SIDE_PARENT,
            RelationSide::Child => SIDE_CHILD,
        }
    }

    pub fn mirrored(self) -> RelationSide {
        match self {
            RelationSide::Parent => RelationSide::Child,
            RelationSide::Child => RelationSide::Parent,
        }
    }
}

/// Relationship-specific attribute options (§3, Attribute).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationOptions {
    pub related_collection: String,
    pub relation_type: RelationType,
    pub two_way: bool,
    pub two_way_key: String,
    pub on_update: String,
    pub on_delete: String,
    pub side: RelationSide,
}

/// An attribute descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    pub id: String,
    #[serde(rename = "type")]
    pub attr_type: String,
    pub size: u64,
    pub required: bool,
    pub signed: bool,
    pub array: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub format_options: serde_json::Value,
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default)]
    pub options: Option<RelationOptions>,
}

impl Attribute {
    pub fn new(id: impl Into<String>, attr_type: impl Into<String>, size: u64) -> Self {
        Self {
            id: id.into(),
            attr_type: attr_type.into(),
            size,
            required: false,
            signed: true,
            array: false,
            default: None,
            format: None,
            format_options: serde_json::Value::Null,
            filters: Vec::new(),
            options: None,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn array(mut self, array: bool) -> Self {
        self.array = array;
        self
    }

    pub fn default(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn signed(mut self, signed: bool) -> Self {
        self.signed = signed;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filters.push(filter.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>, options: serde_json::Value) -> Self {
        self.format = Some(format.into());
        self.format_options = options;
        self
    }

    pub fn is_relationship(&self) -> bool {
        self.attr_type == crate::constants::TYPE_RELATIONSHIP
    }

    /// `datetime` attributes always include the `datetime` filter (invariant 4).
    pub fn ensure_mandatory_filters(&mut self) {
        if self.attr_type == TYPE_DATETIME && !self.filters.iter().any(|f| f == "datetime") {
            self.filters.push("datetime".to_string());
        }
    }
}

/// An index descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    pub id: String,
    #[serde(rename = "type")]
    pub index_type: String,
    pub attributes: Vec<String>,
    pub lengths: Vec<Option<u64>>,
    pub orders: Vec<Option<String>>,
}

impl Index {
    pub fn new(id: impl Into<String>, index_type: impl Into<String>, attributes: Vec<String>) -> Self {
        let len = attributes.len();
        Self {
            id: id.into(),
            index_type: index_type.into(),
            attributes,
            lengths: vec![None; len],
            orders: vec![None; len],
        }
    }
}

/// A collection descriptor — the in-memory form of a `_metadata` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub indexes: Vec<Index>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Collection {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            attributes: Vec::new(),
            indexes: Vec::new(),
            permissions: Vec::new(),
        }
    }

    pub fn find_attribute(&self, id: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.id.eq_ignore_ascii_case(id))
    }

    pub fn find_attribute_mut(&mut self, id: &str) -> Option<&mut Attribute> {
        self.attributes
            .iter_mut()
            .find(|a| a.id.eq_ignore_ascii_case(id))
    }

    pub fn find_index(&self, id: &str) -> Option<&Index> {
        self.indexes.iter().find(|i| i.id.eq_ignore_ascii_case(id))
    }

    pub fn has_attribute(&self, id: &str) -> bool {
        self.find_attribute(id).is_some()
    }

    pub fn has_index(&self, id: &str) -> bool {
        self.find_index(id).is_some()
    }
}
