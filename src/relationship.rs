//! Relationship Resolver (C8, §4.8).
//!
//! Pure decision logic only: given a relationship attribute's cardinality
//! and side, which read action applies, and how a write-time value
//! classifies into the four-case polymorphic shape described in §9's
//! design notes. The actual recursive fetch/create/update calls live on
//! the Document Engine, which owns the adapter, cache and gate this
//! resolver has no access to.

use serde_json::{Map, Value};

use crate::error::{DatabaseError, DatabaseResult};
use crate::schema::types::{RelationSide, RelationType};

/// Cycle-breaker for two-way `oneToOne` hydration chains.
pub const MAX_FETCH_DEPTH: u32 = 2;

/// What the read path should do with a relationship attribute's stored
/// value, keyed by (relationType, side).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadAction {
    /// Hydrate the single related document by id, if the stored value is
    /// non-null. `gated_on_two_way` means: only hydrate when the
    /// attribute's `twoWay` flag is set; otherwise the attribute is
    /// dropped entirely.
    HydrateById { gated_on_two_way: bool },
    /// Query the related collection for every document whose back-pointer
    /// attribute equals the parent's `$id`, then strip that back-pointer
    /// from each result.
    FindMany,
    /// `manyToMany` traversal through the junction collection is deferred;
    /// nothing is hydrated on read.
    NoHydration,
}

pub fn read_action(relation_type: RelationType, side: RelationSide) -> ReadAction {
    match (relation_type, side) {
        (RelationType::OneToOne, _) => ReadAction::HydrateById { gated_on_two_way: false },
        (RelationType::OneToMany, RelationSide::Parent) => ReadAction::FindMany,
        (RelationType::OneToMany, RelationSide::Child) => ReadAction::HydrateById { gated_on_two_way: true },
        (RelationType::ManyToOne, RelationSide::Parent) => ReadAction::HydrateById { gated_on_two_way: true },
        (RelationType::ManyToOne, RelationSide::Child) => ReadAction::FindMany,
        (RelationType::ManyToMany, _) => ReadAction::NoHydration,
    }
}

/// The polymorphic shape a relationship attribute's write-time value can
/// take, modeled as a tagged variant rather than runtime type dispatch.
#[derive(Debug, Clone)]
pub enum RelationshipValue {
    Null,
    Id(String),
    Nested(Map<String, Value>),
    List(Vec<RelationshipValue>),
}

pub fn classify(value: &Value) -> DatabaseResult<RelationshipValue> {
    match value {
        Value::Null => Ok(RelationshipValue::Null),
        Value::String(s) => Ok(RelationshipValue::Id(s.clone())),
        Value::Object(map) => Ok(RelationshipValue::Nested(map.clone())),
        Value::Array(items) => Ok(RelationshipValue::List(
            items.iter().map(classify).collect::<DatabaseResult<Vec<_>>>()?,
        )),
        other => Err(DatabaseError::generic(format!(
            "Unrecognized relationship value shape: {other}"
        ))),
    }
}

/// Whether a write-time id-string value should back-patch the related
/// document's `twoWayId` — only `oneToOne` (two-way) and `oneToMany`
/// do; `manyToOne` and `manyToMany` do not (the parent side on
/// `manyToOne` has no back-pointer to patch, and `manyToMany` goes
/// through the junction collection instead).
pub fn should_backpatch_two_way_id(relation_type: RelationType, two_way: bool) -> bool {
    two_way && matches!(relation_type, RelationType::OneToOne | RelationType::OneToMany)
}

/// The junction collection id for a `manyToMany` relationship.
pub fn junction_collection_id(parent_id: &str, child_id: &str) -> String {
    format!("{parent_id}_{child_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn one_to_many_parent_finds_many_child_hydrates_by_id() {
        assert_eq!(read_action(RelationType::OneToMany, RelationSide::Parent), ReadAction::FindMany);
        assert_eq!(
            read_action(RelationType::OneToMany, RelationSide::Child),
            ReadAction::HydrateById { gated_on_two_way: true }
        );
    }

    #[test]
    fn many_to_one_is_the_mirror_of_one_to_many() {
        assert_eq!(
            read_action(RelationType::ManyToOne, RelationSide::Parent),
            read_action(RelationType::OneToMany, RelationSide::Child)
        );
        assert_eq!(
            read_action(RelationType::ManyToOne, RelationSide::Child),
            read_action(RelationType::OneToMany, RelationSide::Parent)
        );
    }

    #[test]
    fn many_to_many_never_hydrates_on_read() {
        assert_eq!(read_action(RelationType::ManyToMany, RelationSide::Parent), ReadAction::NoHydration);
        assert_eq!(read_action(RelationType::ManyToMany, RelationSide::Child), ReadAction::NoHydration);
    }

    #[test]
    fn classify_recognizes_all_four_shapes() {
        assert!(matches!(classify(&Value::Null).unwrap(), RelationshipValue::Null));
        assert!(matches!(classify(&json!("id1")).unwrap(), RelationshipValue::Id(_)));
        assert!(matches!(classify(&json!({"title": "x"})).unwrap(), RelationshipValue::Nested(_)));
        assert!(matches!(classify(&json!(["id1", {"title": "x"}])).unwrap(), RelationshipValue::List(_)));
    }

    #[test]
    fn junction_collection_id_concatenates_both_sides() {
        assert_eq!(junction_collection_id("post", "tag"), "post_tag");
    }
}
