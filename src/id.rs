//! Identifier generator collaborator.

use uuid::Uuid;

/// Generates a fresh document/collection/attribute/index identifier.
///
/// Uses a UUID v4 with hyphens stripped so ids stay within the
/// [`crate::constants::KEY_LENGTH_LIMIT`] comfortably and avoid characters
/// that would need escaping in adapter-specific identifier syntax.
pub fn unique() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Validates that `id` is non-empty and within the key length limit. Schema
/// and document identifiers share this rule.
pub fn is_valid_key(id: &str) -> bool {
    !id.is_empty() && id.len() <= crate::constants::KEY_LENGTH_LIMIT
}
