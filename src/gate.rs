//! Permission Gate (C3).
//!
//! Evaluates the four permission kinds (plus the aggregate "write") against
//! the ambient identity oracle (`crate::identity`), and exposes the two
//! scoped primitives the Document Engine needs: `skip` (force validity, used
//! while re-reading a prior document to authorize against *its*
//! permissions rather than the caller's read rights) and `disable`/`reset`
//! (used by administrative listings that must see every document
//! regardless of permissions).

use std::cell::Cell;

use crate::document::{Document, Permission};
use crate::identity::current_roles;

thread_local! {
    static SKIP_DEPTH: Cell<u32> = Cell::new(0);
    static DISABLED_DEPTH: Cell<u32> = Cell::new(0);
}

/// Runs `f` with permission checks forced to pass, restoring the previous
/// skip depth afterwards regardless of how `f` returns.
pub fn skip<R>(f: impl FnOnce() -> R) -> R {
    SKIP_DEPTH.with(|d| d.set(d.get() + 1));
    let result = f();
    SKIP_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    result
}

/// Runs `f` with the gate fully disabled (every kind, including reads),
/// restoring the previous disabled depth afterwards.
pub fn disabled<R>(f: impl FnOnce() -> R) -> R {
    DISABLED_DEPTH.with(|d| d.set(d.get() + 1));
    let result = f();
    DISABLED_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    result
}

fn is_skipping() -> bool {
    SKIP_DEPTH.with(|d| d.get() > 0) || is_disabled()
}

fn is_disabled() -> bool {
    DISABLED_DEPTH.with(|d| d.get() > 0)
}

/// Evaluates whether the ambient identity satisfies `kind` on `document`.
/// Always `true` while inside [`skip`] or [`disabled`].
pub fn is_valid(document: &Document, kind: Permission) -> bool {
    if is_skipping() {
        return true;
    }
    let granted = document.get_permissions(kind);
    roles_intersect(&current_roles(), &granted)
}

/// The aggregate "write" permission: satisfied when either update or
/// delete would be.
pub fn is_valid_for_write(document: &Document) -> bool {
    if is_skipping() {
        return true;
    }
    is_valid(document, Permission::Update) || is_valid(document, Permission::Delete)
}

fn roles_intersect(caller: &[String], granted: &[String]) -> bool {
    granted.iter().any(|g| g == "any") || caller.iter().any(|c| granted.iter().any(|g| g == c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{permission_string, SetMode};
    use crate::identity::with_roles;
    use serde_json::json;

    fn doc_with_update_role(role: &str) -> Document {
        let mut doc = Document::empty();
        doc.set_attribute("$id", json!("d1"), SetMode::Assign);
        doc.set_permissions(vec![permission_string(Permission::Update, role)]);
        doc
    }

    #[test]
    fn any_permission_grants_everyone() {
        let mut doc = Document::empty();
        doc.set_permissions(vec![permission_string(Permission::Read, "any")]);
        with_roles(vec!["user:bob".to_string()], || {
            assert!(is_valid(&doc, Permission::Read));
        });
    }

    #[test]
    fn scoped_role_denies_non_matching_caller() {
        let doc = doc_with_update_role("user:alice");
        with_roles(vec!["user:bob".to_string()], || {
            assert!(!is_valid(&doc, Permission::Update));
        });
        with_roles(vec!["user:alice".to_string()], || {
            assert!(is_valid(&doc, Permission::Update));
        });
    }

    #[test]
    fn skip_forces_validity_and_restores() {
        let doc = doc_with_update_role("user:alice");
        with_roles(vec!["user:bob".to_string()], || {
            assert!(!is_valid(&doc, Permission::Update));
            skip(|| {
                assert!(is_valid(&doc, Permission::Update));
            });
            assert!(!is_valid(&doc, Permission::Update));
        });
    }

    #[test]
    fn write_is_satisfied_by_update_or_delete() {
        let doc = doc_with_update_role("user:alice");
        with_roles(vec!["user:alice".to_string()], || {
            assert!(is_valid_for_write(&doc));
        });
    }
}
