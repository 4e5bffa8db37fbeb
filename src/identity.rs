//! The ambient identity oracle.
//!
//! The specification frames authentication as out of scope: the core
//! "consumes an ambient identity oracle". We model that oracle as a small
//! process-wide cell holding the caller's current role set, following the
//! same two-level-registry shape used for filters (§4.1) and the skip/
//! disable counters (§5) — all three are "scoped process-wide state that
//! must nest and restore on every exit path".

use std::cell::RefCell;

thread_local! {
    static CURRENT_ROLES: RefCell<Vec<String>> = RefCell::new(vec!["any".to_string()]);
}

/// Replaces the ambient caller identity with `roles` for the dynamic extent
/// of `f`, restoring the previous identity afterwards (including on
/// panic-free error returns).
pub fn with_roles<R>(roles: Vec<String>, f: impl FnOnce() -> R) -> R {
    let previous = CURRENT_ROLES.with(|cell| cell.replace(roles));
    let result = f();
    CURRENT_ROLES.with(|cell| *cell.borrow_mut() = previous);
    result
}

/// Returns the ambient caller's current role tokens.
pub fn current_roles() -> Vec<String> {
    CURRENT_ROLES.with(|cell| cell.borrow().clone())
}

/// Convenience: sets the ambient identity to a single role for the rest of
/// the current scope, without any restoration. Most callers should prefer
/// [`with_roles`]; this exists for simple top-level setup (tests, small
/// scripts) where restoring is unnecessary.
pub fn set_roles(roles: Vec<String>) {
    CURRENT_ROLES.with(|cell| *cell.borrow_mut() = roles);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_identity_is_any() {
        assert_eq!(current_roles(), vec!["any".to_string()]);
    }

    #[test]
    fn with_roles_restores_previous_identity() {
        set_roles(vec!["any".to_string()]);
        with_roles(vec!["user:alice".to_string()], || {
            assert_eq!(current_roles(), vec!["user:alice".to_string()]);
        });
        assert_eq!(current_roles(), vec!["any".to_string()]);
    }
}
