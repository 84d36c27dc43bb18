// src/runtime/scope.rs
//! Persistent guest global scope
//!
//! A shared name-to-value namespace owned by a [`RuntimeHandle`]. Both
//! sides read and write it: host bindings install entries, guest
//! top-level assignments persist across executions. There is no
//! isolation between runs against the same scope; state leaking across
//! calls is the intended behavior.
//!
//! [`RuntimeHandle`]: crate::RuntimeHandle

use crate::value::BoundaryValue;
use ahash::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Shared mutable namespace of boundary values
#[derive(Clone, Default)]
pub struct GlobalScope {
    vars: Arc<Mutex<HashMap<String, BoundaryValue>>>,
}

impl GlobalScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a binding by name
    pub fn get(&self, name: &str) -> Option<BoundaryValue> {
        self.lock().get(name).cloned()
    }

    /// Install a binding; an existing binding is silently overwritten.
    pub fn set(&self, name: impl Into<String>, value: BoundaryValue) {
        self.lock().insert(name.into(), value);
    }

    /// Remove a binding, returning it if present
    pub fn remove(&self, name: &str) -> Option<BoundaryValue> {
        self.lock().remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Names currently bound, in no particular order
    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, BoundaryValue>> {
        self.vars.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for GlobalScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalScope")
            .field("bindings", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_bind_wins() {
        let scope = GlobalScope::new();
        scope.set("x", BoundaryValue::Int(1));
        scope.set("x", BoundaryValue::Int(2));
        assert_eq!(scope.get("x"), Some(BoundaryValue::Int(2)));
        assert_eq!(scope.len(), 1);
    }

    #[test]
    fn test_clones_share_storage() {
        let scope = GlobalScope::new();
        let view = scope.clone();
        scope.set("shared", BoundaryValue::Bool(true));
        assert_eq!(view.get("shared"), Some(BoundaryValue::Bool(true)));
    }

    #[test]
    fn test_missing_name_is_none() {
        let scope = GlobalScope::new();
        assert_eq!(scope.get("missing"), None);
        assert!(!scope.contains("missing"));
    }
}
