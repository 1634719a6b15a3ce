//! Lexical scope chain.
//!
//! Scopes form a parent-linked chain terminating in the engine prototype.
//! Lookup walks outward frame by frame; mutation only ever touches the
//! current frame.

use crate::value::Value;
use rustc_hash::FxHashMap;
use std::sync::{Arc, RwLock};

/// One frame of name→value bindings with an optional parent.
#[derive(Debug, Default)]
pub struct Scope {
    vars: RwLock<FxHashMap<String, Value>>,
    parent: Option<Arc<Scope>>,
}

impl Scope {
    /// Create a root scope with no parent.
    pub fn new() -> Arc<Scope> {
        Arc::new(Scope::default())
    }

    /// Create an empty scope chained to a parent.
    pub fn with_parent(parent: Arc<Scope>) -> Arc<Scope> {
        Arc::new(Scope {
            vars: RwLock::default(),
            parent: Some(parent),
        })
    }

    /// Create a child frame seeded with the given bindings.
    pub fn extend<I, K>(self: &Arc<Self>, bindings: I) -> Arc<Scope>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Arc::new(Scope {
            vars: RwLock::new(
                bindings
                    .into_iter()
                    .map(|(k, v)| (k.into(), v))
                    .collect(),
            ),
            parent: Some(self.clone()),
        })
    }

    /// Set a binding in this frame. Parent frames are never touched, so a
    /// set cannot leak outward.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.vars
            .write()
            .expect("scope lock poisoned")
            .insert(key.into(), value);
    }

    /// Look up a single name, walking the chain outward.
    pub fn get(&self, name: &str) -> Value {
        let mut current = Some(self);
        while let Some(scope) = current {
            if let Some(v) = scope.vars.read().expect("scope lock poisoned").get(name) {
                return v.clone();
            }
            current = scope.parent.as_deref();
        }
        Value::Null
    }

    /// Look up a key path.
    ///
    /// The frame that owns the root segment resolves the whole path: a
    /// present root with a missing tail yields null rather than falling
    /// through to an outer frame. This keeps a deeply nested missing key
    /// from being shadowed by an unrelated outer binding.
    pub fn get_path(&self, path: &[&str]) -> Value {
        let Some((root, rest)) = path.split_first() else {
            return Value::Null;
        };
        let mut current = Some(self);
        while let Some(scope) = current {
            let root_value = scope
                .vars
                .read()
                .expect("scope lock poisoned")
                .get(*root)
                .cloned();
            if let Some(v) = root_value {
                let (out, _) = v.lookup_path(rest);
                return out;
            }
            current = scope.parent.as_deref();
        }
        Value::Null
    }

    /// Convenience wrapper over [`Scope::get_path`] for `"a.b.c"` keys.
    pub fn get_dotted(&self, path: &str) -> Value {
        let segments: Vec<&str> = path.split('.').collect();
        self.get_path(&segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_walks_chain() {
        let root = Scope::new();
        root.set("a", Value::Int(1));
        let child = root.extend([("b", Value::Int(2))]);
        assert_eq!(child.get("a"), Value::Int(1));
        assert_eq!(child.get("b"), Value::Int(2));
        assert_eq!(child.get("c"), Value::Null);
    }

    #[test]
    fn test_set_does_not_leak_to_parent() {
        let root = Scope::new();
        root.set("a", Value::Int(1));
        let child = root.extend([("b", Value::Int(2))]);
        child.set("a", Value::Int(99));
        assert_eq!(child.get("a"), Value::Int(99));
        assert_eq!(root.get("a"), Value::Int(1));
    }

    #[test]
    fn test_path_halts_at_owning_frame() {
        let root = Scope::new();
        root.set("info", Value::map(vec![("deep", Value::Int(7))]));
        let child = root.extend([(
            "info",
            Value::map(vec![("other", Value::Int(1))]),
        )]);
        // The inner frame owns `info`, so the missing tail is null; the
        // outer `info.deep` must not shine through.
        assert_eq!(child.get_path(&["info", "deep"]), Value::Null);
        assert_eq!(child.get_path(&["info", "other"]), Value::Int(1));
        assert_eq!(root.get_dotted("info.deep"), Value::Int(7));
    }
}
