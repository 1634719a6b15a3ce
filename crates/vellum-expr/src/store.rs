//! The per-render shared store.
//!
//! Functions and directives use the store to pass data to each other
//! across one render. The `Send + Sync` bound is the synchronisation
//! contract: when a render uses `<parallel>`, the store is reached from
//! more than one thread.

use crate::value::Value;
use rustc_hash::FxHashMap;
use std::sync::RwLock;

/// A key-value container shared by callbacks across a single render.
pub trait Store: Send + Sync {
    /// Look up a key.
    fn get(&self, key: &str) -> Option<Value>;
    /// Set a key.
    fn set(&self, key: &str, value: Value);
}

/// The default in-memory store.
#[derive(Debug, Default)]
pub struct MapStore {
    vars: RwLock<FxHashMap<String, Value>>,
}

impl MapStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MapStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.vars
            .read()
            .expect("store lock poisoned")
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.vars
            .write()
            .expect("store lock poisoned")
            .insert(key.to_string(), value);
    }
}
