//! Shard implementation
//!
//! One partition of the key space: a HashMap behind its own RwLock.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::Entry;

/// A single independently locked partition
#[derive(Debug, Default)]
pub struct Shard {
    data: RwLock<HashMap<String, String>>,
}

impl Shard {
    /// Create a new empty shard
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by key (read lock)
    pub fn get(&self, key: &str) -> Option<String> {
        self.data.read().get(key).cloned()
    }

    /// Insert or overwrite (write lock). Returns the previous value.
    pub fn set(&self, key: String, value: String) -> Option<String> {
        self.data.write().insert(key, value)
    }

    /// Remove a key (write lock). Returns the removed value.
    pub fn remove(&self, key: &str) -> Option<String> {
        self.data.write().remove(key)
    }

    /// Insert only if the key is absent (write lock)
    ///
    /// Returns `true` if the value was inserted.
    pub fn insert_if_absent(&self, key: String, value: String) -> bool {
        let mut data = self.data.write();
        if data.contains_key(&key) {
            return false;
        }
        data.insert(key, value);
        true
    }

    /// Number of keys in this shard
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Copy out every entry under one read lock acquisition
    pub fn entries(&self) -> Vec<Entry> {
        self.data
            .read()
            .iter()
            .map(|(k, v)| Entry::new(k.clone(), v.clone()))
            .collect()
    }

    /// Run `f` over the map while holding the read lock
    pub fn visit<R>(&self, f: impl FnOnce(&HashMap<String, String>) -> R) -> R {
        let data = self.data.read();
        f(&data)
    }
}
