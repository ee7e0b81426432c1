//! ShardedStore implementation
//!
//! Fixed array of shards with deterministic routing.

use std::collections::HashMap;

use crate::error::{KvError, Result};

use super::{route, Entry, Shard};

/// Fixed-size array of independently locked shards
///
/// ## Concurrency:
/// - Point operations lock only the target shard
/// - Iteration read-locks one shard at a time; it is not an atomic
///   snapshot of the whole store
/// - All methods use `&self` (share via `Arc`)
#[derive(Debug)]
pub struct ShardedStore {
    shards: Box<[Shard]>,
}

impl ShardedStore {
    /// Create a store with `shard_count` empty shards
    pub fn new(shard_count: usize) -> Result<Self> {
        if shard_count == 0 {
            return Err(KvError::Config("shard_count must be at least 1".to_string()));
        }
        let shards = (0..shard_count).map(|_| Shard::new()).collect();
        Ok(Self { shards })
    }

    /// Shard index for a key
    #[inline]
    pub fn route(&self, key: &str) -> usize {
        route(key, self.shards.len())
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<String> {
        self.shard_for(key).get(key)
    }

    /// Insert or overwrite a key, returning the previous value
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let idx = self.route(&key);
        self.shards[idx].set(key, value.into())
    }

    /// Remove a key, returning its value
    pub fn remove(&self, key: &str) -> Option<String> {
        self.shard_for(key).remove(key)
    }

    /// Insert only if the key is absent; returns `true` on insert
    pub fn insert_if_absent(&self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        let idx = self.route(&key);
        self.shards[idx].insert_if_absent(key, value.into())
    }

    /// Lazy iterator over every entry, shard by shard
    pub fn iter(&self) -> ShardedIter<'_> {
        ShardedIter {
            store: self,
            next_shard: 0,
            current: Vec::new().into_iter(),
        }
    }

    /// Run `f` over one shard's map under that shard's read lock
    pub fn visit_shard<R>(&self, index: usize, f: impl FnOnce(&HashMap<String, String>) -> R) -> R {
        self.shards[index].visit(f)
    }

    /// Number of shards
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Number of keys in one shard
    pub fn shard_len(&self, index: usize) -> usize {
        self.shards[index].len()
    }

    /// Total number of keys (sum of per-shard counts, not atomic)
    pub fn len(&self) -> usize {
        self.shards.iter().map(Shard::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(Shard::is_empty)
    }

    fn shard_for(&self, key: &str) -> &Shard {
        &self.shards[self.route(key)]
    }
}

/// Iterator over all entries of a [`ShardedStore`]
///
/// Each shard is copied out under its read lock when the iterator reaches
/// it, so writes to shards not yet visited may or may not be observed.
pub struct ShardedIter<'a> {
    store: &'a ShardedStore,
    next_shard: usize,
    current: std::vec::IntoIter<Entry>,
}

impl Iterator for ShardedIter<'_> {
    type Item = Entry;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.current.next() {
                return Some(entry);
            }
            if self.next_shard >= self.store.shards.len() {
                return None;
            }
            self.current = self.store.shards[self.next_shard].entries().into_iter();
            self.next_shard += 1;
        }
    }
}
