//! Prefix Scan Module
//!
//! Parallel fan-out/merge over the shards of a [`ShardedStore`].
//!
//! ## Pipeline
//! ```text
//!                 ┌──────────┐   out 0   ┌─────────────┐
//!            ┌───▶│ worker 0 │──────────▶│ forwarder 0 │───┐
//! shard ids  │    └──────────┘           └─────────────┘   │   unified
//! ───────────┤         ...                    ...          ├──────────▶ caller
//! (work queue)│    ┌──────────┐   out W   ┌─────────────┐   │
//!            └───▶│ worker W │──────────▶│ forwarder W │───┘
//!                 └──────────┘           └─────────────┘
//!                                   WaitGroup ─▶ closer drops the last sender
//! ```
//!
//! Each worker pulls shard indices from a shared queue and filters one shard
//! at a time under that shard's read lock. No store-wide lock is taken.

use crossbeam::channel;
use crossbeam::sync::WaitGroup;

use crate::store::{Entry, ShardedStore};

/// Fan-out/merge prefix scanner
#[derive(Debug, Clone, Copy)]
pub struct PrefixScanner {
    workers: usize,
}

impl PrefixScanner {
    /// Scanner with a fixed worker pool size (at least one)
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// Scanner sized to the machine's available parallelism
    pub fn with_available_parallelism() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::new(workers)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Values of every key that starts with `prefix`
    ///
    /// Arrival order is not deterministic; every match appears exactly once.
    pub fn scan(&self, store: &ShardedStore, prefix: &str) -> Vec<String> {
        self.run(store, prefix, |_, value| value.clone())
    }

    /// Key/value pairs of every key that starts with `prefix`
    pub fn scan_entries(&self, store: &ShardedStore, prefix: &str) -> Vec<Entry> {
        self.run(store, prefix, |key, value| Entry::new(key.clone(), value.clone()))
    }

    fn run<T, M>(&self, store: &ShardedStore, prefix: &str, emit: M) -> Vec<T>
    where
        T: Send,
        M: Fn(&String, &String) -> T + Sync,
    {
        let shard_count = store.shard_count();
        // More workers than shards would only idle.
        let workers = self.workers.min(shard_count);

        // Work queue holds every shard index up front, so sends never block.
        let (work_tx, work_rx) = channel::bounded::<usize>(shard_count);
        for shard in 0..shard_count {
            let _ = work_tx.send(shard);
        }
        drop(work_tx);

        let (merged_tx, merged_rx) = channel::unbounded::<T>();
        let join = WaitGroup::new();
        let emit = &emit;

        let scanned = crossbeam::scope(|s| {
            for _ in 0..workers {
                let (out_tx, out_rx) = channel::unbounded::<T>();

                let work_rx = work_rx.clone();
                s.spawn(move |_| {
                    for shard in work_rx.iter() {
                        store.visit_shard(shard, |data| {
                            for (key, value) in data {
                                if key.starts_with(prefix) {
                                    let _ = out_tx.send(emit(key, value));
                                }
                            }
                        });
                    }
                });

                let merged_tx = merged_tx.clone();
                let done = join.clone();
                s.spawn(move |_| {
                    for item in out_rx.iter() {
                        if merged_tx.send(item).is_err() {
                            break;
                        }
                    }
                    drop(done);
                });
            }

            let closer_tx = merged_tx;
            s.spawn(move |_| {
                join.wait();
                drop(closer_tx);
            });

            merged_rx.iter().collect::<Vec<T>>()
        });

        match scanned {
            Ok(results) => {
                tracing::trace!(
                    "Prefix scan {:?}: {} matches across {} shards with {} workers",
                    prefix,
                    results.len(),
                    shard_count,
                    workers
                );
                results
            }
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

impl Default for PrefixScanner {
    fn default() -> Self {
        Self::with_available_parallelism()
    }
}
