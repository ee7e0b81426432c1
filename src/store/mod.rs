//! Store Module
//!
//! The sharded in-memory map that holds every live key.
//!
//! ## Responsibilities
//! - Route each key to exactly one shard (FNV-1a modulo shard count)
//! - Per-shard read/write locking so unrelated keys never contend
//! - Lazy whole-store iteration for snapshots, compaction and scans
//!
//! ## Layout
//! ```text
//! ┌──────────────────────── ShardedStore ────────────────────────┐
//! │ ┌─────────┐ ┌─────────┐ ┌─────────┐          ┌─────────────┐ │
//! │ │ Shard 0 │ │ Shard 1 │ │ Shard 2 │   ...    │ Shard N - 1 │ │
//! │ │ RwLock  │ │ RwLock  │ │ RwLock  │          │   RwLock    │ │
//! │ │ HashMap │ │ HashMap │ │ HashMap │          │   HashMap   │ │
//! │ └─────────┘ └─────────┘ └─────────┘          └─────────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod hash;
mod shard;
mod sharded;

use serde::{Deserialize, Serialize};

pub use hash::{fnv1a_32, route};
pub use shard::Shard;
pub use sharded::{ShardedIter, ShardedStore};

/// A key/value pair as it appears in snapshots and iteration
///
/// Field names match the on-disk snapshot schema (`{"Key": .., "Value": ..}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(rename = "Key")]
    pub key: String,

    #[serde(rename = "Value")]
    pub value: String,
}

impl Entry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}
