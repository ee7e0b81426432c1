//! Write-Ahead Log (WAL) Module
//!
//! Provides durability guarantees through append-only logging.
//!
//! ## Responsibilities
//! - Append a `start` record before a shard is mutated, `done` after
//! - fsync every record before returning (no batching)
//! - Replay on startup under a [`RecoveryPolicy`](crate::config::RecoveryPolicy)
//! - Rewrite the log from recovered state (compaction)
//!
//! ## File Format
//! ```text
//! 1700000000,user:1,alice,start
//! 1700000000,user:1,alice,done
//! 1700000042,user:2,bob,start        <- crash before done: interrupted write
//! 1700000050,user:3,carol            <- single-phase record (compacted log)
//! ```
//! `\`, `,`, newline and carriage return inside keys and values are
//! backslash-escaped.

mod entry;
mod reader;
mod recovery;
mod writer;

pub use entry::{Phase, WalRecord};
pub use reader::{WalIterator, WalReader};
pub use recovery::{ReplayStats, WalRecovery, COMPACT_SUFFIX};
pub use writer::{LogFile, WalWriter};
