//! WAL Recovery
//!
//! Replays the log into a store and rewrites it from recovered state.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::config::RecoveryPolicy;
use crate::error::{KvError, Result};
use crate::store::ShardedStore;
use crate::util::{unix_timestamp, write_atomically};

use super::{Phase, WalReader, WalRecord};

/// Suffix of the temporary file compaction writes before renaming
pub const COMPACT_SUFFIX: &str = ".compact";

/// Handles WAL replay and compaction
pub struct WalRecovery;

/// Result of a replay
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayStats {
    /// Complete records read from the log
    pub records_read: u64,

    /// Records applied to the store under the active policy
    pub records_applied: u64,

    /// `start` records with no matching `done` (interrupted writes)
    pub interrupted_writes: u64,

    /// Whether a torn final line was discarded
    pub torn_tail: bool,

    /// Length of the log through its last complete line
    pub valid_len: u64,

    /// Timestamp of the last record read
    pub last_timestamp: Option<i64>,
}

impl WalRecovery {
    /// Replay `path` into `store` under `policy`
    ///
    /// Any malformed complete line aborts the replay with `CorruptState`;
    /// the store may then hold a partial state and must not be served.
    pub fn replay(path: &Path, store: &ShardedStore, policy: RecoveryPolicy) -> Result<ReplayStats> {
        let mut reader = WalReader::open(path)?;
        let mut stats = ReplayStats::default();

        // start records still waiting for their done, keyed by (key, value)
        let mut in_flight: HashMap<(String, String), u64> = HashMap::new();

        while let Some(record) = reader.next_record()? {
            stats.records_read += 1;
            stats.last_timestamp = Some(record.timestamp);

            match record.phase {
                Some(Phase::Start) => {
                    *in_flight
                        .entry((record.key.clone(), record.value.clone()))
                        .or_insert(0) += 1;
                }
                Some(Phase::Done) => {
                    let pair = (record.key.clone(), record.value.clone());
                    if let Some(count) = in_flight.get_mut(&pair) {
                        *count -= 1;
                        if *count == 0 {
                            in_flight.remove(&pair);
                        }
                    }
                }
                None => {}
            }

            if record.is_replayable(policy) {
                store.set(record.key, record.value);
                stats.records_applied += 1;
            }
        }

        stats.torn_tail = reader.torn_tail();
        stats.valid_len = reader.valid_len();
        stats.interrupted_writes = in_flight.values().sum();

        if stats.interrupted_writes > 0 {
            tracing::warn!(
                "WAL {} holds {} interrupted write(s); policy {:?} {}",
                path.display(),
                stats.interrupted_writes,
                policy,
                match policy {
                    RecoveryPolicy::StartWins => "restored them",
                    RecoveryPolicy::DoneWins => "discarded them",
                }
            );
        }

        Ok(stats)
    }

    /// Cut the log at `path` back to `len` bytes and sync it
    ///
    /// Used to drop a torn final line so later appends start on a clean
    /// line boundary.
    pub fn truncate(path: &Path, len: u64) -> Result<()> {
        let file = OpenOptions::new().write(true).open(path)?;
        let old_len = file.metadata()?.len();

        file.set_len(len)
            .and_then(|_| file.sync_all())
            .map_err(|e| {
                KvError::Durability(format!("truncate of {} failed: {}", path.display(), e))
            })?;

        tracing::warn!(
            "Truncated WAL {} from {} to {} bytes",
            path.display(),
            old_len,
            len
        );
        Ok(())
    }

    /// Rewrite `path` with one single-phase record per entry in `store`
    ///
    /// The new log is written to a sibling temp file and renamed over the
    /// old one; on failure the old log is left untouched. Returns the number
    /// of records written.
    pub fn compact(path: &Path, store: &ShardedStore) -> Result<u64> {
        let now = unix_timestamp();
        let mut written = 0u64;

        write_atomically(path, COMPACT_SUFFIX, |w| {
            for entry in store.iter() {
                let record = WalRecord::new(now, entry.key, entry.value, None);
                w.write_all(record.encode().as_bytes())?;
                written += 1;
            }
            Ok(())
        })?;

        Ok(written)
    }
}
