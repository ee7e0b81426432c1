//! Recovery Manager
//!
//! Rebuilds the store on startup.
//!
//! ## Startup ordering
//! 1. Load `snapshot.json` if it exists
//! 2. Replay `history.log` if it exists (corrects anything newer than the snapshot)
//! 3. Compact the log from the recovered state (if enabled), otherwise cut
//!    off a torn final line
//!
//! Any decode error aborts recovery: the process must not serve a
//! partially recovered store.

use std::path::{Path, PathBuf};

use crate::config::{Config, RecoveryPolicy};
use crate::error::Result;
use crate::snapshot::{SnapshotInfo, SnapshotReader};
use crate::store::ShardedStore;
use crate::wal::{ReplayStats, WalRecovery};

/// File name of the write-ahead log inside the data directory
pub const WAL_FILENAME: &str = "history.log";

/// File name of the snapshot inside the data directory
pub const SNAPSHOT_FILENAME: &str = "snapshot.json";

/// What recovery found and did
#[derive(Debug, Default, Clone)]
pub struct RecoveryReport {
    /// Snapshot header and entry count, if a snapshot was loaded
    pub snapshot: Option<SnapshotInfo>,

    /// WAL replay stats, if a log was present
    pub wal: Option<ReplayStats>,

    /// Records written by compaction, if it ran
    pub compacted_records: Option<u64>,

    /// Keys in the store after recovery
    pub keys_recovered: usize,
}

impl RecoveryReport {
    /// Neither a snapshot nor a log existed
    pub fn is_first_boot(&self) -> bool {
        self.snapshot.is_none() && self.wal.is_none()
    }
}

/// Coordinates snapshot load, WAL replay and compaction
pub struct RecoveryManager {
    wal_path: PathBuf,
    snapshot_path: PathBuf,
    policy: RecoveryPolicy,
    compact: bool,
}

impl RecoveryManager {
    /// Build a manager for the files under `config.data_dir`
    pub fn new(config: &Config) -> Self {
        Self {
            wal_path: config.data_dir.join(WAL_FILENAME),
            snapshot_path: config.data_dir.join(SNAPSHOT_FILENAME),
            policy: config.recovery_policy,
            compact: config.compact_on_recover,
        }
    }

    /// Load a snapshot file into `store`
    pub fn load_snapshot(path: &Path, store: &ShardedStore) -> Result<SnapshotInfo> {
        tracing::info!("Loading snapshot from {}", path.display());
        let info = SnapshotReader::open(path)?.load_into(store)?;
        tracing::info!(
            "Snapshot loaded: {} entries, taken at {}",
            info.entries,
            info.timestamp
        );
        Ok(info)
    }

    /// Replay a WAL file into `store`
    pub fn load_wal(path: &Path, store: &ShardedStore, policy: RecoveryPolicy) -> Result<ReplayStats> {
        tracing::info!("Replaying WAL {} (policy {:?})", path.display(), policy);
        let stats = WalRecovery::replay(path, store, policy)?;
        tracing::info!(
            "WAL replay: {} records read, {} applied, {} interrupted, torn_tail={}",
            stats.records_read,
            stats.records_applied,
            stats.interrupted_writes,
            stats.torn_tail
        );
        Ok(stats)
    }

    /// Rewrite the WAL at `path` from `store`
    pub fn compact(path: &Path, store: &ShardedStore) -> Result<u64> {
        let written = WalRecovery::compact(path, store)?;
        tracing::info!("Compacted WAL {} to {} records", path.display(), written);
        Ok(written)
    }

    /// Run the full startup sequence against an empty `store`
    pub fn recover(&self, store: &ShardedStore) -> Result<RecoveryReport> {
        let mut report = RecoveryReport::default();

        if self.snapshot_path.exists() {
            report.snapshot = Some(Self::load_snapshot(&self.snapshot_path, store)?);
        }

        if self.wal_path.exists() {
            let stats = Self::load_wal(&self.wal_path, store, self.policy)?;

            if self.compact {
                report.compacted_records = Some(Self::compact(&self.wal_path, store)?);
            } else if stats.torn_tail {
                // The writer appends after this point.
                WalRecovery::truncate(&self.wal_path, stats.valid_len)?;
            }
            report.wal = Some(stats);
        }

        report.keys_recovered = store.len();

        if report.is_first_boot() {
            tracing::info!("No snapshot or WAL found, starting with an empty store");
        }

        Ok(report)
    }

    pub fn wal_path(&self) -> &Path {
        &self.wal_path
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }
}
