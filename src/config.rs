//! Configuration for ShardKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{KvError, Result};

/// Main configuration for a ShardKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── history.log      (write-ahead log)
    ///     └── snapshot.json    (point-in-time snapshot)
    pub data_dir: PathBuf,

    /// Number of shards the key space is split into (fixed for the process)
    pub shard_count: usize,

    // -------------------------------------------------------------------------
    // Recovery Configuration
    // -------------------------------------------------------------------------
    /// Which WAL records are replayed on startup
    pub recovery_policy: RecoveryPolicy,

    /// Rewrite the WAL from the recovered state after a successful replay
    pub compact_on_recover: bool,

    // -------------------------------------------------------------------------
    // Snapshot Configuration
    // -------------------------------------------------------------------------
    /// Look up keys in the snapshot file when they miss in memory
    pub snapshot_fallback: bool,

    /// Period of the background snapshot timer (`None` disables it)
    pub snapshot_interval: Option<Duration>,

    // -------------------------------------------------------------------------
    // Scan Configuration
    // -------------------------------------------------------------------------
    /// Prefix scan worker count (`None` = available parallelism)
    pub scan_workers: Option<usize>,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds)
    pub write_timeout_ms: u64,
}

/// WAL replay policy for writes interrupted between `start` and `done`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryPolicy {
    /// Replay `start` records: an interrupted write's intended value is restored
    #[default]
    StartWins,

    /// Replay `done` records only: interrupted writes are discarded
    DoneWins,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./shardkv_data"),
            shard_count: 32,
            recovery_policy: RecoveryPolicy::StartWins,
            compact_on_recover: true,
            snapshot_fallback: true,
            snapshot_interval: Some(Duration::from_secs(60)),
            scan_workers: None,
            listen_addr: "127.0.0.1:6000".to_string(),
            max_connections: 1024,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.shard_count == 0 {
            return Err(KvError::Config("shard_count must be at least 1".to_string()));
        }
        if self.scan_workers == Some(0) {
            return Err(KvError::Config("scan_workers must be at least 1".to_string()));
        }
        if self.snapshot_interval == Some(Duration::ZERO) {
            return Err(KvError::Config(
                "snapshot_interval must be non-zero (use None to disable)".to_string(),
            ));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(KvError::Config("data_dir must not be empty".to_string()));
        }
        if self.data_dir.exists() && !self.data_dir.is_dir() {
            return Err(KvError::Config(format!(
                "data_dir {} exists and is not a directory",
                self.data_dir.display()
            )));
        }
        Ok(())
    }

    /// Effective prefix scan worker count
    pub fn effective_scan_workers(&self) -> usize {
        self.scan_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the number of shards
    pub fn shard_count(mut self, count: usize) -> Self {
        self.config.shard_count = count;
        self
    }

    /// Set the WAL recovery policy
    pub fn recovery_policy(mut self, policy: RecoveryPolicy) -> Self {
        self.config.recovery_policy = policy;
        self
    }

    /// Enable or disable WAL compaction after recovery
    pub fn compact_on_recover(mut self, enabled: bool) -> Self {
        self.config.compact_on_recover = enabled;
        self
    }

    /// Enable or disable the snapshot-file fallback for Get
    pub fn snapshot_fallback(mut self, enabled: bool) -> Self {
        self.config.snapshot_fallback = enabled;
        self
    }

    /// Set the background snapshot period
    pub fn snapshot_interval(mut self, interval: Option<std::time::Duration>) -> Self {
        self.config.snapshot_interval = interval;
        self
    }

    /// Set the prefix scan worker count
    pub fn scan_workers(mut self, workers: usize) -> Self {
        self.config.scan_workers = Some(workers);
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
