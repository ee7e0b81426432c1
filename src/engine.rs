//! Engine Module
//!
//! The service facade that binds the store, WAL, snapshots and prefix scans
//! into the Get / Set / GetPrefix contract.
//!
//! ## Responsibilities
//! - Run recovery before the engine can be used
//! - Fail-closed writes: nothing becomes visible unless its `start` record is durable
//! - Snapshot-file fallback for point reads that miss in memory
//! - Point-in-time snapshots on demand

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use parking_lot::RwLock;

use crate::config::{Config, RecoveryPolicy};
use crate::error::{KvError, Result};
use crate::protocol::{Command, Response};
use crate::recovery::{RecoveryManager, RecoveryReport, SNAPSHOT_FILENAME, WAL_FILENAME};
use crate::scan::PrefixScanner;
use crate::snapshot::{write_snapshot, SnapshotInfo, SnapshotReader, SnapshotTimer};
use crate::store::{Entry, ShardedStore};
use crate::util::unix_timestamp;
use crate::wal::{Phase, WalWriter};

/// `last_snapshot` value before any snapshot; 0 is a valid header timestamp
const NO_SNAPSHOT: i64 = i64::MIN;

/// The storage engine and service facade
///
/// ## Concurrency Model
///
/// - **Point reads/writes** lock only the shard that owns the key
/// - **Sets** hold `wal` from the `start` append through the `done` append
///   (one fsync per record)
/// - **Prefix scans** read-lock one shard at a time
/// - **Snapshots** hold `snapshot_lock` for writing; fallback reads hold it
///   for reading, so a reader never sees a half-replaced file
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Sharded in-memory map
    store: ShardedStore,

    /// Write-ahead log (single serialization point for writers)
    wal: Mutex<WalWriter>,

    /// Fan-out/merge prefix scanner
    scanner: PrefixScanner,

    /// Path of the snapshot file
    snapshot_path: PathBuf,

    /// Process-wide snapshot lock, distinct from the shard locks
    snapshot_lock: RwLock<()>,

    /// Header timestamp of the newest snapshot loaded or written
    last_snapshot: AtomicI64,

    /// What startup recovery found
    recovery: RecoveryReport,
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Validate config and create the data directory
    /// 2. Load snapshot, replay WAL, compact WAL
    /// 3. Open the WAL for appending
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        fs::create_dir_all(&config.data_dir).map_err(|e| {
            KvError::Config(format!(
                "cannot create data directory {}: {}",
                config.data_dir.display(),
                e
            ))
        })?;

        let store = ShardedStore::new(config.shard_count)?;
        let manager = RecoveryManager::new(&config);
        let recovery = manager.recover(&store)?;

        let wal = WalWriter::open(manager.wal_path())?;

        tracing::info!(
            "Engine ready: {} keys across {} shards",
            recovery.keys_recovered,
            store.shard_count()
        );

        let mut engine = Self::from_parts(config, store, wal)?;
        if let Some(info) = recovery.snapshot {
            engine.last_snapshot.store(info.timestamp, Ordering::Release);
        }
        engine.recovery = recovery;
        Ok(engine)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(config)
    }

    /// Assemble an engine from an already populated store and an open WAL
    ///
    /// No recovery is run.
    pub fn from_parts(config: Config, store: ShardedStore, wal: WalWriter) -> Result<Self> {
        config.validate()?;
        if store.shard_count() != config.shard_count {
            return Err(KvError::Config(format!(
                "store has {} shards but config says {}",
                store.shard_count(),
                config.shard_count
            )));
        }

        let scanner = PrefixScanner::new(config.effective_scan_workers());
        let snapshot_path = config.data_dir.join(SNAPSHOT_FILENAME);

        Ok(Self {
            config,
            store,
            wal: Mutex::new(wal),
            scanner,
            snapshot_path,
            snapshot_lock: RwLock::new(()),
            last_snapshot: AtomicI64::new(NO_SNAPSHOT),
            recovery: RecoveryReport::default(),
        })
    }

    /// Execute a command
    ///
    /// Routes commands to appropriate handlers
    pub fn execute(&self, command: Command) -> Result<Response> {
        match command {
            Command::Get { key } => {
                let value = self.get(&key)?;
                Ok(Response::ok(Some(value.into_bytes())))
            }
            Command::Set { key, value } => {
                self.set(&key, &value)?;
                Ok(Response::ok(None))
            }
            Command::GetPrefix { prefix } => {
                let values = self.get_prefix(&prefix)?;
                Ok(Response::values(&values))
            }
            Command::Ping => Ok(Response::ok(Some(b"PONG".to_vec()))),
        }
    }

    /// Get a value by key
    ///
    /// Search order:
    /// 1. Owning shard
    /// 2. Snapshot file (if `snapshot_fallback`), warming the shard on a hit
    pub fn get(&self, key: &str) -> Result<String> {
        if let Some(value) = self.store.get(key) {
            return Ok(value);
        }

        if self.config.snapshot_fallback {
            if let Some(value) = self.fallback_lookup(key)? {
                return Ok(value);
            }
        }

        tracing::debug!("Get miss for key {:?}", key);
        Err(KvError::NotFound(format!("key {:?}", key)))
    }

    /// Set a key-value pair
    ///
    /// Steps, all under the WAL lock:
    /// 1. WAL `start` (fsync). On failure nothing is applied.
    /// 2. Write to the owning shard
    /// 3. WAL `done` (fsync). Under `DoneWins` a failure here undoes step 2.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        // Shard apply order for a key must match its order in the log.
        let mut wal = self.lock_wal()?;

        // Step 1: durable intent
        if let Err(e) = wal.append(key, value, Phase::Start) {
            tracing::error!("WAL start append failed for key {:?}: {}", key, e);
            return Err(e);
        }

        // Step 2: make it visible
        let previous = self.store.set(key, value);

        // Step 3: completion marker
        if let Err(e) = wal.append(key, value, Phase::Done) {
            match self.config.recovery_policy {
                RecoveryPolicy::StartWins => {
                    // The start record alone restores this write on restart.
                    tracing::warn!("WAL done append failed for key {:?}: {}", key, e);
                }
                RecoveryPolicy::DoneWins => {
                    tracing::error!(
                        "WAL done append failed for key {:?}, rolling back: {}",
                        key,
                        e
                    );
                    match previous {
                        Some(old) => {
                            self.store.set(key, old);
                        }
                        None => {
                            self.store.remove(key);
                        }
                    }
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    /// Values of every key starting with `prefix`
    ///
    /// Zero matches is `NotFound`, same as a Get miss.
    pub fn get_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let values = self.scanner.scan(&self.store, prefix);
        if values.is_empty() {
            tracing::debug!("No keys with prefix {:?}", prefix);
            return Err(KvError::NotFound(format!("prefix {:?}", prefix)));
        }
        Ok(values)
    }

    /// Key/value pairs of every key starting with `prefix` (may be empty)
    pub fn scan_entries(&self, prefix: &str) -> Vec<Entry> {
        self.scanner.scan_entries(&self.store, prefix)
    }

    /// Write a snapshot of the current store
    ///
    /// The snapshot is fuzzy: writes racing with it may or may not be
    /// included, and the WAL covers either case on recovery.
    pub fn snapshot(&self) -> Result<SnapshotInfo> {
        let _guard = self.snapshot_lock.write();

        let info = write_snapshot(&self.snapshot_path, unix_timestamp(), self.store.iter())?;
        self.last_snapshot.store(info.timestamp, Ordering::Release);

        tracing::info!(
            "Snapshot written to {}: {} entries",
            self.snapshot_path.display(),
            info.entries
        );
        Ok(info)
    }

    /// Start a background thread that snapshots every `interval`
    pub fn start_snapshot_timer(self: &Arc<Self>, interval: Duration) -> Result<SnapshotTimer> {
        SnapshotTimer::start(Arc::clone(self), interval)
    }

    /// Final snapshot plus a WAL sync, for orderly shutdown
    ///
    /// The engine stays usable; later writes are still logged.
    pub fn shutdown(&self) -> Result<SnapshotInfo> {
        let info = self.snapshot()?;
        self.lock_wal()?.sync()?;
        tracing::info!("Engine shut down cleanly");
        Ok(info)
    }

    /// Close the engine gracefully
    pub fn close(self) -> Result<()> {
        self.shutdown().map(|_| ())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Path of the write-ahead log
    pub fn wal_path(&self) -> PathBuf {
        self.config.data_dir.join(WAL_FILENAME)
    }

    /// Path of the snapshot file
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Number of keys held in memory
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Number of shards
    pub fn shard_count(&self) -> usize {
        self.store.shard_count()
    }

    /// Direct access to the in-memory store
    pub fn store(&self) -> &ShardedStore {
        &self.store
    }

    /// Report from startup recovery
    pub fn recovery_report(&self) -> &RecoveryReport {
        &self.recovery
    }

    /// Header timestamp of the newest snapshot loaded or written
    pub fn last_snapshot_time(&self) -> Option<i64> {
        match self.last_snapshot.load(Ordering::Acquire) {
            NO_SNAPSHOT => None,
            ts => Some(ts),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn lock_wal(&self) -> Result<MutexGuard<'_, WalWriter>> {
        self.wal
            .lock()
            .map_err(|e| KvError::LockPoisoned(format!("WAL lock poisoned: {}", e)))
    }

    fn fallback_lookup(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.snapshot_lock.read();

        if !self.snapshot_path.exists() {
            return Ok(None);
        }

        let found = SnapshotReader::open(&self.snapshot_path)?.find(key)?;
        match found {
            Some(value) => {
                // A concurrent Set may have landed first; it wins.
                if !self.store.insert_if_absent(key, value.clone()) {
                    return Ok(self.store.get(key).or(Some(value)));
                }
                tracing::debug!("Warmed key {:?} from snapshot", key);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}
