//! Tests for WAL Recovery
//!
//! These tests verify:
//! - Replay under both recovery policies, with and without interrupted writes
//! - Replay idempotence
//! - Compaction output and failure behavior

use std::fs;
use std::path::PathBuf;

use shardkv::config::RecoveryPolicy;
use shardkv::store::ShardedStore;
use shardkv::wal::{ReplayStats, WalReader, WalRecovery, COMPACT_SUFFIX};
use shardkv::KvError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

const CLEAN_LOG: &[u8] = b"1,a,1,start\n1,a,1,done\n2,b,2,start\n2,b,2,done\n3,a,3,start\n3,a,3,done\n";

const INTERRUPTED_LOG: &[u8] = b"1,a,1,start\n1,a,1,done\n2,x,9,start\n";

fn write_log(contents: &[u8]) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("history.log");
    fs::write(&wal_path, contents).unwrap();
    (temp_dir, wal_path)
}

fn replay(path: &PathBuf, policy: RecoveryPolicy) -> (ShardedStore, ReplayStats) {
    let store = ShardedStore::new(8).unwrap();
    let stats = WalRecovery::replay(path, &store, policy).unwrap();
    (store, stats)
}

// =============================================================================
// Replay Tests
// =============================================================================

#[test]
fn test_clean_log_same_under_both_policies() {
    let (_temp, wal_path) = write_log(CLEAN_LOG);

    for policy in [RecoveryPolicy::StartWins, RecoveryPolicy::DoneWins] {
        let (store, stats) = replay(&wal_path, policy);
        assert_eq!(store.get("a"), Some("3".to_string()));
        assert_eq!(store.get("b"), Some("2".to_string()));
        assert_eq!(stats.records_read, 6);
        assert_eq!(stats.records_applied, 3);
        assert_eq!(stats.interrupted_writes, 0);
        assert_eq!(stats.last_timestamp, Some(3));
    }
}

#[test]
fn test_interrupted_write_start_wins() {
    let (_temp, wal_path) = write_log(INTERRUPTED_LOG);

    let (store, stats) = replay(&wal_path, RecoveryPolicy::StartWins);

    assert_eq!(store.get("x"), Some("9".to_string()));
    assert_eq!(store.get("a"), Some("1".to_string()));
    assert_eq!(stats.interrupted_writes, 1);
}

#[test]
fn test_interrupted_write_done_wins() {
    let (_temp, wal_path) = write_log(INTERRUPTED_LOG);

    let (store, stats) = replay(&wal_path, RecoveryPolicy::DoneWins);

    assert_eq!(store.get("x"), None);
    assert_eq!(store.get("a"), Some("1".to_string()));
    assert_eq!(stats.interrupted_writes, 1);
}

#[test]
fn test_single_phase_records_always_apply() {
    let (_temp, wal_path) = write_log(b"1,a,1\n2,b,2\n");

    for policy in [RecoveryPolicy::StartWins, RecoveryPolicy::DoneWins] {
        let (store, stats) = replay(&wal_path, policy);
        assert_eq!(store.len(), 2);
        assert_eq!(stats.records_applied, 2);
    }
}

#[test]
fn test_replay_is_idempotent() {
    let (_temp, wal_path) = write_log(CLEAN_LOG);

    let once = ShardedStore::new(8).unwrap();
    WalRecovery::replay(&wal_path, &once, RecoveryPolicy::StartWins).unwrap();

    let twice = ShardedStore::new(8).unwrap();
    WalRecovery::replay(&wal_path, &twice, RecoveryPolicy::StartWins).unwrap();
    WalRecovery::replay(&wal_path, &twice, RecoveryPolicy::StartWins).unwrap();

    let mut a: Vec<_> = once.iter().map(|e| (e.key, e.value)).collect();
    let mut b: Vec<_> = twice.iter().map(|e| (e.key, e.value)).collect();
    a.sort();
    b.sort();
    assert_eq!(a, b);
}

#[test]
fn test_replay_torn_tail_not_applied() {
    let (_temp, wal_path) = write_log(b"1,a,1,start\n1,a,1,done\n2,b,2,sta");

    let (store, stats) = replay(&wal_path, RecoveryPolicy::StartWins);

    assert!(stats.torn_tail);
    assert_eq!(stats.valid_len, 23);
    assert_eq!(store.get("b"), None);
    assert_eq!(store.get("a"), Some("1".to_string()));
}

#[test]
fn test_truncate_drops_torn_tail() {
    let (_temp, wal_path) = write_log(b"1,a,1,start\n1,a,1,done\n2,b,2,sta");
    let (_, stats) = replay(&wal_path, RecoveryPolicy::StartWins);

    WalRecovery::truncate(&wal_path, stats.valid_len).unwrap();

    assert_eq!(fs::read(&wal_path).unwrap(), b"1,a,1,start\n1,a,1,done\n");
    let (_, again) = replay(&wal_path, RecoveryPolicy::StartWins);
    assert!(!again.torn_tail);
    assert_eq!(again.records_read, 2);
}

#[test]
fn test_replay_corrupt_line_fails() {
    let (_temp, wal_path) = write_log(b"1,a,1,start\nnot,a,record,at,all\n");

    let store = ShardedStore::new(8).unwrap();
    let err = WalRecovery::replay(&wal_path, &store, RecoveryPolicy::StartWins).unwrap_err();

    assert!(matches!(err, KvError::CorruptState { line: 2, .. }));
}

// =============================================================================
// Compaction Tests
// =============================================================================

#[test]
fn test_compact_writes_single_phase_records() {
    let (temp, wal_path) = write_log(CLEAN_LOG);
    let (store, _) = replay(&wal_path, RecoveryPolicy::StartWins);

    let written = WalRecovery::compact(&wal_path, &store).unwrap();
    assert_eq!(written, 2);

    let records: Vec<_> = WalReader::open(&wal_path)
        .unwrap()
        .records()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.phase.is_none()));

    let tmp = temp.path().join(format!("history.log{}", COMPACT_SUFFIX));
    assert!(!tmp.exists());
}

#[test]
fn test_compacted_log_replays_to_same_state() {
    let (_temp, wal_path) = write_log(INTERRUPTED_LOG);
    let (before, _) = replay(&wal_path, RecoveryPolicy::StartWins);

    WalRecovery::compact(&wal_path, &before).unwrap();

    // Compacted records are single-phase, so the policy no longer matters.
    let (after, stats) = replay(&wal_path, RecoveryPolicy::DoneWins);
    assert_eq!(after.get("x"), Some("9".to_string()));
    assert_eq!(after.get("a"), Some("1".to_string()));
    assert_eq!(stats.interrupted_writes, 0);
}

#[test]
fn test_compact_failure_keeps_original_log() {
    let (temp, wal_path) = write_log(CLEAN_LOG);
    let (store, _) = replay(&wal_path, RecoveryPolicy::StartWins);

    // A directory where the temp file should go makes the rewrite fail.
    let tmp = temp.path().join(format!("history.log{}", COMPACT_SUFFIX));
    fs::create_dir(&tmp).unwrap();

    assert!(WalRecovery::compact(&wal_path, &store).is_err());
    assert_eq!(fs::read(&wal_path).unwrap(), CLEAN_LOG);
}
