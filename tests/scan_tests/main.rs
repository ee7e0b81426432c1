//! Tests for the parallel prefix scanner
//!
//! These tests verify:
//! - Exactly the matching values, no duplicates or omissions
//! - Results are independent of shard and worker counts
//! - Empty prefix matches everything
//! - Scans run alongside writers

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::thread;

use shardkv::scan::PrefixScanner;
use shardkv::store::ShardedStore;

// =============================================================================
// Helper Functions
// =============================================================================

fn populated(shard_count: usize) -> (ShardedStore, BTreeMap<String, String>) {
    let store = ShardedStore::new(shard_count).unwrap();
    let mut expected = BTreeMap::new();
    for i in 0..400 {
        let key = match i % 4 {
            0 => format!("user:{}", i),
            1 => format!("user{}", i),
            2 => format!("item:{}", i),
            _ => format!("u{}", i),
        };
        let value = format!("v{}", i);
        store.set(key.clone(), value.clone());
        expected.insert(key, value);
    }
    (store, expected)
}

fn expected_values(expected: &BTreeMap<String, String>, prefix: &str) -> Vec<String> {
    let mut values: Vec<String> = expected
        .iter()
        .filter(|(k, _)| k.starts_with(prefix))
        .map(|(_, v)| v.clone())
        .collect();
    values.sort();
    values
}

fn sorted(mut values: Vec<String>) -> Vec<String> {
    values.sort();
    values
}

// =============================================================================
// Correctness Tests
// =============================================================================

#[test]
fn test_scan_matches_for_all_shard_and_worker_counts() {
    for shard_count in [1, 2, 7, 32] {
        let (store, expected) = populated(shard_count);

        for workers in [1, 2, 4, 16, 64] {
            let scanner = PrefixScanner::new(workers);
            for prefix in ["user:", "user", "u", "item:", "nothing"] {
                let got = sorted(scanner.scan(&store, prefix));
                assert_eq!(
                    got,
                    expected_values(&expected, prefix),
                    "shards={} workers={} prefix={:?}",
                    shard_count,
                    workers,
                    prefix
                );
            }
        }
    }
}

#[test]
fn test_scan_has_no_duplicates() {
    let (store, _) = populated(16);
    let scanner = PrefixScanner::new(8);

    let got = scanner.scan(&store, "");
    let unique: HashSet<_> = got.iter().collect();

    assert_eq!(got.len(), 400);
    assert_eq!(unique.len(), 400);
}

#[test]
fn test_scan_is_true_prefix() {
    let store = ShardedStore::new(4).unwrap();
    store.set("a", "1");
    store.set("apple", "2");
    store.set("ab", "3");
    store.set("banana", "4");
    store.set("xa", "5");

    let got = sorted(PrefixScanner::new(2).scan(&store, "a"));
    assert_eq!(got, vec!["1", "2", "3"]);
}

#[test]
fn test_scan_empty_store() {
    let store = ShardedStore::new(4).unwrap();
    assert!(PrefixScanner::new(4).scan(&store, "").is_empty());
}

#[test]
fn test_scan_entries_pairs_keys_with_values() {
    let store = ShardedStore::new(8).unwrap();
    store.set("user:1", "alice");
    store.set("user:2", "bob");
    store.set("order:1", "book");

    let mut entries = PrefixScanner::new(3).scan_entries(&store, "user:");
    entries.sort_by(|a, b| a.key.cmp(&b.key));

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].key, "user:1");
    assert_eq!(entries[0].value, "alice");
    assert_eq!(entries[1].key, "user:2");
}

#[test]
fn test_worker_count_floor() {
    assert_eq!(PrefixScanner::new(0).workers(), 1);
    assert!(PrefixScanner::default().workers() >= 1);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_scans_alongside_writers() {
    let store = Arc::new(ShardedStore::new(16).unwrap());
    for i in 0..200 {
        store.set(format!("stable:{}", i), "s");
    }

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..2_000 {
                store.set(format!("churn:{}", i), "c");
            }
        })
    };

    let scanner = PrefixScanner::new(4);
    for _ in 0..20 {
        assert_eq!(scanner.scan(&store, "stable:").len(), 200);
    }

    writer.join().unwrap();
    assert_eq!(scanner.scan(&store, "churn:").len(), 2_000);
}
