//! Tests for key routing
//!
//! These tests verify:
//! - FNV-1a output against published vectors
//! - Routing is deterministic and in range

use shardkv::store::{fnv1a_32, route, ShardedStore};

// =============================================================================
// FNV-1a Vectors
// =============================================================================

#[test]
fn test_fnv1a_known_vectors() {
    assert_eq!(fnv1a_32(b""), 0x811c9dc5);
    assert_eq!(fnv1a_32(b"a"), 0xe40c292c);
    assert_eq!(fnv1a_32(b"foobar"), 0xbf9cf968);
}

#[test]
fn test_route_matches_hash_modulo() {
    for key in ["a", "apple", "ab", "user:42", ""] {
        assert_eq!(route(key, 32), fnv1a_32(key.as_bytes()) as usize % 32);
    }
}

// =============================================================================
// Routing Tests
// =============================================================================

#[test]
fn test_route_is_stable_across_stores() {
    let first = ShardedStore::new(32).unwrap();
    let second = ShardedStore::new(32).unwrap();

    for i in 0..1_000 {
        let key = format!("key-{}", i);
        assert_eq!(first.route(&key), second.route(&key));
        assert_eq!(first.route(&key), first.route(&key));
    }
}

#[test]
fn test_route_in_range_for_any_shard_count() {
    for shard_count in [1, 2, 3, 7, 32, 100] {
        for i in 0..200 {
            let key = format!("k{}", i);
            assert!(route(&key, shard_count) < shard_count);
        }
    }
}

#[test]
fn test_single_shard_routes_everything_to_zero() {
    let store = ShardedStore::new(1).unwrap();
    assert_eq!(store.route("anything"), 0);
    assert_eq!(store.route(""), 0);
}

#[test]
fn test_keys_spread_over_shards() {
    let store = ShardedStore::new(8).unwrap();
    for i in 0..800 {
        store.set(format!("key-{}", i), "v");
    }

    let used = (0..8).filter(|&i| store.shard_len(i) > 0).count();
    assert_eq!(used, 8);
}
