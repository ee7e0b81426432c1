//! Point and prefix operations

use std::sync::Arc;
use std::thread;

use shardkv::config::Config;
use shardkv::engine::Engine;
use shardkv::protocol::{Command, Status};
use shardkv::KvError;
use tempfile::TempDir;

use crate::setup_temp_engine;

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_engine_open_creates_data_dir() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("nested").join("db");

    let engine = Engine::open(Config::builder().data_dir(&data_dir).build()).unwrap();

    assert!(data_dir.is_dir());
    assert!(engine.wal_path().exists());
    assert!(engine.recovery_report().is_first_boot());
    assert_eq!(engine.shard_count(), 32);
}

#[test]
fn test_engine_rejects_invalid_config() {
    let temp_dir = TempDir::new().unwrap();

    let zero_shards = Config::builder().data_dir(temp_dir.path()).shard_count(0).build();
    assert!(matches!(Engine::open(zero_shards), Err(KvError::Config(_))));

    let zero_workers = Config::builder().data_dir(temp_dir.path()).scan_workers(0).build();
    assert!(matches!(Engine::open(zero_workers), Err(KvError::Config(_))));

    let file = temp_dir.path().join("not-a-dir");
    std::fs::write(&file, "x").unwrap();
    let bad_dir = Config::builder().data_dir(&file).build();
    assert!(matches!(Engine::open(bad_dir), Err(KvError::Config(_))));
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_set_get() {
    let (_temp, engine) = setup_temp_engine();

    engine.set("hello", "world").unwrap();

    assert_eq!(engine.get("hello").unwrap(), "world");
    assert_eq!(engine.len(), 1);
}

#[test]
fn test_get_missing_is_not_found() {
    let (_temp, engine) = setup_temp_engine();

    let err = engine.get("missing").unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_set_overwrites() {
    let (_temp, engine) = setup_temp_engine();

    engine.set("k", "v1").unwrap();
    engine.set("k", "v2").unwrap();

    assert_eq!(engine.get("k").unwrap(), "v2");
}

#[test]
fn test_set_writes_start_and_done() {
    let (_temp, engine) = setup_temp_engine();

    engine.set("x", "9").unwrap();

    let log = std::fs::read_to_string(engine.wal_path()).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with(",x,9,start"));
    assert!(lines[1].ends_with(",x,9,done"));
}

#[test]
fn test_prefix_scenario() {
    let (_temp, engine) = setup_temp_engine();

    engine.set("a", "1").unwrap();
    engine.set("apple", "2").unwrap();
    engine.set("ab", "3").unwrap();

    let mut values = engine.get_prefix("a").unwrap();
    values.sort();
    assert_eq!(values, vec!["1", "2", "3"]);

    assert_eq!(engine.get("a").unwrap(), "1");
    assert!(engine.get("missing").unwrap_err().is_not_found());
}

#[test]
fn test_prefix_no_match_is_not_found() {
    let (_temp, engine) = setup_temp_engine();
    engine.set("apple", "1").unwrap();

    assert!(engine.get_prefix("b").unwrap_err().is_not_found());
}

#[test]
fn test_empty_prefix_matches_everything() {
    let (_temp, engine) = setup_temp_engine();
    for i in 0..50 {
        engine.set(&format!("k{}", i), "v").unwrap();
    }

    assert_eq!(engine.get_prefix("").unwrap().len(), 50);
}

#[test]
fn test_scan_entries() {
    let (_temp, engine) = setup_temp_engine();
    engine.set("user:1", "alice").unwrap();
    engine.set("team:1", "core").unwrap();

    let entries = engine.scan_entries("user:");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key, "user:1");
    assert!(engine.scan_entries("nobody").is_empty());
}

// =============================================================================
// Command Execution Tests
// =============================================================================

#[test]
fn test_execute_commands() {
    let (_temp, engine) = setup_temp_engine();

    let response = engine
        .execute(Command::Set {
            key: "k".to_string(),
            value: "v".to_string(),
        })
        .unwrap();
    assert_eq!(response.status, Status::Ok);
    assert_eq!(response.payload, None);

    let response = engine.execute(Command::Get { key: "k".to_string() }).unwrap();
    assert_eq!(response.text().unwrap(), "v");

    let response = engine
        .execute(Command::GetPrefix {
            prefix: "k".to_string(),
        })
        .unwrap();
    assert_eq!(response.decode_values().unwrap(), vec!["v"]);

    let response = engine.execute(Command::Ping).unwrap();
    assert_eq!(response.text().unwrap(), "PONG");
}

#[test]
fn test_execute_get_missing_is_error() {
    let (_temp, engine) = setup_temp_engine();

    let err = engine
        .execute(Command::Get {
            key: "nope".to_string(),
        })
        .unwrap_err();
    assert!(err.is_not_found());
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_writers_distinct_keys() {
    let (_temp, engine) = setup_temp_engine();
    let engine = Arc::new(engine);
    let mut handles = vec![];

    for t in 0..4 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            for i in 0..25 {
                let key = format!("t{}:{}", t, i);
                engine.set(&key, &i.to_string()).unwrap();
                assert_eq!(engine.get(&key).unwrap(), i.to_string());
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.len(), 100);
    assert_eq!(engine.get_prefix("t2:").unwrap().len(), 25);

    let log = std::fs::read_to_string(engine.wal_path()).unwrap();
    assert_eq!(log.lines().count(), 200);
}
