//! Tests for the TCP server and client
//!
//! These tests verify:
//! - Commands over a real socket
//! - UNAVAILABLE until the engine is installed
//! - Connection cap and graceful shutdown
//! - The closed-loop benchmark driver

use std::fs;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use shardkv::config::Config;
use shardkv::engine::Engine;
use rand::rngs::StdRng;
use rand::SeedableRng;
use shardkv::network::{load_dataset, run_benchmark, BenchMode, Client, Server};
use shardkv::protocol::{read_response, Status};
use shardkv::KvError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

const TIMEOUT: Duration = Duration::from_secs(5);

fn test_config(temp: &TempDir) -> Config {
    Config::builder()
        .data_dir(temp.path())
        .listen_addr("127.0.0.1:0")
        .shard_count(8)
        .snapshot_interval(None)
        .build()
}

/// Start a server on an ephemeral port; returns it with its address
fn spawn_server(server: Server) -> (Arc<Server>, String, JoinHandle<()>) {
    let server = Arc::new(server);
    let addr = server.local_addr().unwrap().to_string();
    let runner = Arc::clone(&server);
    let handle = thread::spawn(move || runner.run().unwrap());
    (server, addr, handle)
}

fn start_with_engine() -> (TempDir, Arc<Server>, String, JoinHandle<()>) {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp);
    let engine = Arc::new(Engine::open(config.clone()).unwrap());
    let (server, addr, handle) = spawn_server(Server::new(config, engine).unwrap());
    (temp, server, addr, handle)
}

fn stop(server: &Server, handle: JoinHandle<()>) {
    server.shutdown();
    handle.join().unwrap();
}

// =============================================================================
// Request Tests
// =============================================================================

#[test]
fn test_ping() {
    let (_temp, server, addr, handle) = start_with_engine();

    let mut client = Client::connect(&addr, TIMEOUT).unwrap();
    client.ping().unwrap();

    stop(&server, handle);
}

#[test]
fn test_set_get_prefix_over_tcp() {
    let (_temp, server, addr, handle) = start_with_engine();

    let mut client = Client::connect(&addr, TIMEOUT).unwrap();
    client.set("a", "1").unwrap();
    client.set("apple", "2").unwrap();
    client.set("ab", "3").unwrap();

    assert_eq!(client.get("apple").unwrap(), "2");

    let mut values = client.get_prefix("a").unwrap();
    values.sort();
    assert_eq!(values, vec!["1", "2", "3"]);

    assert!(client.get("missing").unwrap_err().is_not_found());
    assert!(client.get_prefix("zzz").unwrap_err().is_not_found());

    stop(&server, handle);
}

#[test]
fn test_values_with_separators_survive_transport() {
    let (_temp, server, addr, handle) = start_with_engine();

    let mut client = Client::connect(&addr, TIMEOUT).unwrap();
    client.set("k,1", "line1\nline2,\\").unwrap();
    assert_eq!(client.get("k,1").unwrap(), "line1\nline2,\\");

    stop(&server, handle);
}

#[test]
fn test_multiple_clients() {
    let (_temp, server, addr, handle) = start_with_engine();

    let workers: Vec<_> = (0..4)
        .map(|t| {
            let addr = addr.clone();
            thread::spawn(move || {
                let mut client = Client::connect(&addr, TIMEOUT).unwrap();
                for i in 0..10 {
                    let key = format!("c{}:{}", t, i);
                    client.set(&key, "v").unwrap();
                    assert_eq!(client.get(&key).unwrap(), "v");
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let mut client = Client::connect(&addr, TIMEOUT).unwrap();
    assert_eq!(client.get_prefix("c").unwrap().len(), 40);

    stop(&server, handle);
}

// =============================================================================
// Availability Tests
// =============================================================================

#[test]
fn test_unavailable_until_engine_installed() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp);
    let (server, addr, handle) = spawn_server(Server::bind(config.clone()).unwrap());

    let mut client = Client::connect(&addr, TIMEOUT).unwrap();
    assert!(matches!(client.ping(), Err(KvError::Unavailable)));
    assert!(matches!(client.get("k"), Err(KvError::Unavailable)));

    let engine = Arc::new(Engine::open(config).unwrap());
    server.install_engine(engine).unwrap();

    client.set("k", "v").unwrap();
    assert_eq!(client.get("k").unwrap(), "v");

    stop(&server, handle);
}

#[test]
fn test_engine_installed_only_once() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp);
    let engine = Arc::new(Engine::open(config.clone()).unwrap());
    let server = Server::new(config, Arc::clone(&engine)).unwrap();

    assert!(server.install_engine(engine).is_err());
}

#[test]
fn test_bind_failure_is_network_error() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp.path())
        .listen_addr("not-an-address")
        .build();

    assert!(matches!(Server::bind(config), Err(KvError::Network(_))));
}

// =============================================================================
// Connection Handling Tests
// =============================================================================

#[test]
fn test_malformed_frame_gets_error_and_close() {
    let (_temp, server, addr, handle) = start_with_engine();

    let mut stream = TcpStream::connect(&addr).unwrap();
    stream.set_read_timeout(Some(TIMEOUT)).unwrap();
    stream.write_all(&[0x7f, 0, 0, 0, 0]).unwrap();

    let response = read_response(&mut stream).unwrap();
    assert_eq!(response.status, Status::Error);

    let mut rest = Vec::new();
    assert_eq!(stream.read_to_end(&mut rest).unwrap(), 0);

    stop(&server, handle);
}

#[test]
fn test_connection_cap() {
    let temp = TempDir::new().unwrap();
    let mut config = test_config(&temp);
    config.max_connections = 1;
    let engine = Arc::new(Engine::open(config.clone()).unwrap());
    let (server, addr, handle) = spawn_server(Server::new(config, engine).unwrap());

    let mut first = Client::connect(&addr, TIMEOUT).unwrap();
    first.ping().unwrap();

    // The rejection is sent without waiting for a request.
    let mut second = TcpStream::connect(&addr).unwrap();
    second.set_read_timeout(Some(TIMEOUT)).unwrap();
    let response = read_response(&mut second).unwrap();
    assert_eq!(response.status, Status::Error);
    assert!(response.text().unwrap().contains("too many connections"));

    drop(first);
    let deadline = Instant::now() + TIMEOUT;
    while server.active_connections() > 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }

    let mut third = Client::connect(&addr, TIMEOUT).unwrap();
    third.ping().unwrap();

    stop(&server, handle);
}

#[test]
fn test_shutdown_stops_run() {
    let (_temp, server, _addr, handle) = start_with_engine();

    thread::sleep(Duration::from_millis(50));
    stop(&server, handle);

    assert!(server.shutdown_handle().load(std::sync::atomic::Ordering::Relaxed));
}

// =============================================================================
// Benchmark Tests
// =============================================================================

#[test]
fn test_benchmark_read_write_mode() {
    let (temp, server, addr, handle) = start_with_engine();
    let dataset_path = temp.path().join("dataset.txt");
    fs::write(&dataset_path, "1,k1,v1\n2,k2,v2,start\n3,k3,v3\n").unwrap();

    let dataset = load_dataset(&dataset_path).unwrap();
    assert_eq!(dataset.len(), 3);

    let mut client = Client::connect(&addr, TIMEOUT).unwrap();
    let mut rng = StdRng::seed_from_u64(7);
    let report = run_benchmark(
        &mut client,
        &dataset,
        BenchMode::ReadWrite,
        Duration::from_millis(200),
        &mut rng,
    )
    .unwrap();

    assert!(report.sets > 0);
    assert!(report.gets > 0);
    assert_eq!(report.errors, 0);
    assert!(report.elapsed >= Duration::from_millis(200));

    // Every set wrote a dataset pair.
    for entry in &dataset {
        match client.get(&entry.key) {
            Ok(value) => assert_eq!(value, entry.value),
            Err(e) => assert!(e.is_not_found()),
        }
    }

    stop(&server, handle);
}

#[test]
fn test_benchmark_read_mode_never_writes() {
    let (temp, server, addr, handle) = start_with_engine();
    let dataset_path = temp.path().join("dataset.txt");
    fs::write(&dataset_path, "1,r1,v1\n1,r2,v2\n").unwrap();
    let dataset = load_dataset(&dataset_path).unwrap();

    let mut client = Client::connect(&addr, TIMEOUT).unwrap();
    let report = run_benchmark(
        &mut client,
        &dataset,
        BenchMode::Read,
        Duration::from_millis(100),
        &mut StdRng::seed_from_u64(1),
    )
    .unwrap();

    assert_eq!(report.sets, 0);
    assert!(report.gets > 0);
    assert_eq!(report.total(), report.gets);
    assert!(client.get("r1").unwrap_err().is_not_found());

    stop(&server, handle);
}

#[test]
fn test_empty_dataset_is_rejected() {
    let temp = TempDir::new().unwrap();
    let dataset_path = temp.path().join("dataset.txt");
    fs::write(&dataset_path, "").unwrap();

    assert!(matches!(load_dataset(&dataset_path), Err(KvError::Config(_))));
}
