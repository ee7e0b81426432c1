//! ShardKV Server Binary
//!
//! Starts the TCP server for ShardKV.

use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use shardkv::network::{EngineSlot, Server};
use shardkv::snapshot::SnapshotTimer;
use shardkv::{Config, Engine, RecoveryPolicy};
use tracing_subscriber::{fmt, EnvFilter};

/// ShardKV Server
#[derive(Parser, Debug)]
#[command(name = "shardkv-server")]
#[command(about = "Sharded in-memory key-value store with WAL and snapshots")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./shardkv_data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:6000")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Number of shards
    #[arg(short, long, default_value = "32")]
    shards: usize,

    /// Which WAL records are replayed after a crash
    #[arg(short, long, value_enum, default_value = "start-wins")]
    policy: PolicyArg,

    /// Seconds between background snapshots (0 disables)
    #[arg(long, default_value = "60")]
    snapshot_interval_secs: u64,

    /// Prefix scan worker threads (defaults to available parallelism)
    #[arg(long)]
    scan_workers: Option<usize>,

    /// Skip rewriting the WAL after recovery
    #[arg(long)]
    no_compact: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PolicyArg {
    StartWins,
    DoneWins,
}

impl From<PolicyArg> for RecoveryPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::StartWins => RecoveryPolicy::StartWins,
            PolicyArg::DoneWins => RecoveryPolicy::DoneWins,
        }
    }
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,shardkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("ShardKV Server v{}", shardkv::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);

    // Build config from args
    let interval = match args.snapshot_interval_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };
    let mut builder = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .shard_count(args.shards)
        .recovery_policy(args.policy.into())
        .compact_on_recover(!args.no_compact)
        .snapshot_interval(interval);
    if let Some(workers) = args.scan_workers {
        builder = builder.scan_workers(workers);
    }
    let config = builder.build();

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        process::exit(1);
    }

    // Bind before recovery so early clients see UNAVAILABLE
    let server = match Server::bind(config.clone()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            process::exit(1);
        }
    };

    // Set up Ctrl+C handler
    let shutdown_flag = server.shutdown_handle();
    let handler_flag = Arc::clone(&shutdown_flag);
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, initiating shutdown...");
        handler_flag.store(true, Ordering::Relaxed);
    }) {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        process::exit(1);
    }

    // Recover in the background while the listener is already up
    let recovery_failed = Arc::new(AtomicBool::new(false));
    let recovery = {
        let slot = server.engine_slot();
        let failed = Arc::clone(&recovery_failed);
        let shutdown = Arc::clone(&shutdown_flag);
        thread::Builder::new()
            .name("recovery".to_string())
            .spawn(move || recover(config, slot, failed, shutdown))
    };
    let recovery = match recovery {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!("Failed to spawn recovery thread: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        shutdown_flag.store(true, Ordering::Relaxed);
    }

    // Stop the periodic timer before the final snapshot
    let timer = recovery.join().unwrap_or_else(|_| {
        tracing::error!("Recovery thread panicked");
        None
    });
    drop(timer);

    if recovery_failed.load(Ordering::Relaxed) {
        process::exit(1);
    }

    if let Some(engine) = server.engine_slot().get() {
        match engine.shutdown() {
            Ok(info) => tracing::info!("Final snapshot: {} entries", info.entries),
            Err(e) => {
                tracing::error!("Shutdown failed: {}", e);
                process::exit(1);
            }
        }
    }

    tracing::info!("Server stopped");
}

/// Open the engine, hand it to the server and start periodic snapshots
fn recover(
    config: Config,
    slot: EngineSlot,
    failed: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
) -> Option<SnapshotTimer> {
    let interval = config.snapshot_interval;

    let engine = match Engine::open(config) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            failed.store(true, Ordering::Relaxed);
            shutdown.store(true, Ordering::Relaxed);
            return None;
        }
    };

    tracing::info!("Engine initialized successfully");

    let timer = match interval {
        Some(interval) => match engine.start_snapshot_timer(interval) {
            Ok(timer) => Some(timer),
            Err(e) => {
                tracing::warn!("Periodic snapshots disabled: {}", e);
                None
            }
        },
        None => None,
    };

    if slot.set(engine).is_err() {
        tracing::error!("Engine was installed twice");
    }
    tracing::info!("Serving requests");

    timer
}
