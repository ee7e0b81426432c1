//! # ShardKV
//!
//! A sharded in-memory key-value store with:
//! - Two-phase Write-Ahead Logging (WAL) for durability
//! - Point-in-time JSON snapshots with a streaming reader
//! - Crash recovery with a configurable policy for interrupted writes
//! - Parallel prefix scans fanned out over shards
//! - TCP-based client protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │          (Multiple Clients, UNAVAILABLE until ready)         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Engine                                 │
//! │              (Get / Set / GetPrefix)                         │
//! └──────┬──────────────────┬─────────────────────┬─────────────┘
//!        │                  │                     │
//!        ▼                  ▼                     ▼
//!  ┌───────────┐    ┌───────────────┐     ┌──────────────┐
//!  │    WAL    │    │ ShardedStore  │◄────│ PrefixScanner│
//!  │(start/done)│   │ (N × RwLock)  │     │ (fan-out)    │
//!  └─────┬─────┘    └───────┬───────┘     └──────────────┘
//!        │                  │
//!        ▼                  ▼
//!  ┌───────────┐    ┌───────────────┐
//!  │history.log│    │ snapshot.json │
//!  └───────────┘    └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod util;

pub mod store;
pub mod wal;
pub mod snapshot;
pub mod recovery;
pub mod scan;
pub mod engine;
pub mod protocol;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvError, Result};
pub use config::{Config, RecoveryPolicy};
pub use engine::Engine;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of ShardKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
