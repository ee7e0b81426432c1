//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single non-blocking acceptor loop polling a shutdown flag
//! - One thread per connection, capped by `max_connections`
//! - Commands routed through the Engine once recovery has installed it
//! - Closed-loop benchmark driver for the CLI

use std::sync::{Arc, OnceLock};

use crate::engine::Engine;

mod benchmark;
mod client;
mod connection;
mod server;

pub use benchmark::{load_dataset, run_benchmark, BenchMode, BenchReport};
pub use client::Client;
pub use connection::Connection;
pub use server::Server;

/// Engine shared with connections; empty until recovery finishes
pub type EngineSlot = Arc<OnceLock<Arc<Engine>>>;
