//! Periodic snapshot thread

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, select, Sender};

use crate::engine::Engine;
use crate::error::Result;

/// Handle to the background snapshot thread
///
/// Stops the thread when dropped.
pub struct SnapshotTimer {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl SnapshotTimer {
    /// Snapshot `engine` every `interval` until stopped
    pub fn start(engine: Arc<Engine>, interval: Duration) -> Result<Self> {
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("snapshot-timer".to_string())
            .spawn(move || {
                let ticker = channel::tick(interval);
                tracing::debug!("Snapshot timer started (every {:?})", interval);
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            // Failures are retried on the next tick.
                            if let Err(e) = engine.snapshot() {
                                tracing::warn!("Periodic snapshot failed: {}", e);
                            }
                        }
                        recv(stop_rx) -> _ => break,
                    }
                }
                tracing::debug!("Snapshot timer stopped");
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it to exit
    pub fn stop(&mut self) {
        // Dropping the sender disconnects the stop channel, which wakes the loop.
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Snapshot timer thread panicked");
            }
        }
    }
}

impl Drop for SnapshotTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
