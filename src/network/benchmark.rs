//! Benchmark Workload
//!
//! Closed-loop load generator: one client, one request in flight, keys
//! drawn uniformly from a dataset until the time budget runs out.

use std::path::Path;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::error::{KvError, Result};
use crate::store::Entry;
use crate::wal::WalReader;

use super::Client;

/// Which requests a benchmark issues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchMode {
    /// Gets only
    Read,

    /// Gets and sets with equal probability
    ReadWrite,
}

/// Counts from one benchmark run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BenchReport {
    pub gets: u64,
    pub sets: u64,

    /// Requests the server answered with an error (a Get miss is not one)
    pub errors: u64,

    pub elapsed: Duration,
}

impl BenchReport {
    pub fn total(&self) -> u64 {
        self.gets + self.sets
    }

    pub fn ops_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.total() as f64 / secs
    }
}

/// Load key/value pairs from a file in WAL line format (`ts,key,value[,phase]`)
///
/// A history log copied from a data directory works as a dataset.
pub fn load_dataset(path: &Path) -> Result<Vec<Entry>> {
    let dataset = WalReader::open(path)?
        .records()
        .map(|r| r.map(|record| Entry::new(record.key, record.value)))
        .collect::<Result<Vec<_>>>()?;

    if dataset.is_empty() {
        return Err(KvError::Config(format!("dataset {} is empty", path.display())));
    }

    tracing::info!("Loaded dataset {}: {} entries", path.display(), dataset.len());
    Ok(dataset)
}

/// Issue random requests over `client` until `duration` has elapsed
///
/// Server-side errors are counted and the run continues; transport errors
/// end the run.
pub fn run_benchmark<R: Rng>(
    client: &mut Client,
    dataset: &[Entry],
    mode: BenchMode,
    duration: Duration,
    rng: &mut R,
) -> Result<BenchReport> {
    if dataset.is_empty() {
        return Err(KvError::Config("benchmark dataset is empty".to_string()));
    }

    let mut report = BenchReport::default();
    let start = Instant::now();

    while start.elapsed() < duration {
        let entry = &dataset[rng.gen_range(0..dataset.len())];
        let is_set = mode == BenchMode::ReadWrite && rng.gen_bool(0.5);

        let result = if is_set {
            report.sets += 1;
            client.set(&entry.key, &entry.value)
        } else {
            report.gets += 1;
            client.get(&entry.key).map(|_| ())
        };

        match result {
            Ok(()) | Err(KvError::NotFound(_)) => {}
            Err(e @ (KvError::Remote(_) | KvError::Unavailable)) => {
                tracing::debug!("Benchmark request for {:?} failed: {}", entry.key, e);
                report.errors += 1;
            }
            Err(e) => return Err(e),
        }
    }

    report.elapsed = start.elapsed();
    Ok(report)
}
