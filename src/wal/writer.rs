//! WAL Writer
//!
//! Appends records to the log file, one fsync per record.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{KvError, Result};
use crate::util::unix_timestamp;

use super::{Phase, WalRecord};

/// Byte sink a [`WalWriter`] appends to
///
/// Implemented for [`File`]; tests supply their own to inject I/O failures.
pub trait LogFile: Send {
    /// Write all of `buf` at the end of the log
    fn append(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Flush appended data to stable storage
    fn sync_data(&mut self) -> io::Result<()>;

    /// Flush data and metadata to stable storage
    fn sync_all(&mut self) -> io::Result<()>;

    /// Cut the log to `len` bytes
    fn truncate(&mut self, len: u64) -> io::Result<()>;

    /// Current length in bytes
    fn size(&self) -> io::Result<u64>;
}

impl LogFile for File {
    fn append(&mut self, buf: &[u8]) -> io::Result<()> {
        self.write_all(buf)
    }

    fn sync_data(&mut self) -> io::Result<()> {
        File::sync_data(self)
    }

    fn sync_all(&mut self) -> io::Result<()> {
        File::sync_all(self)
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}

/// Writes records to the WAL file
///
/// Not internally synchronized: the engine wraps it in a mutex so that
/// every append+fsync is serialized.
pub struct WalWriter {
    path: PathBuf,
    file: Box<dyn LogFile>,

    /// Length of the file up to the last fully synced record
    synced_len: u64,

    records_written: u64,
}

impl WalWriter {
    /// Open or create a WAL file in append mode
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Self::with_file(path, Box::new(file))
    }

    /// Wrap an already open log; `path` is only used in messages
    pub fn with_file(path: &Path, file: Box<dyn LogFile>) -> Result<Self> {
        let synced_len = file.size()?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            synced_len,
            records_written: 0,
        })
    }

    /// Append a `key,value,phase` record stamped with the current time
    ///
    /// Returns only after the record has been synced to disk.
    pub fn append(&mut self, key: &str, value: &str, phase: Phase) -> Result<()> {
        let record = WalRecord::new(unix_timestamp(), key, value, Some(phase));
        self.append_record(&record)
    }

    /// Append a pre-built record and sync it
    pub fn append_record(&mut self, record: &WalRecord) -> Result<()> {
        let line = record.encode();

        let written = self
            .file
            .append(line.as_bytes())
            .and_then(|_| self.file.sync_data());

        if let Err(e) = written {
            // Cut off any partial line so the next append starts on a clean boundary.
            if let Err(trunc_err) = self.file.truncate(self.synced_len) {
                tracing::error!(
                    "Failed to roll back partial WAL record in {}: {}",
                    self.path.display(),
                    trunc_err
                );
            }
            return Err(KvError::Durability(format!(
                "append to {} failed: {}",
                self.path.display(),
                e
            )));
        }

        self.synced_len += line.len() as u64;
        self.records_written += 1;
        Ok(())
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file
            .sync_all()
            .map_err(|e| KvError::Durability(format!("sync of {} failed: {}", self.path.display(), e)))
    }

    /// Records appended through this writer
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Bytes in the log that are known to be durable
    pub fn synced_len(&self) -> u64 {
        self.synced_len
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for WalWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalWriter")
            .field("path", &self.path)
            .field("synced_len", &self.synced_len)
            .field("records_written", &self.records_written)
            .finish()
    }
}
