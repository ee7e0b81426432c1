//! WAL Reader
//!
//! Reads records from the WAL file line by line.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{KvError, Result};

use super::WalRecord;

/// Reads records from the WAL file
pub struct WalReader {
    path: PathBuf,
    reader: BufReader<File>,
    line_no: u64,
    torn_tail: bool,

    /// Bytes up to and including the last complete line
    valid_len: u64,

    buf: Vec<u8>,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            line_no: 0,
            torn_tail: false,
            valid_len: 0,
            buf: Vec::with_capacity(256),
        })
    }

    /// Read the next record
    ///
    /// - `Ok(None)`: end of log. A final line without `\n` is a torn append;
    ///   it is dropped and [`torn_tail`](Self::torn_tail) is set.
    /// - `Err(CorruptState)`: a complete line that does not parse.
    pub fn next_record(&mut self) -> Result<Option<WalRecord>> {
        self.buf.clear();
        let n = self.reader.read_until(b'\n', &mut self.buf)?;
        if n == 0 {
            return Ok(None);
        }
        self.line_no += 1;

        if self.buf.last() != Some(&b'\n') {
            tracing::warn!(
                "Discarding torn record at {}:{} ({} bytes, no terminating newline)",
                self.path.display(),
                self.line_no,
                n
            );
            self.torn_tail = true;
            return Ok(None);
        }
        self.valid_len += n as u64;

        self.buf.pop();
        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }

        let line = std::str::from_utf8(&self.buf)
            .map_err(|e| KvError::corrupt(&self.path, self.line_no, format!("invalid UTF-8: {}", e)))?;

        WalRecord::decode(line)
            .map(Some)
            .map_err(|reason| KvError::corrupt(&self.path, self.line_no, reason))
    }

    /// Whether the log ended with an incomplete line
    pub fn torn_tail(&self) -> bool {
        self.torn_tail
    }

    /// Byte offset where the next append may safely start
    ///
    /// Excludes a torn final line, so truncating the file to this length
    /// leaves only complete records.
    pub fn valid_len(&self) -> u64 {
        self.valid_len
    }

    /// Number of lines consumed so far
    pub fn line_no(&self) -> u64 {
        self.line_no
    }

    /// Iterate over all records
    pub fn records(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over WAL records; stops after the first error
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl WalIterator {
    /// Whether the log ended with an incomplete line
    pub fn torn_tail(&self) -> bool {
        self.reader.torn_tail()
    }
}

impl Iterator for WalIterator {
    type Item = Result<WalRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
