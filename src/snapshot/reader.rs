//! Snapshot reader
//!
//! Streams entries out of a snapshot file without materializing the array.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::marker::PhantomData;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use serde::de::{IgnoredAny, SeqAccess, Visitor};

use crate::error::{KvError, Result};
use crate::store::{Entry, ShardedStore};

use super::{SnapshotInfo, TIMESTAMP_WIDTH};

/// Reader positioned just after the timestamp header
pub struct SnapshotReader {
    path: PathBuf,
    timestamp: i64,
    reader: BufReader<File>,
}

impl SnapshotReader {
    /// Open a snapshot and parse its header
    pub fn open(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);

        let mut header = [0u8; TIMESTAMP_WIDTH];
        reader.read_exact(&mut header).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => KvError::corrupt(path, 1, "file shorter than timestamp header"),
            _ => KvError::Io(e),
        })?;

        let timestamp = std::str::from_utf8(&header)
            .ok()
            .map(str::trim)
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| {
                KvError::corrupt(
                    path,
                    1,
                    format!("bad timestamp header {:?}", String::from_utf8_lossy(&header)),
                )
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            timestamp,
            reader,
        })
    }

    /// Timestamp from the header
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Feed each entry to `f` until it breaks or the array ends
    ///
    /// Returns the number of entries handed to `f`. Anything other than
    /// whitespace after the array is an error.
    pub fn for_each<F>(self, mut f: F) -> Result<u64>
    where
        F: FnMut(Entry) -> ControlFlow<()>,
    {
        let path = self.path;
        let mut de = serde_json::Deserializer::from_reader(self.reader);

        let visitor = EntryVisitor {
            f: &mut f,
            _marker: PhantomData,
        };
        let count = serde::Deserializer::deserialize_seq(&mut de, visitor)
            .map_err(|e| json_corruption(&path, e))?;
        de.end().map_err(|e| json_corruption(&path, e))?;

        Ok(count)
    }

    /// Insert every entry into `store`
    pub fn load_into(self, store: &ShardedStore) -> Result<SnapshotInfo> {
        let timestamp = self.timestamp;
        let entries = self.for_each(|entry| {
            store.set(entry.key, entry.value);
            ControlFlow::Continue(())
        })?;
        Ok(SnapshotInfo { timestamp, entries })
    }

    /// Scan for a single key, stopping at the first match
    pub fn find(self, key: &str) -> Result<Option<String>> {
        let mut found = None;
        self.for_each(|entry| {
            if entry.key == key {
                found = Some(entry.value);
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;
        Ok(found)
    }
}

fn json_corruption(path: &Path, e: serde_json::Error) -> KvError {
    KvError::corrupt(path, e.line() as u64, e.to_string())
}

struct EntryVisitor<'f, F> {
    f: &'f mut F,
    _marker: PhantomData<fn(Entry)>,
}

impl<'de, F> Visitor<'de> for EntryVisitor<'_, F>
where
    F: FnMut(Entry) -> ControlFlow<()>,
{
    type Value = u64;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an array of {\"Key\": string, \"Value\": string} objects")
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<u64, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut count = 0u64;
        while let Some(entry) = seq.next_element::<Entry>()? {
            count += 1;
            if (self.f)(entry).is_break() {
                // The deserializer rejects an unfinished array, so skim the rest.
                while seq.next_element::<IgnoredAny>()?.is_some() {}
                break;
            }
        }
        Ok(count)
    }
}
