//! Snapshot writer

use std::io::Write;
use std::path::Path;

use crate::error::{KvError, Result};
use crate::store::Entry;
use crate::util::write_atomically;

use super::{SnapshotInfo, TIMESTAMP_WIDTH};

/// Suffix of the temporary file a snapshot is staged in
pub const SNAPSHOT_TMP_SUFFIX: &str = ".tmp";

/// Write `entries` as a snapshot stamped `timestamp`, replacing `path` atomically
///
/// Entries are streamed straight from the iterator to the file.
pub fn write_snapshot<I>(path: &Path, timestamp: i64, entries: I) -> Result<SnapshotInfo>
where
    I: IntoIterator<Item = Entry>,
{
    if timestamp < 0 {
        return Err(KvError::Config(format!(
            "snapshot timestamp must not be negative: {}",
            timestamp
        )));
    }
    let header = format!("{:0width$}", timestamp, width = TIMESTAMP_WIDTH);
    if header.len() != TIMESTAMP_WIDTH {
        return Err(KvError::Config(format!(
            "snapshot timestamp {} does not fit in {} digits",
            timestamp, TIMESTAMP_WIDTH
        )));
    }

    let mut count = 0u64;
    write_atomically(path, SNAPSHOT_TMP_SUFFIX, |w| {
        w.write_all(header.as_bytes())?;
        w.write_all(b"[")?;
        for entry in entries {
            if count > 0 {
                w.write_all(b",")?;
            }
            serde_json::to_writer(&mut *w, &entry)?;
            count += 1;
        }
        w.write_all(b"]\n")?;
        Ok(())
    })?;

    Ok(SnapshotInfo {
        timestamp,
        entries: count,
    })
}
