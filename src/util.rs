//! Small filesystem and clock helpers shared by the WAL and snapshot code.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::Result;

/// Current Unix time in whole seconds
pub fn unix_timestamp() -> i64 {
    timestamp_at(SystemTime::now())
}

/// Unix seconds of `time`; a time before the epoch logs a warning and maps to 0
pub fn timestamp_at(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => {
            tracing::warn!(
                "System clock is {:?} before the Unix epoch, using timestamp 0",
                e.duration()
            );
            0
        }
    }
}

/// Append `suffix` to a path's file name: `history.log` → `history.log.compact`
pub fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut p = path.as_os_str().to_owned();
    p.push(suffix);
    PathBuf::from(p)
}

/// Replace `path` by writing a sibling temp file, syncing it, and renaming it over.
///
/// `path` is only touched by the final rename; if `write` or any sync fails the
/// temp file is removed and the previous contents stay in place.
pub fn write_atomically<F>(path: &Path, tmp_suffix: &str, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let tmp_path = sibling_path(path, tmp_suffix);

    let result = (|| -> Result<()> {
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        write(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    fs::rename(&tmp_path, path)?;
    sync_parent_dir(path);
    Ok(())
}

/// Best-effort fsync of the directory holding `path` so a rename is durable.
///
/// Not every platform can open a directory for syncing; failures are ignored.
pub fn sync_parent_dir(path: &Path) {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if let Ok(dir) = File::open(parent) {
        let _ = dir.sync_all();
    }
}
