//! Snapshot Module
//!
//! Point-in-time dump of the whole store, used to bound startup work and as
//! a file-backed fallback for point reads.
//!
//! ## File Format
//! ```text
//! ┌────────────────────┬──────────────────────────────────────────────┐
//! │ Timestamp (10)     │ JSON array                                   │
//! │ ASCII, zero-padded │ [{"Key":"a","Value":"1"},{"Key":..}, ...]    │
//! └────────────────────┴──────────────────────────────────────────────┘
//! ```
//! There is no separator between the header and the array. The array is
//! decoded one element at a time, never buffered whole.

mod reader;
mod timer;
mod writer;

pub use reader::SnapshotReader;
pub use timer::SnapshotTimer;
pub use writer::{write_snapshot, SNAPSHOT_TMP_SUFFIX};

/// Width of the ASCII timestamp header
pub const TIMESTAMP_WIDTH: usize = 10;

/// Summary of a snapshot read or written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotInfo {
    /// Unix seconds from the header
    pub timestamp: i64,

    /// Number of entries in the array
    pub entries: u64,
}
