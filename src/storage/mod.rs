//! Storage Module
//!
//! Append-only segment files, one family per data type.
//!
//! ## Responsibilities
//! - Encode/decode log entries (fixed header + raw payload)
//! - Read and write segment bytes through a pluggable selector (file I/O or mmap)
//! - Rotate the active segment when it reaches the block size
//! - Discover existing segments on startup
//!
//! ## Directory Layout
//! ```text
//! {dir}/
//!   000000000.data.str      archived string segment
//!   000000001.data.str      active string segment (highest id)
//!   000000000.data.list
//!   ...
//!   DB.CFG
//!   rosedb_merge/           merge output, folded back in when a merge completes
//! ```
//!
//! ## Entry Format
//! ```text
//! ┌────────┬────────┬────────┬────────┬───────┬───────────┬──────────┬─────┬───────┬───────┐
//! │ CRC(4) │ KSz(4) │ VSz(4) │ ESz(4) │ St(2) │ TStamp(8) │ Rsvd(8)  │ Key │ Value │ Extra │
//! └────────┴────────┴────────┴────────┴───────┴───────────┴──────────┴─────┴───────┴───────┘
//!   CRC covers the value bytes only. St = (data type << 8) | operation mark.
//! ```

mod entry;
mod fileset;
pub mod mark;
mod segment;
mod selector;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use entry::{Entry, ENTRY_HEADER_SIZE};
pub use fileset::{FileSet, Locator};
pub use segment::{Segment, SegmentIter};
pub use selector::{FileIoSelector, MmapSelector, Selector};

/// Subdirectory holding merge output until a merge pass completes
pub const MERGE_DIR: &str = "rosedb_merge";

/// Suffix given to a merge output segment that reuses the id of the
/// segment currently being rewritten
pub const MERGE_TMP_SUFFIX: &str = "tmp";

// =============================================================================
// Data Types
// =============================================================================

/// The five logical data types, each stored in its own segment family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum DataType {
    String = 0,
    List = 1,
    Hash = 2,
    Set = 3,
    ZSet = 4,
}

impl DataType {
    /// Every data type, in tag order
    pub const ALL: [DataType; 5] = [
        DataType::String,
        DataType::List,
        DataType::Hash,
        DataType::Set,
        DataType::ZSet,
    ];

    /// Number of data types
    pub const COUNT: usize = 5;

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(DataType::String),
            1 => Some(DataType::List),
            2 => Some(DataType::Hash),
            3 => Some(DataType::Set),
            4 => Some(DataType::ZSet),
            _ => None,
        }
    }

    /// File name suffix for this type's segments
    pub fn suffix(self) -> &'static str {
        match self {
            DataType::String => "str",
            DataType::List => "list",
            DataType::Hash => "hash",
            DataType::Set => "set",
            DataType::ZSet => "zset",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.suffix() == suffix)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

// =============================================================================
// File Naming
// =============================================================================

/// "000000042.data.str"
pub fn segment_file_name(id: u32, data_type: DataType) -> String {
    format!("{:09}.data.{}", id, data_type.suffix())
}

/// Generate a segment path given a directory, id and type
pub fn segment_path(dir: &Path, id: u32, data_type: DataType) -> PathBuf {
    dir.join(segment_file_name(id, data_type))
}

/// Temporary merge output path for `id`
pub fn segment_tmp_path(dir: &Path, id: u32, data_type: DataType) -> PathBuf {
    dir.join(format!("{}.{}", segment_file_name(id, data_type), MERGE_TMP_SUFFIX))
}

/// Parse a segment file name
/// "000000042.data.str" → Some((42, String, false))
/// "000000042.data.str.tmp" → Some((42, String, true))
pub fn parse_segment_name(name: &str) -> Option<(u32, DataType, bool)> {
    let mut parts = name.split('.');
    let id = parts.next()?.parse().ok()?;
    if parts.next()? != "data" {
        return None;
    }
    let data_type = DataType::from_suffix(parts.next()?)?;
    let tmp = match parts.next() {
        None => false,
        Some(MERGE_TMP_SUFFIX) => true,
        Some(_) => return None,
    };
    if parts.next().is_some() {
        return None;
    }
    Some((id, data_type, tmp))
}

/// Segment ids found in one directory
#[derive(Debug, Default)]
pub struct Discovered {
    /// Sorted ids per data type
    pub ids: BTreeMap<DataType, Vec<u32>>,

    /// Merge temp files, per data type
    pub tmp_ids: BTreeMap<DataType, Vec<u32>>,
}

impl Discovered {
    pub fn ids(&self, data_type: DataType) -> &[u32] {
        self.ids.get(&data_type).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tmp_ids(&self, data_type: DataType) -> &[u32] {
        self.tmp_ids.get(&data_type).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Scan `dir` for segment files. A missing directory yields nothing.
pub fn discover(dir: &Path) -> Result<Discovered> {
    let mut found = Discovered::default();
    if !dir.is_dir() {
        return Ok(found);
    }

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some((id, data_type, tmp)) = parse_segment_name(&name.to_string_lossy()) else {
            continue;
        };
        let bucket = if tmp { &mut found.tmp_ids } else { &mut found.ids };
        bucket.entry(data_type).or_default().push(id);
    }

    for ids in found.ids.values_mut().chain(found.tmp_ids.values_mut()) {
        ids.sort_unstable();
        ids.dedup();
    }
    Ok(found)
}
