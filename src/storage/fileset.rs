//! File Set
//!
//! All segments of one data type: exactly one active (writable) segment and
//! any number of archived ones, keyed by id. Ids only grow; replaying the
//! archived segments in id order followed by the active one reproduces the
//! write order.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::RwMethod;
use crate::error::{Result, RoseError};

use super::{segment_path, segment_tmp_path, DataType, Discovered, Entry, Segment, MERGE_DIR};

/// Where an entry lives on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Locator {
    pub file_id: u32,
    pub offset: u64,
}

/// Active + archived segments of one data type
pub struct FileSet {
    data_type: DataType,
    dir: PathBuf,
    method: RwMethod,
    block_size: u64,
    active: Segment,
    archived: BTreeMap<u32, Segment>,
}

impl FileSet {
    /// Open the segments of `data_type` found in the data directory and in
    /// a leftover merge directory
    ///
    /// The highest id in the data directory becomes the active segment.
    /// Completed merge output is folded into the archived set; a merge temp
    /// file is dropped when the segment it was rewriting still exists and
    /// promoted otherwise.
    pub fn open(
        dir: &Path,
        data_type: DataType,
        method: RwMethod,
        block_size: u64,
        main: &Discovered,
        merge: &Discovered,
    ) -> Result<Self> {
        let merge_dir = dir.join(MERGE_DIR);
        let main_ids = main.ids(data_type);

        let mut merged_ids: Vec<u32> = merge.ids(data_type).to_vec();
        for &id in merge.tmp_ids(data_type) {
            let tmp = segment_tmp_path(&merge_dir, id, data_type);
            if main_ids.contains(&id) {
                warn!(%data_type, id, "dropping unfinished merge output");
                fs::remove_file(&tmp)?;
            } else {
                warn!(%data_type, id, "promoting merge output whose source is gone");
                fs::rename(&tmp, segment_path(&merge_dir, id, data_type))?;
                merged_ids.push(id);
            }
        }
        merged_ids.sort_unstable();
        merged_ids.dedup();

        let mut archived = BTreeMap::new();
        for &id in &merged_ids {
            if main_ids.contains(&id) {
                return Err(RoseError::MergeConflict { data_type, id });
            }
            archived.insert(id, Segment::open(&merge_dir, id, data_type, method, block_size)?);
        }

        let active_id = match main_ids.last() {
            Some(&id) => id,
            None => merged_ids.last().map(|&id| id + 1).unwrap_or(0),
        };
        for &id in main_ids.iter().filter(|&&id| id != active_id) {
            archived.insert(id, Segment::open(dir, id, data_type, method, block_size)?);
        }
        let active = Segment::open(dir, active_id, data_type, method, block_size)?;

        Ok(Self {
            data_type,
            dir: dir.to_path_buf(),
            method,
            block_size,
            active,
            archived,
        })
    }

    /// Append to the active segment, rotating first if the entry would
    /// push it past the block size
    pub fn append(&mut self, entry: &Entry, sync: bool) -> Result<Locator> {
        let used = self.active.offset();
        if used > 0 && used + entry.size() > self.block_size {
            self.rotate()?;
        }

        let offset = self.active.write(entry)?;
        if sync {
            self.active.sync()?;
        }
        Ok(Locator { file_id: self.active.id(), offset })
    }

    /// Read the entry a locator points at
    pub fn read(&self, loc: Locator) -> Result<Entry> {
        match self.segment(loc.file_id) {
            Some(segment) => segment.read(loc.offset),
            None => Err(RoseError::InvalidEntry(format!(
                "no {} segment with id {}",
                self.data_type, loc.file_id
            ))),
        }
    }

    pub fn segment(&self, id: u32) -> Option<&Segment> {
        if id == self.active.id() {
            Some(&self.active)
        } else {
            self.archived.get(&id)
        }
    }

    /// Archived segments in id order, then the active one
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.archived.values().chain(std::iter::once(&self.active))
    }

    pub fn sync_active(&self) -> Result<()> {
        self.active.sync()
    }

    pub fn sync_all(&self) -> Result<()> {
        for segment in self.segments() {
            segment.sync()?;
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn method(&self) -> RwMethod {
        self.method
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn active(&self) -> &Segment {
        &self.active
    }

    pub fn archived(&self) -> &BTreeMap<u32, Segment> {
        &self.archived
    }

    pub(crate) fn archived_mut(&mut self) -> &mut BTreeMap<u32, Segment> {
        &mut self.archived
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn rotate(&mut self) -> Result<()> {
        self.active.sync()?;
        let next_id = self.active.id() + 1;
        let next = Segment::open(&self.dir, next_id, self.data_type, self.method, self.block_size)?;
        let old = std::mem::replace(&mut self.active, next);
        debug!(data_type = %self.data_type, archived = old.id(), active = next_id, "rotated segment");
        self.archived.insert(old.id(), old);
        Ok(())
    }
}
