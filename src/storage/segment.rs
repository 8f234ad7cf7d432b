//! Segment File
//!
//! One physical file per (data type, id). Entries are appended at an
//! atomic offset under the segment's own write lock; reads are positional
//! and may run concurrently with an append.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::config::RwMethod;
use crate::error::{Result, RoseError};

use super::entry::{EntryHeader, ENTRY_HEADER_SIZE};
use super::selector::{open_selector, Selector};
use super::{segment_path, DataType, Entry};

/// An append-only segment file
pub struct Segment {
    id: u32,
    data_type: DataType,
    path: PathBuf,
    selector: Box<dyn Selector>,

    /// Next write position
    offset: AtomicU64,

    /// Serializes appends so the offset advances by whole entries
    write_lock: Mutex<()>,
}

impl Segment {
    /// Open or create `{dir}/{id:09}.data.{suffix}`
    pub fn open(
        dir: &Path,
        id: u32,
        data_type: DataType,
        method: RwMethod,
        block_size: u64,
    ) -> Result<Self> {
        Self::open_at(segment_path(dir, id, data_type), id, data_type, method, block_size)
    }

    /// Open or create a segment at an explicit path
    ///
    /// File I/O segments resume writing at the file length. Memory-mapped
    /// segments are pre-sized, so the write offset is found by scanning to
    /// the first zeroed header.
    pub fn open_at(
        path: PathBuf,
        id: u32,
        data_type: DataType,
        method: RwMethod,
        block_size: u64,
    ) -> Result<Self> {
        let selector = open_selector(&path, method, block_size)?;
        let offset = match method {
            RwMethod::FileIo => selector.len()?,
            RwMethod::MMap => scan_end(selector.as_ref())?,
        };

        Ok(Self {
            id,
            data_type,
            path,
            selector,
            offset: AtomicU64::new(offset),
            write_lock: Mutex::new(()),
        })
    }

    /// Append an entry, returning the offset it was written at
    pub fn write(&self, entry: &Entry) -> Result<u64> {
        let buf = entry.encode()?;

        let _guard = self.write_lock.lock();
        let offset = self.offset.load(Ordering::Acquire);
        let written = self.selector.write_at(&buf, offset)?;
        if written != buf.len() {
            return Err(RoseError::WriteSizeMismatch { expected: buf.len(), written });
        }
        self.offset.store(offset + written as u64, Ordering::Release);
        Ok(offset)
    }

    /// Read the entry starting at `offset`
    ///
    /// Returns `EndOfEntry` when `offset` is at or past the last entry.
    pub fn read(&self, offset: u64) -> Result<Entry> {
        read_entry(self.selector.as_ref(), offset)
    }

    /// Iterate over every entry from the start of the file
    pub fn iter(&self) -> SegmentIter<'_> {
        SegmentIter { selector: self.selector.as_ref(), offset: 0, done: false }
    }

    pub fn sync(&self) -> Result<()> {
        self.selector.sync()
    }

    /// Sync and release the file
    pub fn close(self) -> Result<()> {
        self.sync()
    }

    /// Close and unlink the file
    pub fn delete(self) -> Result<()> {
        let path = self.path.clone();
        drop(self);
        fs::remove_file(path)?;
        Ok(())
    }

    /// Move the file, keeping it open
    pub fn rename(&mut self, to: PathBuf) -> Result<()> {
        fs::rename(&self.path, &to)?;
        self.path = to;
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes of entries written so far (the next write offset)
    pub fn offset(&self) -> u64 {
        self.offset.load(Ordering::Acquire)
    }
}

/// Iterator over `(offset, entry)` pairs of one segment
pub struct SegmentIter<'a> {
    selector: &'a dyn Selector,
    offset: u64,
    done: bool,
}

impl Iterator for SegmentIter<'_> {
    type Item = Result<(u64, Entry)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match read_entry(self.selector, self.offset) {
            Ok(entry) => {
                let at = self.offset;
                self.offset += entry.size();
                Some(Ok((at, entry)))
            }
            Err(RoseError::EndOfEntry) => {
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

// =============================================================================
// Private Helpers
// =============================================================================

fn read_entry(selector: &dyn Selector, offset: u64) -> Result<Entry> {
    let mut header = [0u8; ENTRY_HEADER_SIZE];
    let n = selector.read_at(&mut header, offset)?;
    if header[..n].iter().all(|&b| b == 0) {
        return Err(RoseError::EndOfEntry);
    }
    if n < ENTRY_HEADER_SIZE {
        return Err(RoseError::InvalidEntry(format!("truncated header at offset {}", offset)));
    }

    let header = EntryHeader::decode(&header)?;
    if header.key_size == 0 {
        return Err(RoseError::InvalidEntry(format!("zero key size at offset {}", offset)));
    }

    let body_offset = offset + ENTRY_HEADER_SIZE as u64;
    let len = header.payload_len();
    if body_offset + len as u64 > selector.len()? {
        return Err(RoseError::InvalidEntry(format!("truncated payload at offset {}", offset)));
    }

    let mut payload = vec![0u8; len];
    let n = selector.read_at(&mut payload, body_offset)?;
    if n < len {
        return Err(RoseError::InvalidEntry(format!("truncated payload at offset {}", offset)));
    }
    Entry::from_header(header, &payload)
}

fn scan_end(selector: &dyn Selector) -> Result<u64> {
    let iter = SegmentIter { selector, offset: 0, done: false };
    let mut end = 0;
    for item in iter {
        let (offset, entry) = item?;
        end = offset + entry.size();
    }
    Ok(end)
}
