//! Byte-level I/O selectors
//!
//! A segment does not care how its bytes reach the disk. `FileIoSelector`
//! uses positioned reads/writes on the descriptor; `MmapSelector` pre-sizes
//! the file to the block size and copies in and out of a writable map.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use memmap2::MmapMut;
use parking_lot::RwLock;

use crate::config::RwMethod;
use crate::error::{Result, RoseError};

/// Uniform positional I/O over one file
pub trait Selector: Send + Sync {
    /// Write all of `buf` at `offset`, returning the number of bytes written
    fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize>;

    /// Fill as much of `buf` as is available at `offset`; 0 means end of data
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize>;

    /// Flush written bytes to stable storage
    fn sync(&self) -> Result<()>;

    /// Current length of the underlying file (or mapping)
    fn len(&self) -> Result<u64>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Open the selector matching `method` for `path`
pub fn open_selector(path: &Path, method: RwMethod, block_size: u64) -> Result<Box<dyn Selector>> {
    Ok(match method {
        RwMethod::FileIo => Box::new(FileIoSelector::open(path)?),
        RwMethod::MMap => Box::new(MmapSelector::open(path, block_size)?),
    })
}

fn open_rw(path: &Path) -> io::Result<File> {
    OpenOptions::new().read(true).write(true).create(true).truncate(false).open(path)
}

// =============================================================================
// File I/O
// =============================================================================

/// Positioned reads and writes on a plain file
pub struct FileIoSelector {
    file: File,
}

impl FileIoSelector {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self { file: open_rw(path)? })
    }
}

impl Selector for FileIoSelector {
    fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize> {
        let mut written = 0;
        while written < buf.len() {
            match pwrite(&self.file, &buf[written..], offset + written as u64) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(written)
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let mut read = 0;
        while read < buf.len() {
            match pread(&self.file, &mut buf[read..], offset + read as u64) {
                Ok(0) => break,
                Ok(n) => read += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(read)
    }

    fn sync(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

#[cfg(unix)]
fn pread(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    std::os::unix::fs::FileExt::read_at(file, buf, offset)
}

#[cfg(unix)]
fn pwrite(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    std::os::unix::fs::FileExt::write_at(file, buf, offset)
}

#[cfg(windows)]
fn pread(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    std::os::windows::fs::FileExt::seek_read(file, buf, offset)
}

#[cfg(windows)]
fn pwrite(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    std::os::windows::fs::FileExt::seek_write(file, buf, offset)
}

// =============================================================================
// Memory Map
// =============================================================================

/// Writable memory map over a file truncated to the block size
///
/// The mapping never grows: a write past its end fails with `EntryTooLarge`.
pub struct MmapSelector {
    // Kept open for the lifetime of the mapping.
    _file: File,
    map: RwLock<MmapMut>,
}

impl MmapSelector {
    /// Map `path`, extending it to `block_size` bytes first if it is smaller
    ///
    /// # Safety
    ///
    /// Uses `unsafe { MmapMut::map_mut(...) }`. The segment owning this
    /// selector is the only writer of the file for the life of the process,
    /// and all access to the map goes through the `RwLock`.
    pub fn open(path: &Path, block_size: u64) -> Result<Self> {
        let file = open_rw(path)?;
        if file.metadata()?.len() < block_size {
            file.set_len(block_size)?;
        }
        let map = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { _file: file, map: RwLock::new(map) })
    }
}

impl Selector for MmapSelector {
    fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize> {
        let mut map = self.map.write();
        let capacity = map.len() as u64;
        let end = offset + buf.len() as u64;
        if end > capacity {
            return Err(RoseError::EntryTooLarge { size: buf.len() as u64, capacity });
        }
        map[offset as usize..end as usize].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let map = self.map.read();
        let len = map.len() as u64;
        if offset >= len {
            return Ok(0);
        }
        let n = buf.len().min((len - offset) as usize);
        let start = offset as usize;
        buf[..n].copy_from_slice(&map[start..start + n]);
        Ok(n)
    }

    fn sync(&self) -> Result<()> {
        self.map.read().flush()?;
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        Ok(self.map.read().len() as u64)
    }
}
