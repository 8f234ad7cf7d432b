//! Engine Module
//!
//! The embedded multi-type store that ties segments, indexes, expiry and
//! merge together.
//!
//! ## Responsibilities
//! - Open the data directory and replay every data type in parallel
//! - Validate input before anything is written
//! - Route typed operations to the right store under the right locks
//! - Expire keys lazily when they are touched
//! - Run merges on demand and from a background ticker
//!
//! ## Locking
//! ```text
//! gate: RwLock<()>          read  → every public operation
//!                           write → merge, backup, close
//! strs/lists/…: RwLock<Store<I>>
//!                           read  → lookups
//!                           write → mutations (and lookups that find an
//!                                   expired key and must clear it)
//! ```
//! Lock order is always gate → store. Helpers below a public operation
//! never take the gate again.

mod cache;
mod hashes;
mod lists;
mod merge;
mod sets;
mod store;
mod strings;
mod zsets;

use std::fs;
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

use crate::config::{Config, IndexMode};
use crate::ds::{HashIndex, ListIndex, SetIndex, ZSetIndex};
use crate::error::{Result, RoseError};
use crate::storage::{self, DataType, FileSet, MERGE_DIR};

use self::merge::MergeTicker;
use self::store::{Store, TypeIndex};
use self::strings::StrIndex;

/// Segment layout of one data type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentStats {
    pub data_type: DataType,
    pub active_id: u32,
    pub active_size: u64,
    pub archived_ids: Vec<u32>,
    pub keys: usize,
}

/// The storage engine
///
/// Shared as `Arc<Engine>`; every operation takes `&self`. The background
/// merge ticker holds only a weak reference, so dropping the last `Arc`
/// shuts it down.
pub struct Engine {
    /// Engine configuration
    config: Config,

    strs: RwLock<Store<StrIndex>>,
    lists: RwLock<Store<ListIndex>>,
    hashes: RwLock<Store<HashIndex>>,
    sets: RwLock<Store<SetIndex>>,
    zsets: RwLock<Store<ZSetIndex>>,

    /// Shared by operations, exclusive for merge/backup/close
    gate: RwLock<()>,

    closed: AtomicBool,

    /// Set as soon as close starts; a running merge stops at the next segment
    closing: AtomicBool,
    merging: AtomicBool,

    /// Stop signals for a running merge, one slot per data type
    stop_tx: Sender<()>,
    stop_rx: Receiver<()>,

    ticker: Mutex<Option<MergeTicker>>,
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Validate the config and create the data directory
    /// 2. Discover segments (data directory and leftover merge output)
    /// 3. Replay all five data types in parallel
    /// 4. Start the periodic merge ticker
    pub fn open(config: Config) -> Result<Arc<Self>> {
        // Step 1: Validate and create the data directory
        config.validate()?;
        fs::create_dir_all(&config.dir_path)?;
        let dir = config.dir_path.as_path();

        // Step 2: Discover segment files and open one file set per type
        let main = storage::discover(dir)?;
        let merged = storage::discover(&dir.join(MERGE_DIR))?;
        let files = |data_type| {
            FileSet::open(dir, data_type, config.rw_method, config.block_size, &main, &merged)
        };

        let sync = config.sync;
        let mut strs = Store::new(
            StrIndex::new(config.idx_mode, cache_capacity(&config)),
            files(DataType::String)?,
            sync,
        );
        let mut lists = Store::new(ListIndex::new(), files(DataType::List)?, sync);
        let mut hashes = Store::new(HashIndex::new(), files(DataType::Hash)?, sync);
        let mut sets = Store::new(SetIndex::new(), files(DataType::Set)?, sync);
        let mut zsets = Store::new(ZSetIndex::new(), files(DataType::ZSet)?, sync);

        // Step 3: Replay, one thread per data type
        let replayed = crossbeam::thread::scope(|s| {
            let handles = [
                s.spawn(|_| strs.replay()),
                s.spawn(|_| lists.replay()),
                s.spawn(|_| hashes.replay()),
                s.spawn(|_| sets.replay()),
                s.spawn(|_| zsets.replay()),
            ];
            handles.map(|h| h.join())
        })
        .unwrap_or_else(|payload| panic::resume_unwind(payload));

        let mut entries = 0;
        for outcome in replayed {
            entries += outcome.unwrap_or_else(|payload| panic::resume_unwind(payload))?;
        }

        info!(
            dir = %dir.display(),
            entries,
            strings = strs.index.key_count(),
            lists = lists.index.key_count(),
            hashes = hashes.index.key_count(),
            sets = sets.index.key_count(),
            zsets = zsets.index.key_count(),
            "engine opened"
        );

        // Step 4: Assemble and start the merge ticker
        let (stop_tx, stop_rx) = bounded(DataType::COUNT);
        let engine = Arc::new(Self {
            config,
            strs: RwLock::new(strs),
            lists: RwLock::new(lists),
            hashes: RwLock::new(hashes),
            sets: RwLock::new(sets),
            zsets: RwLock::new(zsets),
            gate: RwLock::new(()),
            closed: AtomicBool::new(false),
            closing: AtomicBool::new(false),
            merging: AtomicBool::new(false),
            stop_tx,
            stop_rx,
            ticker: Mutex::new(None),
        });
        *engine.ticker.lock() = Some(merge::spawn_ticker(&engine)?);
        Ok(engine)
    }

    /// Open with default config at the given path
    pub fn open_path(path: impl Into<PathBuf>) -> Result<Arc<Self>> {
        let config = Config::builder().dir_path(path).build();
        Self::open(config)
    }

    /// Stop the merge ticker, persist the config and sync every segment
    ///
    /// Every call afterwards fails with `DbClosed`.
    pub fn close(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RoseError::DbClosed);
        }
        self.closing.store(true, Ordering::Release);
        self.stop_merge();
        self.stop_ticker();

        let _gate = self.enter_exclusive()?;
        self.closed.store(true, Ordering::Release);
        self.config.save()?;
        self.for_each_files(|files| files.sync_all())?;

        info!(dir = %self.config.dir_path.display(), "engine closed");
        Ok(())
    }

    /// Flush every active segment to disk
    pub fn sync(&self) -> Result<()> {
        let _gate = self.enter()?;
        self.for_each_files(|files| files.sync_active())
    }

    /// Copy the whole data directory to `to`
    ///
    /// All operations are held off while the copy runs, so the backup is a
    /// consistent snapshot.
    pub fn backup(&self, to: &Path) -> Result<()> {
        if to.starts_with(&self.config.dir_path) {
            return Err(RoseError::Config(format!(
                "backup target {} is inside the data directory",
                to.display()
            )));
        }
        let _gate = self.enter_exclusive()?;
        self.for_each_files(|files| files.sync_all())?;
        self.config.save()?;
        copy_dir(&self.config.dir_path, to)?;
        info!(from = %self.config.dir_path.display(), to = %to.display(), "backup written");
        Ok(())
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dir_path(&self) -> &Path {
        &self.config.dir_path
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn is_merging(&self) -> bool {
        self.merging.load(Ordering::Acquire)
    }

    /// Segment ids, active size and key count of one data type
    pub fn segment_stats(&self, data_type: DataType) -> Result<SegmentStats> {
        let _gate = self.enter()?;
        let stats = |files: &FileSet, keys: usize| SegmentStats {
            data_type,
            active_id: files.active().id(),
            active_size: files.active().offset(),
            archived_ids: files.archived().keys().copied().collect(),
            keys,
        };
        Ok(match data_type {
            DataType::String => {
                let s = self.strs.read();
                stats(&s.files, s.index.key_count())
            }
            DataType::List => {
                let s = self.lists.read();
                stats(&s.files, s.index.key_count())
            }
            DataType::Hash => {
                let s = self.hashes.read();
                stats(&s.files, s.index.key_count())
            }
            DataType::Set => {
                let s = self.sets.read();
                stats(&s.files, s.index.key_count())
            }
            DataType::ZSet => {
                let s = self.zsets.read();
                stats(&s.files, s.index.key_count())
            }
        })
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    /// Shared gate for an ordinary operation
    fn enter(&self) -> Result<RwLockReadGuard<'_, ()>> {
        let gate = self.gate.read();
        if self.closed.load(Ordering::Acquire) {
            return Err(RoseError::DbClosed);
        }
        Ok(gate)
    }

    fn enter_exclusive(&self) -> Result<RwLockWriteGuard<'_, ()>> {
        let gate = self.gate.write();
        if self.closed.load(Ordering::Acquire) {
            return Err(RoseError::DbClosed);
        }
        Ok(gate)
    }

    fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(RoseError::EmptyKey);
        }
        if key.len() > self.config.max_key_size as usize {
            return Err(RoseError::KeyTooLarge);
        }
        Ok(())
    }

    fn check_value(&self, value: &[u8]) -> Result<()> {
        if value.len() > self.config.max_value_size as usize {
            return Err(RoseError::ValueTooLarge);
        }
        Ok(())
    }

    /// Hash fields are bounded like keys
    fn check_field(&self, field: &[u8]) -> Result<()> {
        if field.len() > self.config.max_key_size as usize {
            return Err(RoseError::KeyTooLarge);
        }
        Ok(())
    }

    fn check_kv(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_key(key)?;
        self.check_value(value)
    }

    /// Run a lookup against `keys`
    ///
    /// Under a read lock when none of the keys has expired. Otherwise the
    /// expired keys are cleared under the write lock first and `f` is told
    /// so through its flag.
    fn view<I: TypeIndex, T>(
        &self,
        store: &RwLock<Store<I>>,
        keys: &[&[u8]],
        f: impl FnOnce(&Store<I>, bool) -> Result<T>,
    ) -> Result<T> {
        let now = store::now_secs();
        {
            let s = store.read();
            if !keys.iter().any(|key| s.is_expired(key, now)) {
                return f(&s, false);
            }
        }

        let mut s = store.write();
        let mut cleared = false;
        for key in keys {
            cleared |= s.clear_if_expired(key)?;
        }
        f(&s, cleared)
    }

    /// Run a mutation under the write lock, clearing expired `keys` first
    fn mutate<I: TypeIndex, T>(
        &self,
        store: &RwLock<Store<I>>,
        keys: &[&[u8]],
        f: impl FnOnce(&mut Store<I>) -> Result<T>,
    ) -> Result<T> {
        let mut s = store.write();
        for key in keys {
            s.clear_if_expired(key)?;
        }
        f(&mut s)
    }

    fn for_each_files(&self, f: impl Fn(&FileSet) -> Result<()>) -> Result<()> {
        f(&self.strs.read().files)?;
        f(&self.lists.read().files)?;
        f(&self.hashes.read().files)?;
        f(&self.sets.read().files)?;
        f(&self.zsets.read().files)
    }
}

/// The value cache only makes sense when values are not in memory
fn cache_capacity(config: &Config) -> usize {
    match config.idx_mode {
        IndexMode::KeyOnlyMem => config.cache_capacity,
        IndexMode::KeyValueMem => 0,
    }
}

fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}
