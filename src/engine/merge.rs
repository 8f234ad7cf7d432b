//! Merge (Compaction)
//!
//! Rewrites archived segments so only entries that still shape the current
//! state survive. Runs under the exclusive gate, one thread per data type
//! that has at least `merge_threshold` archived segments.
//!
//! ## Per data type
//! ```text
//! archived (data dir)     000000003  000000004  000000005   ← inputs, ascending
//! archived (merge dir)    000000000  000000001              ← copies of earlier inputs
//!
//! for each input:
//!   1. take it out of the archived map, keep entries TypeIndex::is_live accepts
//!      (no live entries: delete the input and move on)
//!   2. write the kept entries to rosedb_merge/{name}.tmp under the same id, sync
//!   3. move string locators to the copy, delete the input
//!   4. rename the copy to its final name
//! ```
//!
//! At open, a `.tmp` copy whose input still exists is dropped and one whose
//! input is gone is promoted, so a crash never replays an entry twice.
//!
//! When every eligible type finished, all merge-dir segments are renamed
//! into the data directory and the merge directory is removed. A type that
//! was stopped keeps its copies in the merge directory; they are picked up
//! again on the next pass or at open.

use std::fs;
use std::panic;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{bounded, select, tick, Receiver, Sender};
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::{Result, RoseError};
use crate::storage::{
    segment_path, segment_tmp_path, DataType, Entry, Locator, Segment, MERGE_DIR,
};

use super::store::{Store, TypeIndex};
use super::Engine;

/// Clears the merging flag on every exit path
struct MergeFlag<'a>(&'a AtomicBool);

impl Drop for MergeFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Engine {
    /// Run one merge pass
    ///
    /// Fails with `AlreadyMerging` while another pass runs and with
    /// `ThresholdNotReached` when no data type has enough archived
    /// segments and no earlier pass left copies to promote. Errors inside
    /// one data type are logged and leave that type's segments as they
    /// were; the other types still merge.
    pub fn start_merge(&self) -> Result<()> {
        if self
            .merging
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RoseError::AlreadyMerging);
        }
        let _flag = MergeFlag(&self.merging);

        // Signals sent while no merge was running are stale
        while self.stop_rx.try_recv().is_ok() {}

        let _gate = self.enter_exclusive()?;
        if self.closing.load(Ordering::Acquire) {
            return Err(RoseError::DbClosed);
        }

        let merge_dir = self.config.dir_path.join(MERGE_DIR);
        let threshold = self.config.merge_threshold;
        let eligible: Vec<DataType> = DataType::ALL
            .into_iter()
            .filter(|&data_type| self.archived_count(data_type) >= threshold)
            .collect();
        if eligible.is_empty() {
            if !merge_dir.exists() {
                return Err(RoseError::ThresholdNotReached);
            }
            // Copies left by a stopped pass still need promoting
            self.finish_merge(&merge_dir)?;
            info!("merge output of an earlier pass promoted");
            return Ok(());
        }

        fs::create_dir_all(&merge_dir)?;
        info!(types = ?eligible, "merge started");

        let outcomes = crossbeam::thread::scope(|s| {
            let handles: Vec<_> = eligible
                .iter()
                .map(|&data_type| (data_type, s.spawn(move |_| self.merge_type(data_type))))
                .collect();
            handles
                .into_iter()
                .map(|(data_type, handle)| (data_type, handle.join()))
                .collect::<Vec<_>>()
        })
        .unwrap_or_else(|payload| panic::resume_unwind(payload));

        let mut complete = true;
        for (data_type, outcome) in outcomes {
            match outcome.unwrap_or_else(|payload| panic::resume_unwind(payload)) {
                Ok(true) => {}
                Ok(false) => complete = false,
                Err(e) => {
                    error!(%data_type, error = %e, "merge failed");
                    complete = false;
                }
            }
        }

        if complete {
            self.finish_merge(&merge_dir)?;
        }
        info!(complete, "merge finished");
        Ok(())
    }

    /// Ask a running merge to stop at the next segment boundary
    pub fn stop_merge(&self) {
        for _ in 0..DataType::COUNT {
            if self.stop_tx.try_send(()).is_err() {
                break;
            }
        }
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn archived_count(&self, data_type: DataType) -> usize {
        match data_type {
            DataType::String => self.strs.read().files.archived().len(),
            DataType::List => self.lists.read().files.archived().len(),
            DataType::Hash => self.hashes.read().files.archived().len(),
            DataType::Set => self.sets.read().files.archived().len(),
            DataType::ZSet => self.zsets.read().files.archived().len(),
        }
    }

    fn merge_type(&self, data_type: DataType) -> Result<bool> {
        match data_type {
            DataType::String => self.merge_store(&self.strs),
            DataType::List => self.merge_store(&self.lists),
            DataType::Hash => self.merge_store(&self.hashes),
            DataType::Set => self.merge_store(&self.sets),
            DataType::ZSet => self.merge_store(&self.zsets),
        }
    }

    /// Merge every pending archived segment of one type
    ///
    /// Returns false when the type stopped early (stop signal or close);
    /// its remaining inputs are untouched.
    fn merge_store<I: TypeIndex>(&self, store: &RwLock<Store<I>>) -> Result<bool> {
        let mut s = store.write();
        let merge_dir = self.config.dir_path.join(MERGE_DIR);

        let pending: Vec<u32> = s
            .files
            .archived()
            .values()
            .filter(|segment| !in_dir(segment, &merge_dir))
            .map(|segment| segment.id())
            .collect();

        for id in pending {
            if self.closing.load(Ordering::Acquire) || self.stop_rx.try_recv().is_ok() {
                warn!(data_type = %I::DATA_TYPE, next = id, "merge stopped");
                return Ok(false);
            }
            rewrite(&mut s, id, &merge_dir)?;
        }
        Ok(true)
    }

    /// Move every merge-dir segment of every type into the data directory
    fn finish_merge(&self, merge_dir: &Path) -> Result<()> {
        let dir = self.config.dir_path.as_path();
        let moved = promote(&self.strs, dir, merge_dir)?
            + promote(&self.lists, dir, merge_dir)?
            + promote(&self.hashes, dir, merge_dir)?
            + promote(&self.sets, dir, merge_dir)?
            + promote(&self.zsets, dir, merge_dir)?;
        if let Err(e) = fs::remove_dir(merge_dir) {
            warn!(error = %e, "merge directory not removed");
        }
        debug!(moved, "merge output promoted");
        Ok(())
    }

    /// Wait for the background ticker to exit
    pub(super) fn stop_ticker(&self) {
        let Some(ticker) = self.ticker.lock().take() else {
            return;
        };
        drop(ticker.shutdown);
        if ticker.handle.join().is_err() {
            warn!("merge ticker panicked");
        }
    }

    /// One tick of the background merge
    fn scheduled_merge(&self) {
        match self.start_merge() {
            Ok(()) => {}
            Err(RoseError::ThresholdNotReached) | Err(RoseError::AlreadyMerging) => {
                debug!("scheduled merge skipped")
            }
            Err(RoseError::DbClosed) => {}
            Err(e) => error!(error = %e, "scheduled merge failed"),
        }
    }
}

// =============================================================================
// Segment Rewrite
// =============================================================================

/// Rewrite archived segment `id` into the merge directory
///
/// The copy keeps the input's id. It is written as `{name}.tmp` and only
/// takes its final name once the input is deleted, so after a crash at any
/// point exactly one of the two is replayed at open.
fn rewrite<I: TypeIndex>(s: &mut Store<I>, id: u32, merge_dir: &Path) -> Result<()> {
    let data_type = I::DATA_TYPE;
    let Some(input) = s.files.archived_mut().remove(&id) else {
        return Ok(());
    };

    // Step 1: Keep only live entries
    let scanned: Result<Vec<(u64, Entry)>> = input.iter().collect();
    let scanned = match scanned {
        Ok(entries) => entries,
        Err(e) => {
            s.files.archived_mut().insert(id, input);
            return Err(e);
        }
    };
    let total = scanned.len();
    let live: Vec<(u64, Entry)> = scanned
        .into_iter()
        .filter(|(offset, entry)| {
            s.index.is_live(entry, Locator { file_id: id, offset: *offset }, &s.expires)
        })
        .collect();

    if live.is_empty() {
        input.delete()?;
        debug!(%data_type, input = id, dropped = total, "segment merged away");
        return Ok(());
    }

    // Step 2: Write and sync the copy
    let (output, moves) = match write_output(s, id, &live, merge_dir) {
        Ok(written) => written,
        Err(e) => {
            s.files.archived_mut().insert(id, input);
            return Err(e);
        }
    };

    // Step 3: Swap in the copy, drop the input, then give the copy its
    // final name
    let mut output = output;
    for (key, from, to) in moves {
        s.index.relocate(&key, from, to);
    }
    let deleted = input.delete();
    let renamed = deleted.and_then(|_| output.rename(segment_path(merge_dir, id, data_type)));
    s.files.archived_mut().insert(id, output);
    renamed?;

    debug!(%data_type, input = id, kept = live.len(), dropped = total - live.len(), "segment merged");
    Ok(())
}

/// Append `live` entries to a temp copy of segment `id`
///
/// Returns the synced copy and the locator moves to apply once the input
/// is gone.
fn write_output<I: TypeIndex>(
    s: &Store<I>,
    id: u32,
    live: &[(u64, Entry)],
    merge_dir: &Path,
) -> Result<(Segment, Vec<(Vec<u8>, Locator, Locator)>)> {
    let data_type = I::DATA_TYPE;
    let path = segment_tmp_path(merge_dir, id, data_type);
    if path.exists() {
        fs::remove_file(&path)?;
    }
    let output = Segment::open_at(path, id, data_type, s.files.method(), s.files.block_size())?;

    let written: Result<Vec<(Vec<u8>, Locator, Locator)>> = live
        .iter()
        .map(|(offset, entry)| {
            let written_at = output.write(entry)?;
            Ok((
                entry.key.clone(),
                Locator { file_id: id, offset: *offset },
                Locator { file_id: id, offset: written_at },
            ))
        })
        .collect();
    match written.and_then(|moves| output.sync().map(|_| moves)) {
        Ok(moves) => Ok((output, moves)),
        Err(e) => {
            if let Err(cleanup) = output.delete() {
                warn!(%data_type, id, error = %cleanup, "merge temp file not removed");
            }
            Err(e)
        }
    }
}

/// Rename one type's merge-dir segments into `dir`
fn promote<I: TypeIndex>(store: &RwLock<Store<I>>, dir: &Path, merge_dir: &Path) -> Result<usize> {
    let mut s = store.write();
    let mut moved = 0;
    for segment in s.files.archived_mut().values_mut() {
        if !in_dir(segment, merge_dir) {
            continue;
        }
        let to = segment_path(dir, segment.id(), I::DATA_TYPE);
        if to.exists() {
            return Err(RoseError::MergeConflict { data_type: I::DATA_TYPE, id: segment.id() });
        }
        segment.rename(to)?;
        moved += 1;
    }
    Ok(moved)
}

fn in_dir(segment: &Segment, dir: &Path) -> bool {
    segment.path().parent() == Some(dir)
}

// =============================================================================
// Background Ticker
// =============================================================================

/// Handle to the periodic merge thread
pub(super) struct MergeTicker {
    /// Dropping this ends the thread
    pub(super) shutdown: Sender<()>,
    pub(super) handle: JoinHandle<()>,
}

/// Start the periodic merge thread
///
/// The thread holds a weak reference and exits when the engine is gone or
/// the shutdown sender is dropped.
pub(super) fn spawn_ticker(engine: &Arc<Engine>) -> Result<MergeTicker> {
    let weak: Weak<Engine> = Arc::downgrade(engine);
    let interval: Duration = engine.config.merge_check_interval;
    let (shutdown, stopped): (Sender<()>, Receiver<()>) = bounded(0);

    let handle = thread::Builder::new()
        .name("rosekv-merge".to_string())
        .spawn(move || {
            let ticks = tick(interval);
            loop {
                select! {
                    recv(ticks) -> _ => {
                        let Some(engine) = weak.upgrade() else { break };
                        engine.scheduled_merge();
                    }
                    recv(stopped) -> _ => break,
                }
            }
            debug!("merge ticker exited");
        })?;

    Ok(MergeTicker { shutdown, handle })
}
