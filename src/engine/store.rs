//! Per-type Store
//!
//! A [`Store`] bundles everything one data type owns: its in-memory index,
//! its expiry ledger and its segment files. The engine keeps one per type,
//! each behind its own `RwLock`.
//!
//! Every mutation goes through [`Store::commit`]: append the entry to the
//! active segment, then apply that same entry to the index. Replay at open
//! calls the identical `apply`, so the state rebuilt from the log always
//! matches the state that was live when the log was written.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Result, RoseError};
use crate::storage::{DataType, Entry, FileSet, Locator};

/// Expiry ledger: key → absolute deadline in unix seconds
pub(crate) type Expires = HashMap<Vec<u8>, i64>;

/// The per-type behaviour the engine, replay and merge rely on
pub(crate) trait TypeIndex: Send + Sync {
    const DATA_TYPE: DataType;

    /// Mark written when an expired key is cleared on access
    const CLEAR_MARK: u16;

    fn contains_key(&self, key: &[u8]) -> bool;

    /// Number of live keys
    fn key_count(&self) -> usize;

    /// Apply one log entry, live or during replay
    fn apply(&mut self, entry: &Entry, loc: Locator, expires: &mut Expires) -> Result<()>;

    /// Whether a logged entry still contributes to the current state and
    /// must survive a merge
    fn is_live(&self, entry: &Entry, loc: Locator, expires: &Expires) -> bool;

    /// Point index entries at a rewritten copy of an entry
    fn relocate(&mut self, _key: &[u8], _from: Locator, _to: Locator) {}
}

/// Index + expiry ledger + segments of one data type
pub(crate) struct Store<I> {
    pub(crate) index: I,
    pub(crate) expires: Expires,
    pub(crate) files: FileSet,
    sync: bool,
}

impl<I: TypeIndex> Store<I> {
    pub fn new(index: I, files: FileSet, sync: bool) -> Self {
        Self { index, expires: HashMap::new(), files, sync }
    }

    /// Rebuild the index from every segment, oldest first
    ///
    /// Any unreadable entry aborts the replay.
    pub fn replay(&mut self) -> Result<usize> {
        let mut applied = 0;
        for segment in self.files.segments() {
            let file_id = segment.id();
            for item in segment.iter() {
                let (offset, entry) = item?;
                self.index.apply(&entry, Locator { file_id, offset }, &mut self.expires)?;
                if !self.index.contains_key(&entry.key) {
                    self.expires.remove(&entry.key);
                }
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Write-log-then-apply
    pub fn commit(&mut self, entry: Entry) -> Result<Locator> {
        let loc = self.files.append(&entry, self.sync)?;
        self.index.apply(&entry, loc, &mut self.expires)?;
        self.settle(&entry.key);
        Ok(loc)
    }

    pub fn is_expired(&self, key: &[u8], now: i64) -> bool {
        self.expires.get(key).map_or(false, |&deadline| now > deadline)
    }

    /// Clear `key` if its deadline has passed, logging the removal
    ///
    /// Returns true when the key was cleared.
    pub fn clear_if_expired(&mut self, key: &[u8]) -> Result<bool> {
        if !self.is_expired(key, now_secs()) {
            return Ok(false);
        }
        self.commit(Entry::no_extra(key, Vec::new(), I::DATA_TYPE, I::CLEAR_MARK))?;
        self.expires.remove(key);
        Ok(true)
    }

    /// Seconds left before `key` expires, 0 without a deadline
    pub fn ttl(&self, key: &[u8]) -> i64 {
        self.expires
            .get(key)
            .map_or(0, |&deadline| (deadline - now_secs()).max(0))
    }

    /// A key that no longer exists carries no deadline
    fn settle(&mut self, key: &[u8]) {
        if !self.index.contains_key(key) {
            self.expires.remove(key);
        }
    }
}

/// Whether an expire entry carries the deadline currently in force
pub(crate) fn deadline_in_force(entry: &Entry, expires: &Expires) -> bool {
    expires.get(entry.key.as_slice()) == Some(&entry.deadline())
}

/// Deadline `ttl` seconds from now; the ttl must be positive
pub(crate) fn deadline_after(ttl: i64) -> i64 {
    now_secs().saturating_add(ttl)
}

pub(crate) fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

// =============================================================================
// Extra Payload Helpers
// =============================================================================

/// Joins the two halves of a composite `extra` field
pub(crate) const SEPARATOR: &[u8] = b"\\0";

pub(crate) fn join_extra(left: &[u8], right: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(left.len() + SEPARATOR.len() + right.len());
    out.extend_from_slice(left);
    out.extend_from_slice(SEPARATOR);
    out.extend_from_slice(right);
    out
}

/// Split at the last separator
pub(crate) fn split_extra(extra: &[u8]) -> Result<(&[u8], &[u8])> {
    let at = extra
        .windows(SEPARATOR.len())
        .rposition(|w| w == SEPARATOR)
        .ok_or_else(|| RoseError::InvalidEntry("extra is missing its separator".to_string()))?;
    Ok((&extra[..at], &extra[at + SEPARATOR.len()..]))
}

pub(crate) fn contains_separator(bytes: &[u8]) -> bool {
    bytes.windows(SEPARATOR.len()).any(|w| w == SEPARATOR)
}

/// Parse a decimal number written into an entry
pub(crate) fn parse_num<T: FromStr>(bytes: &[u8]) -> Result<T> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            RoseError::InvalidEntry(format!("not a number: {:?}", String::from_utf8_lossy(bytes)))
        })
}
