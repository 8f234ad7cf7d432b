//! String Operations
//!
//! Strings are indexed by the skip list so prefix and range scans walk keys
//! in byte order. Each key records the locator of its latest entry; in
//! `KeyValueMem` mode the value is held next to it, in `KeyOnlyMem` mode it
//! is read back from the segment (through the LRU cache when enabled).
//!
//! ```text
//! Set      value = v                       index ← (loc, v), deadline cleared
//! Rem      value = ""                      key removed
//! Expire   value = v, timestamp = deadline index ← (loc, v), deadline set
//! Persist  value = v                       index ← (loc, v), deadline cleared
//! ```

use crate::config::IndexMode;
use crate::ds::SkipList;
use crate::error::{Result, RoseError};
use crate::storage::mark::StrMark;
use crate::storage::{DataType, Entry, FileSet, Locator};

use super::cache::ValueCache;
use super::store::{deadline_after, now_secs, Expires, Store, TypeIndex};
use super::Engine;

// =============================================================================
// Index
// =============================================================================

#[derive(Debug)]
struct StrValue {
    loc: Locator,
    value: Option<Vec<u8>>,
}

/// Ordered string index
pub(crate) struct StrIndex {
    list: SkipList<Vec<u8>, StrValue>,
    mode: IndexMode,
    cache: ValueCache,
}

impl StrIndex {
    pub fn new(mode: IndexMode, cache_capacity: usize) -> Self {
        Self { list: SkipList::new(), mode, cache: ValueCache::new(cache_capacity) }
    }

    fn put(&mut self, key: &[u8], loc: Locator, value: &[u8]) {
        let value = match self.mode {
            IndexMode::KeyValueMem => Some(value.to_vec()),
            IndexMode::KeyOnlyMem => {
                self.cache.invalidate(key);
                None
            }
        };
        self.list.insert(key.to_vec(), StrValue { loc, value });
    }

    fn purge(&mut self, key: &[u8]) {
        self.cache.invalidate(key);
        self.list.remove(&key.to_vec());
    }

    fn locator(&self, key: &[u8]) -> Option<Locator> {
        self.list.get(&key.to_vec()).map(|v| v.loc)
    }

    /// Current value of `key`, reading the segment in key-only mode
    fn value(&self, files: &FileSet, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.list.get(&key.to_vec()) {
            Some(slot) => self.resolve(files, key, slot).map(Some),
            None => Ok(None),
        }
    }

    fn resolve(&self, files: &FileSet, key: &[u8], slot: &StrValue) -> Result<Vec<u8>> {
        if let Some(value) = &slot.value {
            return Ok(value.clone());
        }
        if let Some(value) = self.cache.get(key) {
            return Ok(value);
        }
        let value = files.read(slot.loc)?.value;
        self.cache.put(key, &value);
        Ok(value)
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

impl TypeIndex for StrIndex {
    const DATA_TYPE: DataType = DataType::String;
    const CLEAR_MARK: u16 = StrMark::Rem as u16;

    fn contains_key(&self, key: &[u8]) -> bool {
        self.list.contains_key(&key.to_vec())
    }

    fn key_count(&self) -> usize {
        self.list.len()
    }

    fn apply(&mut self, entry: &Entry, loc: Locator, expires: &mut Expires) -> Result<()> {
        match StrMark::from_u16(entry.get_mark()) {
            Some(StrMark::Set) | Some(StrMark::Persist) => {
                self.put(&entry.key, loc, &entry.value);
                expires.remove(&entry.key);
            }
            Some(StrMark::Expire) => {
                self.put(&entry.key, loc, &entry.value);
                expires.insert(entry.key.clone(), entry.deadline());
            }
            Some(StrMark::Rem) => {
                self.purge(&entry.key);
                expires.remove(&entry.key);
            }
            None => {
                return Err(RoseError::InvalidEntry(format!(
                    "unknown string mark {}",
                    entry.get_mark()
                )))
            }
        }
        Ok(())
    }

    /// Only the entry the index points at is live; everything older for
    /// the same key has been superseded
    fn is_live(&self, entry: &Entry, loc: Locator, _expires: &Expires) -> bool {
        match StrMark::from_u16(entry.get_mark()) {
            Some(StrMark::Set) | Some(StrMark::Expire) | Some(StrMark::Persist) => {
                self.locator(&entry.key) == Some(loc)
            }
            _ => false,
        }
    }

    fn relocate(&mut self, key: &[u8], from: Locator, to: Locator) {
        if let Some(slot) = self.list.get_mut(&key.to_vec()) {
            if slot.loc == from {
                slot.loc = to;
            }
        }
    }
}

// =============================================================================
// Operations
// =============================================================================

impl Engine {
    /// Set `key` to `value`, clearing any deadline
    ///
    /// Writing the value a live key already holds is a no-op.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let _gate = self.enter()?;
        self.check_kv(key, value)?;
        self.mutate(&self.strs, &[key], |s| set_value(s, key, value))
    }

    /// Set `key` only if it does not exist; true when written
    pub fn set_nx(&self, key: &[u8], value: &[u8]) -> Result<bool> {
        let _gate = self.enter()?;
        self.check_kv(key, value)?;
        self.mutate(&self.strs, &[key], |s| {
            if s.index.contains_key(key) {
                return Ok(false);
            }
            s.commit(Entry::no_extra(key, value, DataType::String, StrMark::Set))?;
            Ok(true)
        })
    }

    /// Set `key` to `value` expiring `ttl` seconds from now
    pub fn set_ex(&self, key: &[u8], value: &[u8], ttl: i64) -> Result<()> {
        let _gate = self.enter()?;
        self.check_kv(key, value)?;
        if ttl <= 0 {
            return Err(RoseError::InvalidTtl);
        }
        self.mutate(&self.strs, &[key], |s| {
            let deadline = deadline_after(ttl);
            let entry =
                Entry::with_deadline(key, value, deadline, DataType::String, StrMark::Expire);
            s.commit(entry).map(|_| ())
        })
    }

    /// Value of `key`
    ///
    /// Returns `KeyExpired` on the access that finds the deadline passed
    /// (the key is removed at that point) and `KeyNotExist` afterwards.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.strs, &[key], |s, expired| {
            if expired {
                return Err(RoseError::KeyExpired);
            }
            s.index.value(&s.files, key)?.ok_or(RoseError::KeyNotExist)
        })
    }

    /// Set a new value, returning the old one
    pub fn get_set(&self, key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>> {
        let _gate = self.enter()?;
        self.check_kv(key, value)?;
        self.mutate(&self.strs, &[key], |s| {
            let old = s.index.value(&s.files, key)?;
            set_value(s, key, value)?;
            Ok(old)
        })
    }

    /// Append to the current value (an absent key starts empty)
    pub fn append(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let _gate = self.enter()?;
        self.check_kv(key, value)?;
        self.mutate(&self.strs, &[key], |s| {
            let mut joined = s.index.value(&s.files, key)?.unwrap_or_default();
            joined.extend_from_slice(value);
            if joined.len() > self.config.max_value_size as usize {
                return Err(RoseError::ValueTooLarge);
            }
            set_value(s, key, &joined)
        })
    }

    /// Set several keys under one lock
    pub fn mset(&self, pairs: &[(&[u8], &[u8])]) -> Result<()> {
        let _gate = self.enter()?;
        if pairs.is_empty() {
            return Err(RoseError::WrongNumberArgs);
        }
        for (key, value) in pairs {
            self.check_kv(key, value)?;
        }
        let keys: Vec<&[u8]> = pairs.iter().map(|(k, _)| *k).collect();
        self.mutate(&self.strs, &keys, |s| {
            for (key, value) in pairs {
                set_value(s, key, value)?;
            }
            Ok(())
        })
    }

    /// Values of several keys; `None` for missing or expired ones
    pub fn mget(&self, keys: &[&[u8]]) -> Result<Vec<Option<Vec<u8>>>> {
        let _gate = self.enter()?;
        if keys.is_empty() {
            return Err(RoseError::WrongNumberArgs);
        }
        for key in keys {
            self.check_key(key)?;
        }
        self.view(&self.strs, keys, |s, _| {
            keys.iter().map(|key| s.index.value(&s.files, key)).collect()
        })
    }

    /// Values of unexpired keys starting with `prefix`, in key order
    ///
    /// Skips the first `offset` matches, then collects up to `limit`
    /// (a negative limit means no bound, zero means nothing).
    pub fn prefix_scan(&self, prefix: &[u8], limit: i64, offset: usize) -> Result<Vec<Vec<u8>>> {
        let _gate = self.enter()?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        self.clear_expired_run(prefix, |key| key.starts_with(prefix))?;

        let s = self.strs.read();
        let now = now_secs();
        let start = s.index.list.lower_bound(&prefix.to_vec());
        s.index
            .list
            .iter_at(start, false)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| !s.is_expired(key, now))
            .skip(offset)
            .take(limit)
            .map(|(key, slot)| s.index.resolve(&s.files, key, slot))
            .collect()
    }

    /// Values of unexpired keys in `[start, end]`, in key order
    pub fn range_scan(&self, start: &[u8], end: &[u8]) -> Result<Vec<Vec<u8>>> {
        let _gate = self.enter()?;
        self.clear_expired_run(start, |key| key <= end)?;

        let s = self.strs.read();
        let now = now_secs();
        let first = s.index.list.lower_bound(&start.to_vec());
        s.index
            .list
            .iter_at(first, false)
            .take_while(|(key, _)| key.as_slice() <= end)
            .filter(|(key, _)| !s.is_expired(key, now))
            .map(|(key, slot)| s.index.resolve(&s.files, key, slot))
            .collect()
    }

    /// Clear the expired keys of the ordered run that starts at `first`
    /// and lasts while `within` holds
    fn clear_expired_run(&self, first: &[u8], within: impl Fn(&[u8]) -> bool) -> Result<()> {
        let expired: Vec<Vec<u8>> = {
            let s = self.strs.read();
            let now = now_secs();
            let start = s.index.list.lower_bound(&first.to_vec());
            s.index
                .list
                .iter_at(start, false)
                .take_while(|(key, _)| within(key.as_slice()))
                .filter(|(key, _)| s.is_expired(key, now))
                .map(|(key, _)| key.clone())
                .collect()
        };
        if expired.is_empty() {
            return Ok(());
        }

        let mut s = self.strs.write();
        for key in &expired {
            s.clear_if_expired(key)?;
        }
        Ok(())
    }

    /// Expire `key` `ttl` seconds from now
    pub fn expire(&self, key: &[u8], ttl: i64) -> Result<()> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        if ttl <= 0 {
            return Err(RoseError::InvalidTtl);
        }
        self.mutate(&self.strs, &[key], |s| {
            let value = s.index.value(&s.files, key)?.ok_or(RoseError::KeyNotExist)?;
            let deadline = deadline_after(ttl);
            let entry =
                Entry::with_deadline(key, value, deadline, DataType::String, StrMark::Expire);
            s.commit(entry).map(|_| ())
        })
    }

    /// Drop the deadline of `key`
    pub fn persist(&self, key: &[u8]) -> Result<()> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.mutate(&self.strs, &[key], |s| {
            let value = s.index.value(&s.files, key)?.ok_or(RoseError::KeyNotExist)?;
            s.commit(Entry::no_extra(key, value, DataType::String, StrMark::Persist))
                .map(|_| ())
        })
    }

    /// Seconds until `key` expires, 0 when it has no deadline
    pub fn ttl(&self, key: &[u8]) -> Result<i64> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.strs, &[key], |s, _| Ok(s.ttl(key)))
    }

    pub fn str_exists(&self, key: &[u8]) -> Result<bool> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.strs, &[key], |s, _| Ok(s.index.contains_key(key)))
    }

    /// Delete `key`; `KeyNotExist` when absent
    pub fn remove(&self, key: &[u8]) -> Result<()> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.mutate(&self.strs, &[key], |s| {
            if !s.index.contains_key(key) {
                return Err(RoseError::KeyNotExist);
            }
            s.commit(Entry::no_extra(key, Vec::new(), DataType::String, StrMark::Rem))
                .map(|_| ())
        })
    }

    /// Values currently held in the key-only LRU cache
    pub fn cached_values(&self) -> usize {
        self.strs.read().index.cached()
    }
}

/// Shared by set, get_set, append and mset
fn set_value(s: &mut Store<StrIndex>, key: &[u8], value: &[u8]) -> Result<()> {
    if s.index.value(&s.files, key)?.as_deref() == Some(value) {
        return Ok(());
    }
    s.commit(Entry::no_extra(key, value, DataType::String, StrMark::Set))
        .map(|_| ())
}
