//! List Operations

use crate::ds::{InsertOption, ListIndex};
use crate::error::{Result, RoseError};
use crate::storage::mark::ListMark;
use crate::storage::{DataType, Entry, Locator};

use super::store::{
    contains_separator, deadline_after, deadline_in_force, join_extra, parse_num, split_extra,
    Expires, TypeIndex,
};
use super::Engine;

impl TypeIndex for ListIndex {
    const DATA_TYPE: DataType = DataType::List;
    const CLEAR_MARK: u16 = ListMark::LClear as u16;

    fn contains_key(&self, key: &[u8]) -> bool {
        self.key_exists(key)
    }

    fn key_count(&self) -> usize {
        self.len()
    }

    fn apply(&mut self, entry: &Entry, _loc: Locator, expires: &mut Expires) -> Result<()> {
        let key = entry.key.as_slice();
        let mark = ListMark::from_u16(entry.get_mark())
            .ok_or_else(|| RoseError::InvalidEntry(format!("unknown list mark {}", entry.get_mark())))?;

        match mark {
            ListMark::LPush => {
                self.lpush(key, entry.value.clone());
            }
            ListMark::RPush => {
                self.rpush(key, entry.value.clone());
            }
            ListMark::LPop => {
                self.lpop(key);
            }
            ListMark::RPop => {
                self.rpop(key);
            }
            ListMark::LRem => {
                self.lrem(key, &entry.value, parse_num(&entry.extra)?);
            }
            ListMark::LInsert => {
                let (pivot, flag) = split_extra(&entry.extra)?;
                let option = InsertOption::from_u8(parse_num(flag)?)
                    .ok_or_else(|| RoseError::InvalidEntry("bad insert option".to_string()))?;
                self.linsert(key, option, pivot, entry.value.clone());
            }
            ListMark::LSet => {
                self.lset(key, parse_num(&entry.extra)?, entry.value.clone());
            }
            ListMark::LTrim => {
                let (start, end) = split_extra(&entry.extra)?;
                self.ltrim(key, parse_num(start)?, parse_num(end)?);
            }
            ListMark::LClear => {
                self.clear(key);
                expires.remove(key);
            }
            ListMark::LExpire => {
                expires.insert(entry.key.clone(), entry.deadline());
            }
        }
        Ok(())
    }

    /// A list's state depends on its whole history, so every entry of a
    /// list that still exists is kept (minus deadlines since replaced)
    fn is_live(&self, entry: &Entry, _loc: Locator, expires: &Expires) -> bool {
        if !self.key_exists(&entry.key) {
            return false;
        }
        match ListMark::from_u16(entry.get_mark()) {
            Some(ListMark::LExpire) => deadline_in_force(entry, expires),
            Some(_) => true,
            None => false,
        }
    }
}

impl Engine {
    /// Push values to the head, in order; returns the new length
    pub fn lpush(&self, key: &[u8], values: &[&[u8]]) -> Result<usize> {
        self.push(key, values, ListMark::LPush)
    }

    /// Push values to the tail, in order; returns the new length
    pub fn rpush(&self, key: &[u8], values: &[&[u8]]) -> Result<usize> {
        self.push(key, values, ListMark::RPush)
    }

    pub fn lpop(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.pop(key, 0, ListMark::LPop)
    }

    pub fn rpop(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.pop(key, -1, ListMark::RPop)
    }

    /// Element at `index` (negative counts from the tail)
    pub fn lindex(&self, key: &[u8], index: i64) -> Result<Option<Vec<u8>>> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.lists, &[key], |s, _| Ok(s.index.lindex(key, index).map(<[u8]>::to_vec)))
    }

    /// Remove elements equal to `value`; see [`ListIndex::lrem`] for `count`
    pub fn lrem(&self, key: &[u8], value: &[u8], count: i64) -> Result<usize> {
        let _gate = self.enter()?;
        self.check_kv(key, value)?;
        self.mutate(&self.lists, &[key], |s| {
            if !s.index.val_exists(key, value) {
                return Ok(0);
            }
            let before = s.index.llen(key);
            let entry = Entry::new(key, value, count.to_string(), DataType::List, ListMark::LRem);
            s.commit(entry)?;
            Ok(before - s.index.llen(key))
        })
    }

    /// Insert `value` before or after the first `pivot`
    ///
    /// Returns the new length, or `None` when the pivot is not in the list.
    pub fn linsert(
        &self,
        key: &[u8],
        option: InsertOption,
        pivot: &[u8],
        value: &[u8],
    ) -> Result<Option<usize>> {
        let _gate = self.enter()?;
        self.check_kv(key, value)?;
        self.check_value(pivot)?;
        if contains_separator(pivot) {
            return Err(RoseError::ExtraContainsSeparator);
        }
        self.mutate(&self.lists, &[key], |s| {
            if !s.index.val_exists(key, pivot) {
                return Ok(None);
            }
            let extra = join_extra(pivot, (option as u8).to_string().as_bytes());
            s.commit(Entry::new(key, value, extra, DataType::List, ListMark::LInsert))?;
            Ok(Some(s.index.llen(key)))
        })
    }

    /// Overwrite the element at `index`; false when out of range
    pub fn lset(&self, key: &[u8], index: i64, value: &[u8]) -> Result<bool> {
        let _gate = self.enter()?;
        self.check_kv(key, value)?;
        self.mutate(&self.lists, &[key], |s| {
            if !s.index.key_exists(key) {
                return Err(RoseError::KeyNotExist);
            }
            if s.index.lindex(key, index).is_none() {
                return Ok(false);
            }
            s.commit(Entry::new(key, value, index.to_string(), DataType::List, ListMark::LSet))?;
            Ok(true)
        })
    }

    /// Keep only elements in `[start, end]`
    pub fn ltrim(&self, key: &[u8], start: i64, end: i64) -> Result<()> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.mutate(&self.lists, &[key], |s| {
            if !s.index.key_exists(key) {
                return Ok(());
            }
            let extra = join_extra(start.to_string().as_bytes(), end.to_string().as_bytes());
            s.commit(Entry::new(key, Vec::new(), extra, DataType::List, ListMark::LTrim))
                .map(|_| ())
        })
    }

    /// Elements in `[start, end]`
    pub fn lrange(&self, key: &[u8], start: i64, end: i64) -> Result<Vec<Vec<u8>>> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.lists, &[key], |s, _| Ok(s.index.lrange(key, start, end)))
    }

    pub fn llen(&self, key: &[u8]) -> Result<usize> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.lists, &[key], |s, _| Ok(s.index.llen(key)))
    }

    pub fn lkey_exists(&self, key: &[u8]) -> Result<bool> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.lists, &[key], |s, _| Ok(s.index.key_exists(key)))
    }

    pub fn lval_exists(&self, key: &[u8], value: &[u8]) -> Result<bool> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.lists, &[key], |s, _| Ok(s.index.val_exists(key, value)))
    }

    /// Drop the whole list; `KeyNotExist` when absent
    pub fn lclear(&self, key: &[u8]) -> Result<()> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.mutate(&self.lists, &[key], |s| {
            if !s.index.key_exists(key) {
                return Err(RoseError::KeyNotExist);
            }
            s.commit(Entry::no_extra(key, Vec::new(), DataType::List, ListMark::LClear))
                .map(|_| ())
        })
    }

    /// Expire the list `ttl` seconds from now
    pub fn lexpire(&self, key: &[u8], ttl: i64) -> Result<()> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        if ttl <= 0 {
            return Err(RoseError::InvalidTtl);
        }
        self.mutate(&self.lists, &[key], |s| {
            if !s.index.key_exists(key) {
                return Err(RoseError::KeyNotExist);
            }
            let deadline = deadline_after(ttl);
            let entry =
                Entry::with_deadline(key, Vec::new(), deadline, DataType::List, ListMark::LExpire);
            s.commit(entry).map(|_| ())
        })
    }

    pub fn lttl(&self, key: &[u8]) -> Result<i64> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.lists, &[key], |s, _| Ok(s.ttl(key)))
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn push(&self, key: &[u8], values: &[&[u8]], mark: ListMark) -> Result<usize> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        if values.is_empty() {
            return Err(RoseError::WrongNumberArgs);
        }
        for value in values {
            self.check_value(value)?;
        }
        self.mutate(&self.lists, &[key], |s| {
            for value in values {
                s.commit(Entry::no_extra(key, *value, DataType::List, mark))?;
            }
            Ok(s.index.llen(key))
        })
    }

    fn pop(&self, key: &[u8], end: i64, mark: ListMark) -> Result<Option<Vec<u8>>> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.mutate(&self.lists, &[key], |s| {
            let Some(value) = s.index.lindex(key, end).map(<[u8]>::to_vec) else {
                return Ok(None);
            };
            s.commit(Entry::no_extra(key, value.clone(), DataType::List, mark))?;
            Ok(Some(value))
        })
    }
}
