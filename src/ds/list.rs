//! List Index
//!
//! One double-ended queue per key. Indices follow the usual convention:
//! `0` is the head, `-1` the tail.

use std::collections::{HashMap, VecDeque};

/// Where `linsert` places the new value relative to the pivot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOption {
    Before = 0,
    After = 1,
}

impl InsertOption {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(InsertOption::Before),
            1 => Some(InsertOption::After),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct ListIndex {
    records: HashMap<Vec<u8>, VecDeque<Vec<u8>>>,
}

impl ListIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push to the head, returning the new length
    pub fn lpush(&mut self, key: &[u8], value: Vec<u8>) -> usize {
        let list = self.records.entry(key.to_vec()).or_default();
        list.push_front(value);
        list.len()
    }

    /// Push to the tail, returning the new length
    pub fn rpush(&mut self, key: &[u8], value: Vec<u8>) -> usize {
        let list = self.records.entry(key.to_vec()).or_default();
        list.push_back(value);
        list.len()
    }

    pub fn lpop(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        let popped = self.records.get_mut(key)?.pop_front();
        self.drop_if_empty(key);
        popped
    }

    pub fn rpop(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        let popped = self.records.get_mut(key)?.pop_back();
        self.drop_if_empty(key);
        popped
    }

    pub fn lindex(&self, key: &[u8], index: i64) -> Option<&[u8]> {
        let list = self.records.get(key)?;
        let at = resolve_index(index, list.len())?;
        list.get(at).map(Vec::as_slice)
    }

    /// Remove elements equal to `value`
    ///
    /// `count > 0` removes up to `count` matches scanning from the head,
    /// `count < 0` up to `|count|` from the tail, `count == 0` every match.
    /// Returns the number removed.
    pub fn lrem(&mut self, key: &[u8], value: &[u8], count: i64) -> usize {
        let Some(list) = self.records.get_mut(key) else {
            return 0;
        };

        let limit = if count == 0 { usize::MAX } else { count.unsigned_abs() as usize };
        let mut removed = 0;
        if count >= 0 {
            let mut i = 0;
            while i < list.len() && removed < limit {
                if list[i] == value {
                    list.remove(i);
                    removed += 1;
                } else {
                    i += 1;
                }
            }
        } else {
            let mut i = list.len();
            while i > 0 && removed < limit {
                i -= 1;
                if list[i] == value {
                    list.remove(i);
                    removed += 1;
                }
            }
        }

        self.drop_if_empty(key);
        removed
    }

    /// Insert `value` next to the first element equal to `pivot`
    ///
    /// Returns the new length, or `None` when the key or pivot is missing.
    pub fn linsert(
        &mut self,
        key: &[u8],
        option: InsertOption,
        pivot: &[u8],
        value: Vec<u8>,
    ) -> Option<usize> {
        let list = self.records.get_mut(key)?;
        let at = list.iter().position(|v| v == pivot)?;
        match option {
            InsertOption::Before => list.insert(at, value),
            InsertOption::After => list.insert(at + 1, value),
        }
        Some(list.len())
    }

    /// Overwrite the element at `index`; false when out of range
    pub fn lset(&mut self, key: &[u8], index: i64, value: Vec<u8>) -> bool {
        let Some(list) = self.records.get_mut(key) else {
            return false;
        };
        match resolve_index(index, list.len()) {
            Some(at) => {
                list[at] = value;
                true
            }
            None => false,
        }
    }

    /// Keep only `[start, end]` (inclusive). An empty range drops the key.
    /// Returns false when the key does not exist.
    pub fn ltrim(&mut self, key: &[u8], start: i64, end: i64) -> bool {
        let Some(list) = self.records.get_mut(key) else {
            return false;
        };
        match resolve_range(start, end, list.len()) {
            Some((from, to)) => {
                list.truncate(to + 1);
                list.drain(..from);
            }
            None => list.clear(),
        }
        self.drop_if_empty(key);
        true
    }

    /// Elements in `[start, end]` (inclusive)
    pub fn lrange(&self, key: &[u8], start: i64, end: i64) -> Vec<Vec<u8>> {
        let Some(list) = self.records.get(key) else {
            return Vec::new();
        };
        match resolve_range(start, end, list.len()) {
            Some((from, to)) => list.range(from..=to).cloned().collect(),
            None => Vec::new(),
        }
    }

    pub fn llen(&self, key: &[u8]) -> usize {
        self.records.get(key).map_or(0, VecDeque::len)
    }

    pub fn key_exists(&self, key: &[u8]) -> bool {
        self.records.contains_key(key)
    }

    pub fn val_exists(&self, key: &[u8], value: &[u8]) -> bool {
        self.records.get(key).map_or(false, |list| list.iter().any(|v| v == value))
    }

    /// Drop the whole list; false when it did not exist
    pub fn clear(&mut self, key: &[u8]) -> bool {
        self.records.remove(key).is_some()
    }

    /// Number of list keys
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn drop_if_empty(&mut self, key: &[u8]) {
        if self.records.get(key).map_or(false, VecDeque::is_empty) {
            self.records.remove(key);
        }
    }
}

/// Map a possibly negative index onto `0..len`
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let at = if index < 0 { index + len } else { index };
    (0..len).contains(&at).then_some(at as usize)
}

/// Clamp an inclusive, possibly negative range onto `0..len`
pub(crate) fn resolve_range(start: i64, end: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    let mut start = if start < 0 { start + len } else { start };
    let mut end = if end < 0 { end + len } else { end };
    if start < 0 {
        start = 0;
    }
    if end >= len {
        end = len - 1;
    }
    if start > end || start >= len {
        return None;
    }
    Some((start as usize, end as usize))
}
