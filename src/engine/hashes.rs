//! Hash Operations
//!
//! `HSet` and `HDel` entries carry the field in `extra` and the value in
//! `value`.

use crate::ds::HashIndex;
use crate::error::{Result, RoseError};
use crate::storage::mark::HashMark;
use crate::storage::{DataType, Entry, Locator};

use super::store::{deadline_after, deadline_in_force, Expires, Store, TypeIndex};
use super::Engine;

impl TypeIndex for HashIndex {
    const DATA_TYPE: DataType = DataType::Hash;
    const CLEAR_MARK: u16 = HashMark::HClear as u16;

    fn contains_key(&self, key: &[u8]) -> bool {
        self.hkey_exists(key)
    }

    fn key_count(&self) -> usize {
        self.len()
    }

    fn apply(&mut self, entry: &Entry, _loc: Locator, expires: &mut Expires) -> Result<()> {
        let key = entry.key.as_slice();
        match HashMark::from_u16(entry.get_mark()) {
            Some(HashMark::HSet) => {
                self.hset(key, &entry.extra, entry.value.clone());
            }
            Some(HashMark::HDel) => {
                self.hdel(key, &entry.extra);
            }
            Some(HashMark::HClear) => {
                self.clear(key);
                expires.remove(key);
            }
            Some(HashMark::HExpire) => {
                expires.insert(entry.key.clone(), entry.deadline());
            }
            None => {
                return Err(RoseError::InvalidEntry(format!("unknown hash mark {}", entry.get_mark())))
            }
        }
        Ok(())
    }

    fn is_live(&self, entry: &Entry, _loc: Locator, expires: &Expires) -> bool {
        match HashMark::from_u16(entry.get_mark()) {
            Some(HashMark::HSet) => self.hget(&entry.key, &entry.extra) == Some(entry.value.as_slice()),
            Some(HashMark::HExpire) => self.hkey_exists(&entry.key) && deadline_in_force(entry, expires),
            _ => false,
        }
    }
}

impl Engine {
    /// Set a field; returns 1 for a new field and 0 otherwise
    ///
    /// Writing the value a field already holds logs nothing.
    pub fn hset(&self, key: &[u8], field: &[u8], value: &[u8]) -> Result<usize> {
        let _gate = self.enter()?;
        self.check_kv(key, value)?;
        self.check_field(field)?;
        self.mutate(&self.hashes, &[key], |s| set_field(s, key, field, value))
    }

    /// Set a field only if it does not exist; true when written
    pub fn hsetnx(&self, key: &[u8], field: &[u8], value: &[u8]) -> Result<bool> {
        let _gate = self.enter()?;
        self.check_kv(key, value)?;
        self.check_field(field)?;
        self.mutate(&self.hashes, &[key], |s| {
            if s.index.hexists(key, field) {
                return Ok(false);
            }
            set_field(s, key, field, value)?;
            Ok(true)
        })
    }

    pub fn hget(&self, key: &[u8], field: &[u8]) -> Result<Option<Vec<u8>>> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.hashes, &[key], |s, _| Ok(s.index.hget(key, field).map(<[u8]>::to_vec)))
    }

    /// Every `(field, value)` pair
    pub fn hget_all(&self, key: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.hashes, &[key], |s, _| Ok(s.index.hget_all(key)))
    }

    /// Set several fields, logging only those whose value changes
    pub fn hmset(&self, key: &[u8], pairs: &[(&[u8], &[u8])]) -> Result<()> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        if pairs.is_empty() {
            return Err(RoseError::WrongNumberArgs);
        }
        for (field, value) in pairs {
            self.check_field(field)?;
            self.check_value(value)?;
        }
        self.mutate(&self.hashes, &[key], |s| {
            for (field, value) in pairs {
                set_field(s, key, field, value)?;
            }
            Ok(())
        })
    }

    pub fn hmget(&self, key: &[u8], fields: &[&[u8]]) -> Result<Vec<Option<Vec<u8>>>> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.hashes, &[key], |s, _| {
            Ok(fields
                .iter()
                .map(|field| s.index.hget(key, field).map(<[u8]>::to_vec))
                .collect())
        })
    }

    /// Delete fields, returning how many existed
    pub fn hdel(&self, key: &[u8], fields: &[&[u8]]) -> Result<usize> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        if fields.is_empty() {
            return Err(RoseError::WrongNumberArgs);
        }
        self.mutate(&self.hashes, &[key], |s| {
            let mut removed = 0;
            for field in fields {
                if !s.index.hexists(key, field) {
                    continue;
                }
                s.commit(Entry::new(key, Vec::new(), *field, DataType::Hash, HashMark::HDel))?;
                removed += 1;
            }
            Ok(removed)
        })
    }

    pub fn hlen(&self, key: &[u8]) -> Result<usize> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.hashes, &[key], |s, _| Ok(s.index.hlen(key)))
    }

    pub fn hkeys(&self, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.hashes, &[key], |s, _| Ok(s.index.hkeys(key)))
    }

    pub fn hvals(&self, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.hashes, &[key], |s, _| Ok(s.index.hvals(key)))
    }

    /// Drop every field of `key`
    pub fn hclear(&self, key: &[u8]) -> Result<()> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.mutate(&self.hashes, &[key], |s| {
            if !s.index.hkey_exists(key) {
                return Ok(());
            }
            s.commit(Entry::no_extra(key, Vec::new(), DataType::Hash, HashMark::HClear))
                .map(|_| ())
        })
    }

    pub fn hexists(&self, key: &[u8], field: &[u8]) -> Result<bool> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.hashes, &[key], |s, _| Ok(s.index.hexists(key, field)))
    }

    pub fn hkey_exists(&self, key: &[u8]) -> Result<bool> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.hashes, &[key], |s, _| Ok(s.index.hkey_exists(key)))
    }

    /// Expire the hash `ttl` seconds from now
    pub fn hexpire(&self, key: &[u8], ttl: i64) -> Result<()> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        if ttl <= 0 {
            return Err(RoseError::InvalidTtl);
        }
        self.mutate(&self.hashes, &[key], |s| {
            if !s.index.hkey_exists(key) {
                return Err(RoseError::KeyNotExist);
            }
            let deadline = deadline_after(ttl);
            s.commit(Entry::with_deadline(key, Vec::new(), deadline, DataType::Hash, HashMark::HExpire))
                .map(|_| ())
        })
    }

    pub fn httl(&self, key: &[u8]) -> Result<i64> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.hashes, &[key], |s, _| Ok(s.ttl(key)))
    }
}

fn set_field(s: &mut Store<HashIndex>, key: &[u8], field: &[u8], value: &[u8]) -> Result<usize> {
    let existed = match s.index.hget(key, field) {
        Some(current) if current == value => return Ok(0),
        Some(_) => true,
        None => false,
    };
    s.commit(Entry::new(key, value, field, DataType::Hash, HashMark::HSet))?;
    Ok(usize::from(!existed))
}
