//! Set Operations
//!
//! `SMove` entries are keyed by the source set, carry the member in
//! `value` and the destination key in `extra`.

use crate::ds::SetIndex;
use crate::error::{Result, RoseError};
use crate::storage::mark::SetMark;
use crate::storage::{DataType, Entry, Locator};

use super::store::{deadline_after, deadline_in_force, Expires, TypeIndex};
use super::Engine;

impl TypeIndex for SetIndex {
    const DATA_TYPE: DataType = DataType::Set;
    const CLEAR_MARK: u16 = SetMark::SClear as u16;

    fn contains_key(&self, key: &[u8]) -> bool {
        self.key_exists(key)
    }

    fn key_count(&self) -> usize {
        self.len()
    }

    fn apply(&mut self, entry: &Entry, _loc: Locator, expires: &mut Expires) -> Result<()> {
        let key = entry.key.as_slice();
        match SetMark::from_u16(entry.get_mark()) {
            Some(SetMark::SAdd) => {
                self.sadd(key, &entry.value);
            }
            Some(SetMark::SRem) => {
                self.srem(key, &entry.value);
            }
            Some(SetMark::SMove) => {
                self.srem(key, &entry.value);
                self.sadd(&entry.extra, &entry.value);
            }
            Some(SetMark::SClear) => {
                self.clear(key);
                expires.remove(key);
            }
            Some(SetMark::SExpire) => {
                expires.insert(entry.key.clone(), entry.deadline());
            }
            None => {
                return Err(RoseError::InvalidEntry(format!("unknown set mark {}", entry.get_mark())))
            }
        }
        Ok(())
    }

    fn is_live(&self, entry: &Entry, _loc: Locator, expires: &Expires) -> bool {
        match SetMark::from_u16(entry.get_mark()) {
            Some(SetMark::SAdd) => self.sis_member(&entry.key, &entry.value),
            Some(SetMark::SMove) => self.sis_member(&entry.extra, &entry.value),
            Some(SetMark::SExpire) => self.key_exists(&entry.key) && deadline_in_force(entry, expires),
            _ => false,
        }
    }
}

impl Engine {
    /// Add members, returning how many were new
    pub fn sadd(&self, key: &[u8], members: &[&[u8]]) -> Result<usize> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        if members.is_empty() {
            return Err(RoseError::WrongNumberArgs);
        }
        for member in members {
            self.check_value(member)?;
        }
        self.mutate(&self.sets, &[key], |s| {
            let mut added = 0;
            for member in members {
                if s.index.sis_member(key, member) {
                    continue;
                }
                s.commit(Entry::no_extra(key, *member, DataType::Set, SetMark::SAdd))?;
                added += 1;
            }
            Ok(added)
        })
    }

    /// Remove and return up to `count` random members
    pub fn spop(&self, key: &[u8], count: usize) -> Result<Vec<Vec<u8>>> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.mutate(&self.sets, &[key], |s| {
            let popped = s.index.sample(key, count);
            for member in &popped {
                s.commit(Entry::no_extra(key, member.clone(), DataType::Set, SetMark::SRem))?;
            }
            Ok(popped)
        })
    }

    pub fn sis_member(&self, key: &[u8], member: &[u8]) -> Result<bool> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.sets, &[key], |s, _| Ok(s.index.sis_member(key, member)))
    }

    /// Random members; see [`SetIndex::srand_member`] for `count`
    pub fn srand_member(&self, key: &[u8], count: i64) -> Result<Vec<Vec<u8>>> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.sets, &[key], |s, _| Ok(s.index.srand_member(key, count)))
    }

    /// Remove members, returning how many were present
    pub fn srem(&self, key: &[u8], members: &[&[u8]]) -> Result<usize> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        if members.is_empty() {
            return Err(RoseError::WrongNumberArgs);
        }
        self.mutate(&self.sets, &[key], |s| {
            let mut removed = 0;
            for member in members {
                if !s.index.sis_member(key, member) {
                    continue;
                }
                s.commit(Entry::no_extra(key, *member, DataType::Set, SetMark::SRem))?;
                removed += 1;
            }
            Ok(removed)
        })
    }

    /// Move `member` from `src` to `dst`; false when `src` lacks it
    pub fn smove(&self, src: &[u8], dst: &[u8], member: &[u8]) -> Result<bool> {
        let _gate = self.enter()?;
        self.check_key(src)?;
        self.check_key(dst)?;
        self.mutate(&self.sets, &[src, dst], |s| {
            if !s.index.sis_member(src, member) {
                return Ok(false);
            }
            s.commit(Entry::new(src, member, dst, DataType::Set, SetMark::SMove))?;
            Ok(true)
        })
    }

    pub fn scard(&self, key: &[u8]) -> Result<usize> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.sets, &[key], |s, _| Ok(s.index.scard(key)))
    }

    pub fn smembers(&self, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.sets, &[key], |s, _| Ok(s.index.smembers(key)))
    }

    /// Distinct members of all `keys`
    pub fn sunion(&self, keys: &[&[u8]]) -> Result<Vec<Vec<u8>>> {
        let _gate = self.enter()?;
        self.check_keys(keys)?;
        self.view(&self.sets, keys, |s, _| Ok(s.index.sunion(keys)))
    }

    /// Members of `keys[0]` missing from every other set
    pub fn sdiff(&self, keys: &[&[u8]]) -> Result<Vec<Vec<u8>>> {
        let _gate = self.enter()?;
        self.check_keys(keys)?;
        self.view(&self.sets, keys, |s, _| Ok(s.index.sdiff(keys)))
    }

    /// Drop the whole set
    pub fn sclear(&self, key: &[u8]) -> Result<()> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.mutate(&self.sets, &[key], |s| {
            if !s.index.key_exists(key) {
                return Ok(());
            }
            s.commit(Entry::no_extra(key, Vec::new(), DataType::Set, SetMark::SClear))
                .map(|_| ())
        })
    }

    pub fn skey_exists(&self, key: &[u8]) -> Result<bool> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.sets, &[key], |s, _| Ok(s.index.key_exists(key)))
    }

    /// Expire the set `ttl` seconds from now
    pub fn sexpire(&self, key: &[u8], ttl: i64) -> Result<()> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        if ttl <= 0 {
            return Err(RoseError::InvalidTtl);
        }
        self.mutate(&self.sets, &[key], |s| {
            if !s.index.key_exists(key) {
                return Err(RoseError::KeyNotExist);
            }
            let deadline = deadline_after(ttl);
            s.commit(Entry::with_deadline(key, Vec::new(), deadline, DataType::Set, SetMark::SExpire))
                .map(|_| ())
        })
    }

    pub fn sttl(&self, key: &[u8]) -> Result<i64> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.sets, &[key], |s, _| Ok(s.ttl(key)))
    }

    fn check_keys(&self, keys: &[&[u8]]) -> Result<()> {
        if keys.is_empty() {
            return Err(RoseError::WrongNumberArgs);
        }
        keys.iter().try_for_each(|key| self.check_key(key))
    }
}
