//! Sorted Set Operations
//!
//! `ZAdd` entries carry the member in `value` and the score in `extra`,
//! written as the shortest decimal that parses back to the same `f64`.

use crate::ds::ZSetIndex;
use crate::error::{Result, RoseError};
use crate::storage::mark::ZSetMark;
use crate::storage::{DataType, Entry, Locator};

use super::store::{deadline_after, deadline_in_force, parse_num, Expires, Store, TypeIndex};
use super::Engine;

impl TypeIndex for ZSetIndex {
    const DATA_TYPE: DataType = DataType::ZSet;
    const CLEAR_MARK: u16 = ZSetMark::ZClear as u16;

    fn contains_key(&self, key: &[u8]) -> bool {
        self.key_exists(key)
    }

    fn key_count(&self) -> usize {
        self.len()
    }

    fn apply(&mut self, entry: &Entry, _loc: Locator, expires: &mut Expires) -> Result<()> {
        let key = entry.key.as_slice();
        match ZSetMark::from_u16(entry.get_mark()) {
            Some(ZSetMark::ZAdd) => {
                self.zadd(key, parse_num(&entry.extra)?, &entry.value);
            }
            Some(ZSetMark::ZRem) => {
                self.zrem(key, &entry.value);
            }
            Some(ZSetMark::ZClear) => {
                self.clear(key);
                expires.remove(key);
            }
            Some(ZSetMark::ZExpire) => {
                expires.insert(entry.key.clone(), entry.deadline());
            }
            None => {
                return Err(RoseError::InvalidEntry(format!("unknown zset mark {}", entry.get_mark())))
            }
        }
        Ok(())
    }

    fn is_live(&self, entry: &Entry, _loc: Locator, expires: &Expires) -> bool {
        match ZSetMark::from_u16(entry.get_mark()) {
            Some(ZSetMark::ZAdd) => {
                let logged = parse_num::<f64>(&entry.extra).ok();
                logged.is_some() && self.zscore(&entry.key, &entry.value) == logged
            }
            Some(ZSetMark::ZExpire) => self.key_exists(&entry.key) && deadline_in_force(entry, expires),
            _ => false,
        }
    }
}

impl Engine {
    /// Add `member` with `score`, or rescore it
    ///
    /// Re-adding a member with its current score logs nothing.
    pub fn zadd(&self, key: &[u8], score: f64, member: &[u8]) -> Result<()> {
        let _gate = self.enter()?;
        self.check_kv(key, member)?;
        self.mutate(&self.zsets, &[key], |s| add_member(s, key, score, member))
    }

    pub fn zscore(&self, key: &[u8], member: &[u8]) -> Result<Option<f64>> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.zsets, &[key], |s, _| Ok(s.index.zscore(key, member)))
    }

    pub fn zcard(&self, key: &[u8]) -> Result<usize> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.zsets, &[key], |s, _| Ok(s.index.zcard(key)))
    }

    /// 0-based rank, lowest score first
    pub fn zrank(&self, key: &[u8], member: &[u8]) -> Result<Option<usize>> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.zsets, &[key], |s, _| Ok(s.index.zrank(key, member)))
    }

    /// 0-based rank, highest score first
    pub fn zrev_rank(&self, key: &[u8], member: &[u8]) -> Result<Option<usize>> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.zsets, &[key], |s, _| Ok(s.index.zrev_rank(key, member)))
    }

    /// Add `increment` to the score of `member` (0 if absent) and return it
    pub fn zincr_by(&self, key: &[u8], increment: f64, member: &[u8]) -> Result<f64> {
        let _gate = self.enter()?;
        self.check_kv(key, member)?;
        self.mutate(&self.zsets, &[key], |s| {
            let score = s.index.incremented(key, increment, member);
            add_member(s, key, score, member)?;
            Ok(score)
        })
    }

    /// Members ranked `start..=stop`, ascending
    pub fn zrange(&self, key: &[u8], start: i64, stop: i64) -> Result<Vec<Vec<u8>>> {
        Ok(members_only(self.range(key, start, stop, false)?))
    }

    pub fn zrange_with_scores(&self, key: &[u8], start: i64, stop: i64) -> Result<Vec<(Vec<u8>, f64)>> {
        self.range(key, start, stop, false)
    }

    /// Members ranked `start..=stop`, descending
    pub fn zrev_range(&self, key: &[u8], start: i64, stop: i64) -> Result<Vec<Vec<u8>>> {
        Ok(members_only(self.range(key, start, stop, true)?))
    }

    pub fn zrev_range_with_scores(
        &self,
        key: &[u8],
        start: i64,
        stop: i64,
    ) -> Result<Vec<(Vec<u8>, f64)>> {
        self.range(key, start, stop, true)
    }

    /// Remove `member`; true when it was present
    pub fn zrem(&self, key: &[u8], member: &[u8]) -> Result<bool> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.mutate(&self.zsets, &[key], |s| {
            if s.index.zscore(key, member).is_none() {
                return Ok(false);
            }
            s.commit(Entry::no_extra(key, member, DataType::ZSet, ZSetMark::ZRem))?;
            Ok(true)
        })
    }

    /// Member and score at a 0-based ascending rank
    pub fn zget_by_rank(&self, key: &[u8], rank: usize) -> Result<Option<(Vec<u8>, f64)>> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.zsets, &[key], |s, _| Ok(s.index.zget_by_rank(key, rank, false)))
    }

    /// Member and score at a 0-based descending rank
    pub fn zrev_get_by_rank(&self, key: &[u8], rank: usize) -> Result<Option<(Vec<u8>, f64)>> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.zsets, &[key], |s, _| Ok(s.index.zget_by_rank(key, rank, true)))
    }

    /// Members with `min <= score <= max`, ascending
    pub fn zscore_range(&self, key: &[u8], min: f64, max: f64) -> Result<Vec<(Vec<u8>, f64)>> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.zsets, &[key], |s, _| Ok(s.index.zscore_range(key, min, max)))
    }

    /// Members with `min <= score <= max`, descending
    pub fn zrev_score_range(&self, key: &[u8], max: f64, min: f64) -> Result<Vec<(Vec<u8>, f64)>> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.zsets, &[key], |s, _| Ok(s.index.zrev_score_range(key, max, min)))
    }

    /// Drop the whole sorted set
    pub fn zclear(&self, key: &[u8]) -> Result<()> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.mutate(&self.zsets, &[key], |s| {
            if !s.index.key_exists(key) {
                return Ok(());
            }
            s.commit(Entry::no_extra(key, Vec::new(), DataType::ZSet, ZSetMark::ZClear))
                .map(|_| ())
        })
    }

    pub fn zkey_exists(&self, key: &[u8]) -> Result<bool> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.zsets, &[key], |s, _| Ok(s.index.key_exists(key)))
    }

    /// Expire the sorted set `ttl` seconds from now
    pub fn zexpire(&self, key: &[u8], ttl: i64) -> Result<()> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        if ttl <= 0 {
            return Err(RoseError::InvalidTtl);
        }
        self.mutate(&self.zsets, &[key], |s| {
            if !s.index.key_exists(key) {
                return Err(RoseError::KeyNotExist);
            }
            let deadline = deadline_after(ttl);
            s.commit(Entry::with_deadline(key, Vec::new(), deadline, DataType::ZSet, ZSetMark::ZExpire))
                .map(|_| ())
        })
    }

    pub fn zttl(&self, key: &[u8]) -> Result<i64> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.zsets, &[key], |s, _| Ok(s.ttl(key)))
    }

    fn range(&self, key: &[u8], start: i64, stop: i64, reverse: bool) -> Result<Vec<(Vec<u8>, f64)>> {
        let _gate = self.enter()?;
        self.check_key(key)?;
        self.view(&self.zsets, &[key], |s, _| Ok(s.index.zrange(key, start, stop, reverse)))
    }
}

fn add_member(s: &mut Store<ZSetIndex>, key: &[u8], score: f64, member: &[u8]) -> Result<()> {
    if s.index.zscore(key, member) == Some(score) {
        return Ok(());
    }
    let entry = Entry::new(key, member, score.to_string(), DataType::ZSet, ZSetMark::ZAdd);
    s.commit(entry).map(|_| ())
}

fn members_only(scored: Vec<(Vec<u8>, f64)>) -> Vec<Vec<u8>> {
    scored.into_iter().map(|(member, _)| member).collect()
}
