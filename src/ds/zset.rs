//! Sorted Set Index
//!
//! Each key owns a [`SortedSet`]: a member → score dictionary for O(1)
//! score lookups plus a skip list ordered by `(score, member)` for rank
//! and range queries. The two always hold the same members.
//!
//! Ranks are 0-based and ascending. Range bounds accept negative indices
//! counted from the highest rank.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::list::resolve_range;
use super::skiplist::SkipList;

/// Skip list ordering key: score first, then member bytes
#[derive(Debug, Clone)]
pub struct ScoreKey {
    pub score: f64,
    pub member: Vec<u8>,
}

impl PartialEq for ScoreKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoreKey {}

impl PartialOrd for ScoreKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoreKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.member.cmp(&other.member))
    }
}

/// One sorted set
#[derive(Debug, Default)]
pub struct SortedSet {
    dict: HashMap<Vec<u8>, f64>,
    list: SkipList<ScoreKey, ()>,
}

impl SortedSet {
    /// Insert or rescore; false when the member already had this score
    pub fn add(&mut self, score: f64, member: &[u8]) -> bool {
        if let Some(&old) = self.dict.get(member) {
            if old == score {
                return false;
            }
            self.list.remove(&ScoreKey { score: old, member: member.to_vec() });
        }
        self.dict.insert(member.to_vec(), score);
        self.list.insert(ScoreKey { score, member: member.to_vec() }, ());
        true
    }

    pub fn remove(&mut self, member: &[u8]) -> bool {
        match self.dict.remove(member) {
            Some(score) => {
                self.list.remove(&ScoreKey { score, member: member.to_vec() });
                true
            }
            None => false,
        }
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.dict.get(member).copied()
    }

    pub fn len(&self) -> usize {
        self.dict.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dict.is_empty()
    }

    /// 0-based ascending rank
    pub fn rank(&self, member: &[u8]) -> Option<usize> {
        let score = self.score(member)?;
        let rank = self.list.rank(&ScoreKey { score, member: member.to_vec() })?;
        Some(rank - 1)
    }

    /// 0-based descending rank
    pub fn rev_rank(&self, member: &[u8]) -> Option<usize> {
        let score = self.score(member)?;
        let rank = self.list.rank(&ScoreKey { score, member: member.to_vec() })?;
        Some(self.list.len() - rank)
    }

    /// Member at a 0-based ascending rank
    pub fn get_by_rank(&self, rank: usize, reverse: bool) -> Option<(Vec<u8>, f64)> {
        if rank >= self.list.len() {
            return None;
        }
        let nth = if reverse { self.list.len() - rank } else { rank + 1 };
        let (key, _) = self.list.entry(self.list.by_rank(nth)?)?;
        Some((key.member.clone(), key.score))
    }

    /// Members between two ranks (inclusive)
    pub fn range(&self, start: i64, stop: i64, reverse: bool) -> Vec<(Vec<u8>, f64)> {
        let len = self.list.len();
        let Some((from, to)) = resolve_range(start, stop, len) else {
            return Vec::new();
        };
        let first = if reverse { self.list.by_rank(len - from) } else { self.list.by_rank(from + 1) };
        self.list
            .iter_at(first, reverse)
            .take(to - from + 1)
            .map(|(k, _)| (k.member.clone(), k.score))
            .collect()
    }

    /// Members with `min <= score <= max`, ascending
    ///
    /// Both bounds are first clamped to the scores actually present.
    pub fn score_range(&self, min: f64, max: f64) -> Vec<(Vec<u8>, f64)> {
        if min > max {
            return Vec::new();
        }
        let Some((lowest, highest)) = self.bounds() else {
            return Vec::new();
        };
        let min = min.max(lowest);
        let max = max.min(highest);

        let first = self.list.first_after(|k| k.score < min);
        self.list
            .iter_at(first, false)
            .take_while(|(k, _)| k.score <= max)
            .map(|(k, _)| (k.member.clone(), k.score))
            .collect()
    }

    /// Members with `min <= score <= max`, descending
    pub fn rev_score_range(&self, max: f64, min: f64) -> Vec<(Vec<u8>, f64)> {
        if min > max {
            return Vec::new();
        }
        let last = self.list.last_where(|k| k.score <= max);
        self.list
            .iter_at(last, true)
            .take_while(|(k, _)| k.score >= min)
            .map(|(k, _)| (k.member.clone(), k.score))
            .collect()
    }

    /// Lowest and highest score present
    fn bounds(&self) -> Option<(f64, f64)> {
        let (lo, _) = self.list.entry(self.list.first()?)?;
        let (hi, _) = self.list.entry(self.list.last()?)?;
        Some((lo.score, hi.score))
    }
}

/// Sorted sets keyed by key
#[derive(Debug, Default)]
pub struct ZSetIndex {
    records: HashMap<Vec<u8>, SortedSet>,
}

impl ZSetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or rescore a member; false when nothing changed
    pub fn zadd(&mut self, key: &[u8], score: f64, member: &[u8]) -> bool {
        self.records.entry(key.to_vec()).or_default().add(score, member)
    }

    pub fn zscore(&self, key: &[u8], member: &[u8]) -> Option<f64> {
        self.records.get(key)?.score(member)
    }

    pub fn zcard(&self, key: &[u8]) -> usize {
        self.records.get(key).map_or(0, SortedSet::len)
    }

    pub fn zrank(&self, key: &[u8], member: &[u8]) -> Option<usize> {
        self.records.get(key)?.rank(member)
    }

    pub fn zrev_rank(&self, key: &[u8], member: &[u8]) -> Option<usize> {
        self.records.get(key)?.rev_rank(member)
    }

    /// Score `member` would have after adding `increment`
    pub fn incremented(&self, key: &[u8], increment: f64, member: &[u8]) -> f64 {
        self.zscore(key, member).map_or(increment, |score| score + increment)
    }

    /// Add `increment` to a member's score (a missing member starts at 0)
    pub fn zincrby(&mut self, key: &[u8], increment: f64, member: &[u8]) -> f64 {
        let score = self.incremented(key, increment, member);
        self.zadd(key, score, member);
        score
    }

    pub fn zrange(&self, key: &[u8], start: i64, stop: i64, reverse: bool) -> Vec<(Vec<u8>, f64)> {
        self.records
            .get(key)
            .map(|z| z.range(start, stop, reverse))
            .unwrap_or_default()
    }

    pub fn zrem(&mut self, key: &[u8], member: &[u8]) -> bool {
        let Some(set) = self.records.get_mut(key) else {
            return false;
        };
        let removed = set.remove(member);
        if set.is_empty() {
            self.records.remove(key);
        }
        removed
    }

    pub fn zget_by_rank(&self, key: &[u8], rank: usize, reverse: bool) -> Option<(Vec<u8>, f64)> {
        self.records.get(key)?.get_by_rank(rank, reverse)
    }

    pub fn zscore_range(&self, key: &[u8], min: f64, max: f64) -> Vec<(Vec<u8>, f64)> {
        self.records
            .get(key)
            .map(|z| z.score_range(min, max))
            .unwrap_or_default()
    }

    pub fn zrev_score_range(&self, key: &[u8], max: f64, min: f64) -> Vec<(Vec<u8>, f64)> {
        self.records
            .get(key)
            .map(|z| z.rev_score_range(max, min))
            .unwrap_or_default()
    }

    pub fn key_exists(&self, key: &[u8]) -> bool {
        self.records.contains_key(key)
    }

    /// Drop the whole sorted set; true when it existed
    pub fn clear(&mut self, key: &[u8]) -> bool {
        self.records.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
