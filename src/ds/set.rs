//! Set Index

use std::collections::{HashMap, HashSet};

use rand::seq::{IteratorRandom, SliceRandom};

/// Most members a single repeating random draw returns
pub const SRAND_MAX_REPEATS: usize = 1 << 16;

/// Member sets keyed by set key
#[derive(Debug, Default)]
pub struct SetIndex {
    records: HashMap<Vec<u8>, HashSet<Vec<u8>>>,
}

impl SetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member; true when it was not present
    pub fn sadd(&mut self, key: &[u8], member: &[u8]) -> bool {
        self.records.entry(key.to_vec()).or_default().insert(member.to_vec())
    }

    /// Pick up to `count` distinct random members without removing them
    pub fn sample(&self, key: &[u8], count: usize) -> Vec<Vec<u8>> {
        match self.records.get(key) {
            Some(members) => members
                .iter()
                .choose_multiple(&mut rand::thread_rng(), count)
                .into_iter()
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn sis_member(&self, key: &[u8], member: &[u8]) -> bool {
        self.records.get(key).map_or(false, |members| members.contains(member))
    }

    /// Random members
    ///
    /// `count > 0` returns up to `count` distinct members (all of them when
    /// `count` reaches the cardinality). `count < 0` returns `|count|`
    /// members, capped at [`SRAND_MAX_REPEATS`], and may repeat.
    /// `count == 0` returns nothing.
    pub fn srand_member(&self, key: &[u8], count: i64) -> Vec<Vec<u8>> {
        let Some(members) = self.records.get(key) else {
            return Vec::new();
        };
        if count >= 0 {
            return self.sample(key, count as usize);
        }

        let pool: Vec<&Vec<u8>> = members.iter().collect();
        let mut rng = rand::thread_rng();
        let wanted = count.unsigned_abs().min(SRAND_MAX_REPEATS as u64);
        (0..wanted)
            .filter_map(|_| pool.choose(&mut rng).map(|m| (*m).clone()))
            .collect()
    }

    /// Remove a member; true when it was present
    pub fn srem(&mut self, key: &[u8], member: &[u8]) -> bool {
        let Some(members) = self.records.get_mut(key) else {
            return false;
        };
        let removed = members.remove(member);
        if members.is_empty() {
            self.records.remove(key);
        }
        removed
    }

    /// Move `member` from `src` to `dst`; false (and no change) when the
    /// member is not in `src`
    pub fn smove(&mut self, src: &[u8], dst: &[u8], member: &[u8]) -> bool {
        if !self.srem(src, member) {
            return false;
        }
        self.sadd(dst, member);
        true
    }

    pub fn scard(&self, key: &[u8]) -> usize {
        self.records.get(key).map_or(0, HashSet::len)
    }

    pub fn smembers(&self, key: &[u8]) -> Vec<Vec<u8>> {
        self.records
            .get(key)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Distinct members found in any of `keys`
    pub fn sunion(&self, keys: &[&[u8]]) -> Vec<Vec<u8>> {
        let mut seen: HashSet<&Vec<u8>> = HashSet::new();
        let mut out = Vec::new();
        for key in keys {
            if let Some(members) = self.records.get(*key) {
                for member in members {
                    if seen.insert(member) {
                        out.push(member.clone());
                    }
                }
            }
        }
        out
    }

    /// Members of `keys[0]` absent from every other listed set
    pub fn sdiff(&self, keys: &[&[u8]]) -> Vec<Vec<u8>> {
        let Some((first, rest)) = keys.split_first() else {
            return Vec::new();
        };
        let Some(base) = self.records.get(*first) else {
            return Vec::new();
        };
        base.iter()
            .filter(|member| !rest.iter().any(|key| self.sis_member(key, member)))
            .cloned()
            .collect()
    }

    pub fn key_exists(&self, key: &[u8]) -> bool {
        self.records.contains_key(key)
    }

    /// Drop the whole set; true when it existed
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
