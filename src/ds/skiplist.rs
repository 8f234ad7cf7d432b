//! Skip List
//!
//! Ordered map with O(log n) search, insert, delete and rank queries.
//!
//! Nodes live in an arena (`Vec`) and link to each other by index, so the
//! forward/backward links form no ownership cycles. Slot 0 is the head.
//! Each forward link records its `span`: how many level-0 hops it skips.
//! Summing spans along a search path yields the 1-based rank of a node.
//!
//! ```text
//! level 2  head ───────────────(3)──────────────▶ c
//! level 1  head ──(1)──▶ a ────(2)──────────────▶ c
//! level 0  head ──(1)──▶ a ──(1)──▶ b ──(1)──▶ c ──(1)──▶ d
//! ```

use rand::Rng;

const MAX_LEVEL: usize = 32;
const PROBABILITY: f64 = 0.25;
const HEAD: usize = 0;

/// Opaque handle to a live node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, Default)]
struct Level {
    forward: Option<usize>,
    span: usize,
}

#[derive(Debug)]
struct Node<K, V> {
    entry: Option<(K, V)>,
    backward: Option<usize>,
    levels: Vec<Level>,
}

/// Arena-backed skip list with per-level spans
#[derive(Debug)]
pub struct SkipList<K, V> {
    nodes: Vec<Node<K, V>>,
    free: Vec<usize>,
    level: usize,
    len: usize,
    tail: Option<usize>,
}

impl<K: Ord, V> Default for SkipList<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V> SkipList<K, V> {
    pub fn new() -> Self {
        let head = Node { entry: None, backward: None, levels: vec![Level::default(); MAX_LEVEL] };
        Self { nodes: vec![head], free: Vec::new(), level: 1, len: 0, tail: None }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    // =========================================================================
    // Point Operations
    // =========================================================================

    /// Insert or replace; returns the previous value for an existing key
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let mut update = [HEAD; MAX_LEVEL];
        let mut rank = [0usize; MAX_LEVEL];
        let mut x = HEAD;

        for i in (0..self.level).rev() {
            rank[i] = if i == self.level - 1 { 0 } else { rank[i + 1] };
            while let Some(next) = self.nodes[x].levels[i].forward {
                if self.key_lt(next, &key) {
                    rank[i] += self.nodes[x].levels[i].span;
                    x = next;
                } else {
                    break;
                }
            }
            update[i] = x;
        }

        if let Some(next) = self.nodes[x].levels[0].forward {
            if let Some((k, v)) = self.nodes[next].entry.as_mut() {
                if *k == key {
                    return Some(std::mem::replace(v, value));
                }
            }
        }

        let level = random_level();
        if level > self.level {
            for i in self.level..level {
                rank[i] = 0;
                update[i] = HEAD;
                self.nodes[HEAD].levels[i].span = self.len;
            }
            self.level = level;
        }

        let idx = self.alloc(key, value, level);
        for i in 0..level {
            let prev = update[i];
            let prev_level = self.nodes[prev].levels[i];
            let skipped = rank[0] - rank[i];
            self.nodes[idx].levels[i] = Level {
                forward: prev_level.forward,
                span: prev_level.span.saturating_sub(skipped),
            };
            self.nodes[prev].levels[i] = Level { forward: Some(idx), span: skipped + 1 };
        }
        for i in level..self.level {
            self.nodes[update[i]].levels[i].span += 1;
        }

        self.nodes[idx].backward = if update[0] == HEAD { None } else { Some(update[0]) };
        match self.nodes[idx].levels[0].forward {
            Some(next) => self.nodes[next].backward = Some(idx),
            None => self.tail = Some(idx),
        }
        self.len += 1;
        None
    }

    /// Remove a key, returning its value
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let mut update = [HEAD; MAX_LEVEL];
        let mut x = HEAD;
        for i in (0..self.level).rev() {
            while let Some(next) = self.nodes[x].levels[i].forward {
                if self.key_lt(next, key) {
                    x = next;
                } else {
                    break;
                }
            }
            update[i] = x;
        }

        let target = self.nodes[x].levels[0].forward?;
        if self.key_of(target) != Some(key) {
            return None;
        }
        self.unlink(target, &update);
        self.release(target).map(|(_, v)| v)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let idx = self.find(key)?;
        self.nodes[idx].entry.as_ref().map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let idx = self.find(key)?;
        self.nodes[idx].entry.as_mut().map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    // =========================================================================
    // Rank Queries
    // =========================================================================

    /// 1-based rank of `key`
    pub fn rank(&self, key: &K) -> Option<usize> {
        let mut rank = 0;
        let mut x = HEAD;
        for i in (0..self.level).rev() {
            while let Some(next) = self.nodes[x].levels[i].forward {
                if self.key_le(next, key) {
                    rank += self.nodes[x].levels[i].span;
                    x = next;
                } else {
                    break;
                }
            }
            if x != HEAD && self.key_of(x) == Some(key) {
                return Some(rank);
            }
        }
        None
    }

    /// Node at 1-based `rank`
    pub fn by_rank(&self, rank: usize) -> Option<NodeId> {
        if rank == 0 || rank > self.len {
            return None;
        }
        let mut traversed = 0;
        let mut x = HEAD;
        for i in (0..self.level).rev() {
            while let Some(next) = self.nodes[x].levels[i].forward {
                let span = self.nodes[x].levels[i].span;
                if traversed + span <= rank {
                    traversed += span;
                    x = next;
                } else {
                    break;
                }
            }
            if traversed == rank && x != HEAD {
                return Some(NodeId(x));
            }
        }
        None
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn first(&self) -> Option<NodeId> {
        self.nodes[HEAD].levels[0].forward.map(NodeId)
    }

    pub fn last(&self) -> Option<NodeId> {
        self.tail.map(NodeId)
    }

    /// First node whose key is `>= key`
    pub fn lower_bound(&self, key: &K) -> Option<NodeId> {
        let x = self.last_before(|k| k < key);
        self.nodes[x].levels[0].forward.map(NodeId)
    }

    /// Last node for which `pred` holds, given `pred` is true for a prefix
    /// of the ordering and false afterwards
    pub fn last_where(&self, pred: impl Fn(&K) -> bool) -> Option<NodeId> {
        let x = self.last_before(pred);
        (x != HEAD).then_some(NodeId(x))
    }

    /// First node for which `pred` fails, given the same prefix shape
    pub fn first_after(&self, pred: impl Fn(&K) -> bool) -> Option<NodeId> {
        let x = self.last_before(pred);
        self.nodes[x].levels[0].forward.map(NodeId)
    }

    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].levels[0].forward.map(NodeId)
    }

    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].backward.map(NodeId)
    }

    pub fn entry(&self, id: NodeId) -> Option<(&K, &V)> {
        self.nodes[id.0].entry.as_ref().map(|(k, v)| (k, v))
    }

    /// Ascending iterator over all entries
    pub fn iter(&self) -> Iter<'_, K, V> {
        self.iter_at(self.first(), false)
    }

    /// Iterate from `start`, forward or backward
    pub fn iter_at(&self, start: Option<NodeId>, reverse: bool) -> Iter<'_, K, V> {
        Iter { list: self, cur: start, reverse }
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn key_of(&self, idx: usize) -> Option<&K> {
        self.nodes[idx].entry.as_ref().map(|(k, _)| k)
    }

    fn key_lt(&self, idx: usize, key: &K) -> bool {
        self.key_of(idx).map_or(false, |k| k < key)
    }

    fn key_le(&self, idx: usize, key: &K) -> bool {
        self.key_of(idx).map_or(false, |k| k <= key)
    }

    fn find(&self, key: &K) -> Option<usize> {
        let x = self.last_before(|k| k < key);
        let next = self.nodes[x].levels[0].forward?;
        (self.key_of(next) == Some(key)).then_some(next)
    }

    /// Deepest node (possibly the head) reachable while `pred` holds
    fn last_before(&self, pred: impl Fn(&K) -> bool) -> usize {
        let mut x = HEAD;
        for i in (0..self.level).rev() {
            while let Some(next) = self.nodes[x].levels[i].forward {
                if self.key_of(next).map_or(false, &pred) {
                    x = next;
                } else {
                    break;
                }
            }
        }
        x
    }

    fn unlink(&mut self, target: usize, update: &[usize; MAX_LEVEL]) {
        for i in 0..self.level {
            let prev = update[i];
            if self.nodes[prev].levels[i].forward == Some(target) {
                let removed = self.nodes[target].levels[i];
                let link = &mut self.nodes[prev].levels[i];
                link.span = (link.span + removed.span).saturating_sub(1);
                link.forward = removed.forward;
            } else {
                let link = &mut self.nodes[prev].levels[i];
                link.span = link.span.saturating_sub(1);
            }
        }

        let backward = self.nodes[target].backward;
        match self.nodes[target].levels[0].forward {
            Some(next) => self.nodes[next].backward = backward,
            None => self.tail = backward,
        }

        while self.level > 1 && self.nodes[HEAD].levels[self.level - 1].forward.is_none() {
            self.level -= 1;
        }
        self.len -= 1;
    }

    fn alloc(&mut self, key: K, value: V, level: usize) -> usize {
        let node = Node { entry: Some((key, value)), backward: None, levels: vec![Level::default(); level] };
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, idx: usize) -> Option<(K, V)> {
        let node = &mut self.nodes[idx];
        node.backward = None;
        node.levels.clear();
        self.free.push(idx);
        node.entry.take()
    }
}

/// Iterator over `(key, value)` pairs in either direction
pub struct Iter<'a, K, V> {
    list: &'a SkipList<K, V>,
    cur: Option<NodeId>,
    reverse: bool,
}

impl<'a, K: Ord, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cur?;
        self.cur = if self.reverse { self.list.prev(id) } else { self.list.next(id) };
        self.list.entry(id)
    }
}

fn random_level() -> usize {
    let mut rng = rand::thread_rng();
    let mut level = 1;
    while level < MAX_LEVEL && rng.gen::<f64>() < PROBABILITY {
        level += 1;
    }
    level
}
