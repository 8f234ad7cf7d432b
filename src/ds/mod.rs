//! In-memory Index Structures
//!
//! Pure data structures, one per data type. They know nothing about
//! segments or expiry: the engine writes the log entry first and then
//! applies the same mutation here, and replay drives the exact same calls.
//!
//! ```text
//! String  → SkipList<key, StrValue>          ordered, prefix/range scans
//! List    → HashMap<key, VecDeque<value>>
//! Hash    → HashMap<key, HashMap<field, value>>
//! Set     → HashMap<key, HashSet<member>>
//! ZSet    → HashMap<key, { dict: member → score, SkipList<(score, member)> }>
//! ```
//!
//! Container types drop a key as soon as its collection becomes empty, so
//! "key exists" always means "has at least one element".

pub mod hash;
pub mod list;
pub mod set;
pub mod skiplist;
pub mod zset;

pub use hash::HashIndex;
pub use list::{InsertOption, ListIndex};
pub use set::{SetIndex, SRAND_MAX_REPEATS};
pub use skiplist::{NodeId, SkipList};
pub use zset::{ScoreKey, SortedSet, ZSetIndex};
