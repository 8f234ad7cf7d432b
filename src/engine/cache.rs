//! String value cache for key-only index mode
//!
//! Values are fetched from segments on a miss and kept in a bounded LRU.
//! The cache is never authoritative: every write or removal of a key drops
//! its cached value. A capacity of 0 disables it.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

pub(crate) struct ValueCache {
    inner: Option<Mutex<LruCache<Vec<u8>, Vec<u8>>>>,
}

impl ValueCache {
    pub fn new(capacity: usize) -> Self {
        Self { inner: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))) }
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.inner.as_ref()?.lock().get(key).cloned()
    }

    pub fn put(&self, key: &[u8], value: &[u8]) {
        if let Some(cache) = &self.inner {
            cache.lock().put(key.to_vec(), value.to_vec());
        }
    }

    pub fn invalidate(&self, key: &[u8]) {
        if let Some(cache) = &self.inner {
            cache.lock().pop(key);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.as_ref().map_or(0, |cache| cache.lock().len())
    }
}
