//! Hash Index

use std::collections::HashMap;

/// Field maps keyed by hash key
#[derive(Debug, Default)]
pub struct HashIndex {
    records: HashMap<Vec<u8>, HashMap<Vec<u8>, Vec<u8>>>,
}

impl HashIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field; true when the field is new
    pub fn hset(&mut self, key: &[u8], field: &[u8], value: Vec<u8>) -> bool {
        self.records
            .entry(key.to_vec())
            .or_default()
            .insert(field.to_vec(), value)
            .is_none()
    }

    /// Set a field only if absent; true when it was set
    pub fn hsetnx(&mut self, key: &[u8], field: &[u8], value: Vec<u8>) -> bool {
        if self.hexists(key, field) {
            return false;
        }
        self.hset(key, field, value)
    }

    pub fn hget(&self, key: &[u8], field: &[u8]) -> Option<&[u8]> {
        self.records.get(key)?.get(field).map(Vec::as_slice)
    }

    /// Every `(field, value)` pair of a key, in no particular order
    pub fn hget_all(&self, key: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.records
            .get(key)
            .map(|fields| fields.iter().map(|(f, v)| (f.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    /// Remove a field; true when it existed
    pub fn hdel(&mut self, key: &[u8], field: &[u8]) -> bool {
        let Some(fields) = self.records.get_mut(key) else {
            return false;
        };
        let removed = fields.remove(field).is_some();
        if fields.is_empty() {
            self.records.remove(key);
        }
        removed
    }

    pub fn hkey_exists(&self, key: &[u8]) -> bool {
        self.records.contains_key(key)
    }

    pub fn hexists(&self, key: &[u8], field: &[u8]) -> bool {
        self.records.get(key).map_or(false, |fields| fields.contains_key(field))
    }

    pub fn hlen(&self, key: &[u8]) -> usize {
        self.records.get(key).map_or(0, HashMap::len)
    }

    pub fn hkeys(&self, key: &[u8]) -> Vec<Vec<u8>> {
        self.records
            .get(key)
            .map(|fields| fields.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn hvals(&self, key: &[u8]) -> Vec<Vec<u8>> {
        self.records
            .get(key)
            .map(|fields| fields.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop every field of a key; true when it existed
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
