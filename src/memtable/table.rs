//! MemTable implementation
//!
//! Copy-on-write BTreeMap with RwLock for concurrency.

use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::item::{Item, Stat, Timestamp};
use crate::wal::Operation;

use super::Record;

/// Immutable point-in-time view of the table
pub type View = Arc<BTreeMap<Vec<u8>, Record>>;

struct Inner {
    map: View,
    /// Sum of all value lengths
    value_bytes: u64,
}

/// In-memory table of live keys
pub struct MemTable {
    inner: RwLock<Inner>,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                map: Arc::new(BTreeMap::new()),
                value_bytes: 0,
            }),
        }
    }

    /// Get a record by key (read lock)
    pub fn get(&self, key: &[u8]) -> Option<Record> {
        self.inner.read().map.get(key).cloned()
    }

    /// Get a key's metadata (read lock)
    pub fn stat(&self, key: &[u8]) -> Option<Stat> {
        self.inner.read().map.get(key).map(Record::stat)
    }

    /// Insert or replace a value; returns the previous record
    pub fn put(&self, key: Vec<u8>, value: Bytes, last_used: Timestamp) -> Option<Record> {
        self.inner.write().put(key, value, last_used)
    }

    /// Remove a key; returns the removed record
    pub fn delete(&self, key: &[u8]) -> Option<Record> {
        self.inner.write().delete(key)
    }

    /// Refresh a key's last-used time; false if the key is absent
    pub fn touch(&self, key: &[u8], last_used: Timestamp) -> bool {
        self.inner.write().touch(key, last_used)
    }

    /// Apply a logged operation under one write lock.
    ///
    /// Observers holding the read lock see either none or all of a batch.
    pub fn apply(&self, operation: Operation, at: Timestamp) {
        self.inner.write().apply(operation, at);
    }

    /// Apply an operation and capture the resulting view under the same lock
    pub fn apply_and_view(&self, operation: Operation, at: Timestamp) -> View {
        let mut inner = self.inner.write();
        inner.apply(operation, at);
        Arc::clone(&inner.map)
    }

    /// Total bytes of all stored values
    pub fn size(&self) -> u64 {
        self.inner.read().value_bytes
    }

    /// Get entry count
    pub fn entry_count(&self) -> usize {
        self.inner.read().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().map.is_empty()
    }

    /// Current point-in-time view (O(1))
    pub fn view(&self) -> View {
        Arc::clone(&self.inner.read().map)
    }

    /// Items whose key starts with `prefix`, in key order
    pub fn list_items(&self, prefix: &[u8]) -> Vec<Item> {
        list_view(&self.view(), prefix)
    }

    /// Pick least-recently-used keys whose removal frees at least `excess`
    /// bytes, skipping `protected` keys. May free less if too little is
    /// evictable.
    pub fn eviction_candidates(&self, excess: u64, protected: &HashSet<Vec<u8>>) -> Vec<Vec<u8>> {
        let view = self.view();
        let mut by_age: Vec<(&Vec<u8>, &Record)> = view
            .iter()
            .filter(|(key, _)| !protected.contains(*key))
            .collect();
        by_age.sort_by(|a, b| a.1.last_used.cmp(&b.1.last_used).then_with(|| a.0.cmp(b.0)));

        let mut freed = 0u64;
        let mut victims = Vec::new();
        for (key, record) in by_age {
            if freed >= excess {
                break;
            }
            freed += record.value.len() as u64;
            victims.push(key.clone());
        }
        victims
    }

    /// Clear all entries
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.map = Arc::new(BTreeMap::new());
        inner.value_bytes = 0;
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn put(&mut self, key: Vec<u8>, value: Bytes, last_used: Timestamp) -> Option<Record> {
        let added = value.len() as u64;
        let previous = Arc::make_mut(&mut self.map).insert(key, Record { value, last_used });
        let removed = previous.as_ref().map_or(0, |r| r.value.len() as u64);
        self.value_bytes = self.value_bytes + added - removed;
        previous
    }

    fn delete(&mut self, key: &[u8]) -> Option<Record> {
        if !self.map.contains_key(key) {
            return None;
        }
        let removed = Arc::make_mut(&mut self.map).remove(key)?;
        self.value_bytes -= removed.value.len() as u64;
        Some(removed)
    }

    fn touch(&mut self, key: &[u8], last_used: Timestamp) -> bool {
        if !self.map.contains_key(key) {
            return false;
        }
        match Arc::make_mut(&mut self.map).get_mut(key) {
            Some(record) => {
                record.last_used = last_used;
                true
            }
            None => false,
        }
    }

    fn apply(&mut self, operation: Operation, at: Timestamp) {
        match operation {
            Operation::Put { key, value } => {
                self.put(key, Bytes::from(value), at);
            }
            Operation::Delete { key } => {
                self.delete(&key);
            }
            Operation::Touch { key } => {
                self.touch(&key, at);
            }
            Operation::Batch { operations } => {
                for operation in operations {
                    self.apply(operation, at);
                }
            }
        }
    }
}

/// Items of `view` whose key starts with `prefix`, in key order
pub fn list_view(view: &BTreeMap<Vec<u8>, Record>, prefix: &[u8]) -> Vec<Item> {
    let upper = prefix_successor(prefix);
    let end = match &upper {
        Some(upper) => Bound::Excluded(upper.as_slice()),
        None => Bound::Unbounded,
    };
    view.range::<[u8], _>((Bound::Included(prefix), end))
        .map(|(key, record)| Item {
            key: key.clone(),
            stat: record.stat(),
        })
        .collect()
}

/// Smallest key greater than every key starting with `prefix`.
/// `None` when no such key exists (empty or all-0xFF prefix).
fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.last_mut() {
        if *last == u8::MAX {
            end.pop();
        } else {
            *last += 1;
            return Some(end);
        }
    }
    None
}
