//! Store Module
//!
//! Concurrent key/value table backing the cache.

use std::hash::Hash;

use dashmap::DashMap;

use crate::cache::MarkerId;

/// A stored value plus the id of the `put` that wrote it.
#[derive(Debug, Clone)]
struct Slot<V> {
    id: MarkerId,
    value: V,
}

// == Store ==
/// Key/value storage with per-key atomic put, get and remove.
pub struct Store<K, V> {
    entries: DashMap<K, Slot<V>>,
}

impl<K, V> Store<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    // == Put ==
    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `id` - The put this value belongs to
    /// * `value` - The value to store
    pub fn put(&self, key: K, id: MarkerId, value: V) {
        self.entries.insert(key, Slot { id, value });
    }

    // == Get ==
    /// Returns a copy of the value stored under `key`.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|slot| slot.value.clone())
    }

    // == Contains ==
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    // == Remove ==
    /// Removes `key`. Returns true if a value was present.
    pub fn remove(&self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    // == Remove If Current ==
    /// Removes `key` only if its value was written by put `id`.
    ///
    /// Returns true if a value was removed.
    pub fn remove_if_current(&self, key: &K, id: MarkerId) -> bool {
        self.entries
            .remove_if(key, |_, slot| slot.id == id)
            .is_some()
    }

    // == Length ==
    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> Default for Store<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
