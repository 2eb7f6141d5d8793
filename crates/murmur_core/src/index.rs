//! Secondary indexes over entity tables.

use crate::entity::EntityId;
use crate::error::{CoreError, CoreResult};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeBounds;

/// Ordered non-unique index from a key to entity ids.
///
/// Supports equality lookups, range queries and ordered traversal in both
/// directions. Ids under one key are kept in id order so iteration is
/// deterministic.
#[derive(Debug, Clone)]
pub struct MultiIndex<K: Ord + Clone> {
    entries: BTreeMap<K, BTreeSet<EntityId>>,
    count: usize,
}

impl<K: Ord + Clone> Default for MultiIndex<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone> MultiIndex<K> {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            count: 0,
        }
    }

    /// Adds `id` under `key`. Re-inserting an existing pair is a no-op.
    pub fn insert(&mut self, key: K, id: EntityId) {
        if self.entries.entry(key).or_default().insert(id) {
            self.count += 1;
        }
    }

    /// Removes `id` from under `key`, returning whether it was present.
    pub fn remove(&mut self, key: &K, id: EntityId) -> bool {
        let Some(ids) = self.entries.get_mut(key) else {
            return false;
        };
        let removed = ids.remove(&id);
        if ids.is_empty() {
            self.entries.remove(key);
        }
        if removed {
            self.count -= 1;
        }
        removed
    }

    /// Returns the ids stored under `key`.
    pub fn get(&self, key: &K) -> impl Iterator<Item = EntityId> + '_ {
        self.entries.get(key).into_iter().flatten().copied()
    }

    /// Returns true if any id is stored under `key`.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns ids with keys in `range`, in ascending key order.
    pub fn range<R>(&self, range: R) -> Vec<EntityId>
    where
        R: RangeBounds<K>,
    {
        self.entries
            .range(range)
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect()
    }

    /// Iterates all entries in ascending key order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&K, EntityId)> + '_ {
        self.entries
            .iter()
            .flat_map(|(key, ids)| ids.iter().map(move |id| (key, *id)))
    }

    /// Total number of (key, id) pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Ordered unique index from a key to exactly one entity id.
#[derive(Debug, Clone)]
pub struct UniqueIndex<K: Ord + Clone> {
    entries: BTreeMap<K, EntityId>,
}

impl<K: Ord + Clone> Default for UniqueIndex<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone> UniqueIndex<K> {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Returns the id held under `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<EntityId> {
        self.entries.get(key).copied()
    }

    /// Checks that `id` may be stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if a different id already holds the key.
    pub fn check(&self, key: &K, id: EntityId) -> CoreResult<()> {
        match self.entries.get(key) {
            Some(existing) if *existing != id => Err(CoreError::invalid_operation(format!(
                "unique key already held by {existing}"
            ))),
            _ => Ok(()),
        }
    }

    /// Stores `id` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if a different id already holds the key.
    pub fn insert(&mut self, key: K, id: EntityId) -> CoreResult<()> {
        self.check(&key, id)?;
        self.entries.insert(key, id);
        Ok(())
    }

    /// Removes `key` if it is held by `id`.
    pub fn remove(&mut self, key: &K, id: EntityId) -> bool {
        if self.entries.get(key) == Some(&id) {
            self.entries.remove(key);
            true
        } else {
            false
        }
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> EntityId {
        EntityId::from_bytes([n; 16])
    }

    #[test]
    fn multi_insert_and_get() {
        let mut index = MultiIndex::new();
        index.insert(10, id(1));
        index.insert(10, id(2));
        index.insert(20, id(3));
        index.insert(10, id(1));

        assert_eq!(index.len(), 3);
        assert_eq!(index.get(&10).collect::<Vec<_>>(), vec![id(1), id(2)]);
        assert_eq!(index.get(&30).count(), 0);
    }

    #[test]
    fn multi_remove_cleans_empty_keys() {
        let mut index = MultiIndex::new();
        index.insert("a", id(1));
        assert!(index.remove(&"a", id(1)));
        assert!(!index.remove(&"a", id(1)));
        assert!(!index.contains_key(&"a"));
        assert!(index.is_empty());
    }

    #[test]
    fn multi_range_and_reverse() {
        let mut index = MultiIndex::new();
        for n in 1..=5u8 {
            index.insert(i64::from(n), id(n));
        }
        let mid = index.range(2..=4);
        assert_eq!(mid, vec![id(2), id(3), id(4)]);

        let newest: Vec<_> = index.iter().rev().take(2).map(|(k, _)| *k).collect();
        assert_eq!(newest, vec![5, 4]);
    }

    #[test]
    fn unique_rejects_second_holder() {
        let mut index = UniqueIndex::new();
        index.insert("k", id(1)).unwrap();
        index.insert("k", id(1)).unwrap();
        assert!(index.insert("k", id(2)).is_err());
        assert_eq!(index.get(&"k"), Some(id(1)));

        assert!(!index.remove(&"k", id(2)));
        assert!(index.remove(&"k", id(1)));
        index.insert("k", id(2)).unwrap();
        assert_eq!(index.len(), 1);
    }
}
