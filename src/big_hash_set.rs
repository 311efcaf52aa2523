use core::fmt::Debug;

use crate::big_array::SEGMENT_SHIFT;
use crate::big_table;
use crate::big_table::BigHashTable;
use crate::error::ConfigError;
use crate::error::CursorError;
use crate::key::Key;
use crate::key::Natural;
use crate::key::Strategy;

/// A hash set over the segmented [`BigHashTable`], with a 64-bit length.
///
/// ```rust
/// use shift_hash::BigHashSet;
///
/// let mut set: BigHashSet<u64> = BigHashSet::new();
/// assert!(set.insert(10));
/// assert!(!set.insert(10));
/// assert_eq!(set.len(), 1u64);
/// ```
#[derive(Clone)]
pub struct BigHashSet<K: Key, S = Natural, const SHIFT: u32 = SEGMENT_SHIFT> {
    table: BigHashTable<K, (), S, SHIFT>,
}

impl<K, S, const SHIFT: u32> PartialEq for BigHashSet<K, S, SHIFT>
where
    K: Key,
    S: Strategy<K>,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|k| other.contains(k))
    }
}

impl<K, S, const SHIFT: u32> Eq for BigHashSet<K, S, SHIFT>
where
    K: Key,
    S: Strategy<K>,
{
}

impl<K, S, const SHIFT: u32> Debug for BigHashSet<K, S, SHIFT>
where
    K: Key + Debug,
    S: Strategy<K>,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K, S, const SHIFT: u32> BigHashSet<K, S, SHIFT>
where
    K: Key,
    S: Strategy<K> + Default,
{
    /// Creates an empty set sized for the default initial size.
    pub fn new() -> Self {
        Self {
            table: BigHashTable::new(),
        }
    }

    /// Creates an empty set that holds `expected` keys without growing.
    pub fn with_capacity(expected: u64) -> Self {
        Self {
            table: BigHashTable::with_capacity(expected),
        }
    }

    /// Creates an empty set for `expected` keys at load factor `f`.
    pub fn with_capacity_and_load_factor(expected: u64, f: f32) -> Self {
        Self {
            table: BigHashTable::with_capacity_and_load_factor(expected, f),
        }
    }
}

impl<K, S, const SHIFT: u32> BigHashSet<K, S, SHIFT>
where
    K: Key,
    S: Strategy<K>,
{
    /// Creates an empty set with a custom key strategy.
    pub fn with_strategy(strategy: S) -> Self {
        Self {
            table: BigHashTable::with_strategy(strategy),
        }
    }

    /// Creates an empty set with a custom key strategy, reporting bad
    /// parameters instead of panicking.
    pub fn try_with_capacity_and_strategy(
        expected: u64,
        f: f32,
        strategy: S,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            table: BigHashTable::try_with_capacity_and_strategy(expected, f, strategy)?,
        })
    }

    /// Returns the number of keys.
    pub fn len(&self) -> u64 {
        self.table.len()
    }

    /// Returns `true` if the set contains no keys.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of keys the set holds before it grows.
    pub fn capacity(&self) -> u64 {
        self.table.capacity()
    }

    /// Returns the number of slots of the underlying table.
    pub fn slot_count(&self) -> u64 {
        self.table.slot_count()
    }

    /// Removes every key, keeping the capacity.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Shrinks the set to the smallest capacity that holds its keys. Returns
    /// `false` if the allocation failed.
    pub fn trim(&mut self) -> bool {
        self.table.trim()
    }

    /// Shrinks the set to the capacity needed for `target` keys. Returns
    /// `false` if the allocation failed.
    pub fn trim_to(&mut self, target: u64) -> bool {
        self.table.trim_to(target)
    }

    /// Adds a key. Returns `true` if it was not present.
    pub fn insert(&mut self, key: K) -> bool {
        if self.table.contains_key(&key) {
            return false;
        }
        self.table.insert(key, ());
        true
    }

    /// Returns `true` if the set contains `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.table.contains_key(key)
    }

    /// Returns the stored key equivalent to `key`.
    pub fn get(&self, key: &K) -> Option<&K> {
        self.table.get_key_value(key).map(|(k, _)| k)
    }

    /// Removes a key. Returns `true` if it was present.
    pub fn remove(&mut self, key: &K) -> bool {
        self.table.remove(key).is_some()
    }

    /// Removes and returns the stored key equivalent to `key`.
    pub fn take(&mut self, key: &K) -> Option<K> {
        self.table.remove_entry(key).map(|(k, ())| k)
    }

    /// Returns an iterator over the keys.
    pub fn iter(&self) -> impl Iterator<Item = &K> + '_ {
        self.table.keys()
    }

    /// Returns a cursor that can remove the key it just yielded.
    pub fn cursor(&mut self) -> Cursor<'_, K, S, SHIFT>
    where
        K: Clone,
    {
        Cursor {
            inner: self.table.cursor(),
        }
    }

    /// Keeps only the keys for which `f` returns `true`.
    pub fn retain(&mut self, mut f: impl FnMut(&K) -> bool)
    where
        K: Clone,
    {
        self.table.retain(|k, _| f(k));
    }
}

impl<K, S, const SHIFT: u32> Default for BigHashSet<K, S, SHIFT>
where
    K: Key,
    S: Strategy<K> + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, S, const SHIFT: u32> Extend<K> for BigHashSet<K, S, SHIFT>
where
    K: Key,
    S: Strategy<K>,
{
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        self.table.extend(iter.into_iter().map(|k| (k, ())));
    }
}

impl<K, S, const SHIFT: u32> FromIterator<K> for BigHashSet<K, S, SHIFT>
where
    K: Key,
    S: Strategy<K> + Default,
{
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self {
            table: iter.into_iter().map(|k| (k, ())).collect(),
        }
    }
}

impl<K: Key, S: Strategy<K>, const SHIFT: u32> IntoIterator for BigHashSet<K, S, SHIFT> {
    type IntoIter = IntoIter<K, S, SHIFT>;
    type Item = K;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            inner: self.table.into_iter(),
        }
    }
}

/// An owning iterator over the keys of a [`BigHashSet`].
pub struct IntoIter<K: Key, S, const SHIFT: u32> {
    inner: big_table::IntoIter<K, (), S, SHIFT>,
}

impl<K: Key, S: Strategy<K>, const SHIFT: u32> Iterator for IntoIter<K, S, SHIFT> {
    type Item = K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, ())| k)
    }
}

/// A removal-aware traversal of a [`BigHashSet`].
pub struct Cursor<'a, K: Key, S, const SHIFT: u32> {
    inner: big_table::Cursor<'a, K, (), S, SHIFT>,
}

impl<K: Key + Clone, S: Strategy<K>, const SHIFT: u32> Cursor<'_, K, S, SHIFT> {
    /// Returns `true` if [`next`](Self::next) will yield a key.
    pub fn has_next(&self) -> bool {
        self.inner.has_next()
    }

    /// Advances to the next key.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&K> {
        self.inner.next().map(|(k, _)| k)
    }

    /// Removes the key returned by the last call to [`next`](Self::next).
    pub fn remove(&mut self) -> Result<K, CursorError> {
        self.inner.remove().map(|(k, ())| k)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;
    use std::collections::HashSet as StdHashSet;

    use rand::Rng;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    type Small<K> = BigHashSet<K, Natural, 4>;

    #[test]
    fn insert_contains_remove() {
        let mut set: Small<u64> = Small::with_capacity(10);
        assert!(set.insert(0));
        assert!(set.insert(42));
        assert!(!set.insert(42));
        assert_eq!(set.len(), 2);
        assert!(set.contains(&0));
        assert_eq!(set.get(&42), Some(&42));
        assert!(set.remove(&42));
        assert!(!set.remove(&42));
        assert_eq!(set.take(&0), Some(0));
        assert!(set.is_empty());
    }

    #[test]
    fn random_operations_match_std() {
        let mut rng = SmallRng::seed_from_u64(11);
        let mut set: Small<u32> = Small::new();
        let mut model = StdHashSet::new();
        for _ in 0..10_000 {
            let k = rng.random_range(0..500);
            if rng.random_bool(0.6) {
                assert_eq!(set.insert(k), model.insert(k));
            } else {
                assert_eq!(set.remove(&k), model.remove(&k));
            }
        }
        assert_eq!(set.len(), model.len() as u64);
        let mut a: Vec<u32> = set.iter().copied().collect();
        let mut b: Vec<u32> = model.into_iter().collect();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
    }

    #[test]
    fn cursor_and_retain() {
        let mut set: Small<u32> = (0..300).collect();
        let mut cursor = set.cursor();
        while let Some(&k) = cursor.next() {
            if k >= 200 {
                assert_eq!(cursor.remove(), Ok(k));
            }
        }
        assert_eq!(set.len(), 200);
        set.retain(|k| k % 2 == 0);
        assert_eq!(set.len(), 100);
        assert!(set.iter().all(|k| k % 2 == 0 && *k < 200));

        let same: Small<u32> = (0..100).map(|k| k * 2).collect();
        assert_eq!(set, same);
        assert!(set.trim());
        assert_eq!(set.slot_count(), 256);
    }
}
