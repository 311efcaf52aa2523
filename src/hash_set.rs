use core::fmt::Debug;
use core::iter::FusedIterator;

use crate::error::ConfigError;
use crate::error::CursorError;
use crate::hash_table;
use crate::hash_table::Entry;
use crate::hash_table::HashTable;
use crate::key::Key;
use crate::key::Natural;
use crate::key::Strategy;

/// A hash set backed by the linear-probing [`HashTable`].
///
/// `HashSet<K, S>` stores keys of type `K` and decides equivalence with the
/// strategy `S`. The underlying table stores no values (`V = ()`), so the
/// set costs one key slot per bucket.
#[derive(Clone)]
pub struct HashSet<K: Key, S = Natural> {
    table: HashTable<K, (), S>,
}

impl<K, S> PartialEq for HashSet<K, S>
where
    K: Key,
    S: Strategy<K>,
{
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter().all(|v| other.contains(v))
    }
}

impl<K, S> Eq for HashSet<K, S>
where
    K: Key,
    S: Strategy<K>,
{
}

impl<K, S> Debug for HashSet<K, S>
where
    K: Key + Debug,
    S: Strategy<K>,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K, S> HashSet<K, S>
where
    K: Key,
    S: Strategy<K> + Default,
{
    /// Creates an empty set sized for the default initial size.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shift_hash::HashSet;
    ///
    /// let set: HashSet<i32> = HashSet::new();
    /// assert!(set.is_empty());
    /// ```
    pub fn new() -> Self {
        Self {
            table: HashTable::new(),
        }
    }

    /// Creates an empty set that holds `expected` keys without growing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shift_hash::HashSet;
    ///
    /// let set: HashSet<i32> = HashSet::with_capacity(100);
    /// assert!(set.capacity() >= 100);
    /// ```
    pub fn with_capacity(expected: usize) -> Self {
        Self {
            table: HashTable::with_capacity(expected),
        }
    }

    /// Creates an empty set for `expected` keys at load factor `f`.
    ///
    /// # Panics
    ///
    /// Panics if `f` is not in `(0, 1]`.
    pub fn with_capacity_and_load_factor(expected: usize, f: f32) -> Self {
        Self {
            table: HashTable::with_capacity_and_load_factor(expected, f),
        }
    }
}

impl<K, S> HashSet<K, S>
where
    K: Key,
    S: Strategy<K>,
{
    /// Creates an empty set with a custom key strategy.
    pub fn with_strategy(strategy: S) -> Self {
        Self {
            table: HashTable::with_strategy(strategy),
        }
    }

    /// Creates an empty set with a custom key strategy, sized for `expected`
    /// keys at load factor `f`.
    ///
    /// # Panics
    ///
    /// Panics if `f` is not in `(0, 1]`.
    pub fn with_capacity_and_strategy(expected: usize, f: f32, strategy: S) -> Self {
        Self {
            table: HashTable::with_capacity_and_strategy(expected, f, strategy),
        }
    }

    /// Fallible version of
    /// [`with_capacity_and_strategy`](Self::with_capacity_and_strategy).
    pub fn try_with_capacity_and_strategy(
        expected: usize,
        f: f32,
        strategy: S,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            table: HashTable::try_with_capacity_and_strategy(expected, f, strategy)?,
        })
    }

    /// Returns the number of keys in the set.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shift_hash::HashSet;
    ///
    /// let mut set: HashSet<i32> = HashSet::new();
    /// assert_eq!(set.len(), 0);
    /// set.insert(0);
    /// assert_eq!(set.len(), 1);
    /// ```
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the set contains no keys.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of keys the set holds before it grows.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Returns the number of slots of the underlying table.
    pub fn slot_count(&self) -> usize {
        self.table.slot_count()
    }

    /// Returns the key strategy.
    pub fn strategy(&self) -> &S {
        self.table.strategy()
    }

    /// Removes every key, keeping the capacity.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Grows the set so it can take `additional` more keys without
    /// rehashing.
    pub fn reserve(&mut self, additional: usize) {
        self.table.reserve(additional);
    }

    /// Shrinks the set to the smallest capacity that holds its keys. Returns
    /// `false` if the allocation failed.
    pub fn trim(&mut self) -> bool {
        self.table.trim()
    }

    /// Shrinks the set to the capacity needed for `target` keys. Returns
    /// `false` if the allocation failed.
    pub fn trim_to(&mut self, target: usize) -> bool {
        self.table.trim_to(target)
    }

    /// Adds a key to the set. Returns `true` if it was not present.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shift_hash::HashSet;
    ///
    /// let mut set: HashSet<i32> = HashSet::new();
    /// assert!(set.insert(2));
    /// assert!(!set.insert(2));
    /// ```
    pub fn insert(&mut self, key: K) -> bool {
        match self.table.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(());
                true
            }
        }
    }

    /// Adds a key, replacing and returning an equivalent stored key.
    pub fn replace(&mut self, key: K) -> Option<K> {
        match self.table.replace_key(key) {
            Ok(old) => Some(old),
            Err(key) => {
                self.table.insert(key, ());
                None
            }
        }
    }

    /// Returns `true` if the set contains `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.table.contains_key(key)
    }

    /// Returns the stored key equivalent to `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shift_hash::HashSet;
    /// use shift_hash::key::FnStrategy;
    ///
    /// let nocase = FnStrategy::new(
    ///     |s: &String| s.to_ascii_lowercase().len() as u64,
    ///     |a: &String, b: &String| a.eq_ignore_ascii_case(b),
    /// );
    /// let mut set = HashSet::with_strategy(nocase);
    /// set.insert("Rust".to_string());
    /// assert_eq!(set.get(&"RUST".to_string()).map(String::as_str), Some("Rust"));
    /// ```
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
    pub fn iter(&self) -> Iter<'_, K> {
        Iter {
            inner: self.table.keys(),
        }
    }

    /// Removes and yields every key, keeping the capacity.
    pub fn drain(&mut self) -> Drain<'_, K, S> {
        Drain {
            inner: self.table.drain(),
        }
    }

    /// Returns a cursor that can remove the key it just yielded. See
    /// [`HashTable::cursor`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shift_hash::HashSet;
    ///
    /// let mut set: HashSet<u32> = (1..=9).collect();
    /// let mut cursor = set.cursor();
    /// while let Some(&k) = cursor.next() {
    ///     if k > 3 {
    ///         cursor.remove().unwrap();
    ///     }
    /// }
    /// assert_eq!(set.len(), 3);
    /// ```
    pub fn cursor(&mut self) -> Cursor<'_, K, S>
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

    /// Returns `true` if every key of `self` is in `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        self.len() <= other.len() && self.iter().all(|k| other.contains(k))
    }
}

impl<K, S> Default for HashSet<K, S>
where
    K: Key,
    S: Strategy<K> + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, S> Extend<K> for HashSet<K, S>
where
    K: Key,
    S: Strategy<K>,
{
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        self.table.extend(iter.into_iter().map(|k| (k, ())));
    }
}

impl<K, S> FromIterator<K> for HashSet<K, S>
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

impl<'a, K: Key, S: Strategy<K>> IntoIterator for &'a HashSet<K, S> {
    type IntoIter = Iter<'a, K>;
    type Item = &'a K;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Key, S: Strategy<K>> IntoIterator for HashSet<K, S> {
    type IntoIter = IntoIter<K, S>;
    type Item = K;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            inner: self.table.into_iter(),
        }
    }
}

/// An iterator over the keys of a [`HashSet`].
pub struct Iter<'a, K> {
    inner: hash_table::Keys<'a, K, ()>,
}

impl<'a, K: Key> Iterator for Iter<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K: Key> ExactSizeIterator for Iter<'_, K> {}
impl<K: Key> FusedIterator for Iter<'_, K> {}

/// A draining iterator over the keys of a [`HashSet`].
pub struct Drain<'a, K: Key, S> {
    inner: hash_table::Drain<'a, K, (), S>,
}

impl<K: Key, S: Strategy<K>> Iterator for Drain<'_, K, S> {
    type Item = K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, ())| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// An owning iterator over the keys of a [`HashSet`].
pub struct IntoIter<K: Key, S> {
    inner: hash_table::IntoIter<K, (), S>,
}

impl<K: Key, S: Strategy<K>> Iterator for IntoIter<K, S> {
    type Item = K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, ())| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// A removal-aware traversal of a [`HashSet`].
pub struct Cursor<'a, K: Key, S> {
    inner: hash_table::Cursor<'a, K, (), S>,
}

impl<K: Key + Clone, S: Strategy<K>> Cursor<'_, K, S> {
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
    ///
    /// # Errors
    ///
    /// Returns [`CursorError::NoCurrentEntry`] if `next` has not yielded a
    /// key since the last removal.
    pub fn remove(&mut self) -> Result<K, CursorError> {
        self.inner.remove().map(|(k, ())| k)
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec::Vec;
    use core::hash::Hasher;
    use std::collections::HashSet as StdHashSet;

    use rand::Rng;
    use rand::SeedableRng;
    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use rand::rngs::SmallRng;
    use siphasher::sip::SipHasher;

    use super::*;

    #[derive(Clone)]
    struct SipStrategy {
        k1: u64,
        k2: u64,
    }

    impl Strategy<String> for SipStrategy {
        fn hash(&self, key: &String) -> u64 {
            let mut hasher = SipHasher::new_with_keys(self.k1, self.k2);
            hasher.write(key.as_bytes());
            hasher.finish()
        }

        fn equals(&self, a: &String, b: &String) -> bool {
            a == b
        }
    }

    impl Default for SipStrategy {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k1: rng.try_next_u64().unwrap_or(0),
                k2: rng.try_next_u64().unwrap_or(0),
            }
        }
    }

    #[test]
    fn test_new_and_with_strategy() {
        let set: HashSet<String, SipStrategy> = HashSet::new();
        assert!(set.is_empty());

        let set2 = HashSet::<String, _>::with_strategy(SipStrategy::default());
        assert_eq!(set2.len(), 0);
        assert!(HashSet::<u32>::try_with_capacity_and_strategy(8, 0.0, Natural).is_err());
    }

    #[test]
    fn test_insert_contains_remove() {
        let mut set = HashSet::with_strategy(SipStrategy::default());
        assert!(set.insert("a".to_string()));
        assert!(set.insert(String::new()));
        assert!(!set.insert("a".to_string()));
        assert_eq!(set.len(), 2);

        assert!(set.contains(&"a".to_string()));
        assert!(set.contains(&String::new()));
        assert!(!set.contains(&"b".to_string()));

        assert!(set.remove(&"a".to_string()));
        assert!(!set.remove(&"a".to_string()));
        assert_eq!(set.take(&String::new()), Some(String::new()));
        assert!(set.is_empty());
    }

    #[test]
    fn test_get_and_replace_keep_stored_key() {
        let nocase = crate::key::FnStrategy::new(
            |s: &String| {
                let mut hasher = SipHasher::new();
                for b in s.bytes() {
                    hasher.write_u8(b.to_ascii_lowercase());
                }
                hasher.finish()
            },
            |a: &String, b: &String| a.eq_ignore_ascii_case(b),
        );
        let mut set = HashSet::with_strategy(nocase);
        set.insert("Key".to_string());
        assert_eq!(set.get(&"KEY".to_string()).map(String::as_str), Some("Key"));
        assert_eq!(set.replace("kEy".to_string()), Some("Key".to_string()));
        assert_eq!(set.get(&"key".to_string()).map(String::as_str), Some("kEy"));
        assert_eq!(set.len(), 1);
        assert_eq!(set.replace("other".to_string()), None);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_replace_keeps_geometry() {
        let mut set: HashSet<u32> = HashSet::with_capacity_and_load_factor(4, 0.75);
        set.extend(1..=6);
        assert_eq!(set.slot_count(), 16);
        for k in 4..=6 {
            assert!(set.remove(&k));
        }
        // Three keys left: one more removal would halve the table.
        assert_eq!(set.slot_count(), 16);
        for k in 1..=3 {
            assert_eq!(set.replace(k), Some(k));
            assert_eq!(set.slot_count(), 16);
        }
        assert_eq!(set.len(), 3);
        assert!((1..=3).all(|k| set.contains(&k)));
    }

    #[test]
    fn test_equality() {
        let a: HashSet<u32> = (0..100).collect();
        let mut b: HashSet<u32> = HashSet::with_capacity(1);
        b.extend((0..100).rev());
        assert_eq!(a, b);
        assert!(a.is_subset(&b));

        b.remove(&0);
        assert_ne!(a, b);
        assert!(b.is_subset(&a));
        assert!(!a.is_subset(&b));
    }

    #[test]
    fn test_cursor_every_third() {
        let mut set: HashSet<u32> = (1..=100).collect();
        let mut removed = StdHashSet::new();
        let mut cursor = set.cursor();
        let mut i = 0;
        while cursor.has_next() {
            let k = *cursor.next().unwrap();
            i += 1;
            if i % 3 == 0 {
                assert_eq!(cursor.remove(), Ok(k));
                assert_eq!(cursor.remove(), Err(CursorError::NoCurrentEntry));
                removed.insert(k);
            }
        }
        assert!(cursor.next().is_none());
        assert_eq!(removed.len(), 33);
        assert_eq!(set.len(), 67);
        for k in 1..=100 {
            assert_eq!(set.contains(&k), !removed.contains(&k));
        }
    }

    #[test]
    fn test_retain_drain_into_iter() {
        let mut set: HashSet<u64> = (0..1000).collect();
        set.retain(|k| k % 10 == 0);
        assert_eq!(set.len(), 100);

        let mut drained: Vec<u64> = set.drain().collect();
        drained.sort_unstable();
        assert_eq!(drained, (0..100).map(|k| k * 10).collect::<Vec<_>>());
        assert!(set.is_empty());

        set.extend([3, 1, 2]);
        let mut items: Vec<u64> = set.into_iter().collect();
        items.sort_unstable();
        assert_eq!(items, [1, 2, 3]);
    }

    #[test]
    fn test_debug() {
        let mut set: HashSet<u8> = HashSet::new();
        set.insert(4);
        assert_eq!(std::format!("{set:?}"), "{4}");
    }

    #[test]
    fn test_random_operations_match_std() {
        let mut rng = SmallRng::seed_from_u64(77);
        let mut set: HashSet<i64> = HashSet::with_capacity(0);
        let mut model = StdHashSet::new();
        for _ in 0..20_000 {
            let k = rng.random_range(-200..200);
            if rng.random_bool(0.5) {
                assert_eq!(set.insert(k), model.insert(k));
            } else {
                assert_eq!(set.remove(&k), model.remove(&k));
            }
        }
        assert_eq!(set.len(), model.len());
        assert!(model.iter().all(|k| set.contains(k)));
        assert_eq!(set.iter().count(), model.len());
    }

    #[test]
    fn test_trim_after_mass_removal() {
        let mut set: HashSet<u32> = HashSet::with_capacity(4096);
        set.extend(0..4096);
        for k in 16..4096 {
            set.remove(&k);
        }
        // Automatic shrinking stops at the construction capacity.
        assert_eq!(set.slot_count(), 8192);
        assert!(set.trim());
        assert_eq!(set.slot_count(), 32);
        assert!((0..16).all(|k| set.contains(&k)));
    }
}
