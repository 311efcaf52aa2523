use core::fmt::Debug;
use core::ops::Add;
use core::ops::Index;

use crate::error::ConfigError;
use crate::hash_table::Cursor;
use crate::hash_table::Drain;
use crate::hash_table::Entry;
use crate::hash_table::HashTable;
use crate::hash_table::IntoIter;
use crate::hash_table::Iter;
use crate::hash_table::IterMut;
use crate::hash_table::Keys;
use crate::hash_table::Values;
use crate::hash_table::ValuesMut;
use crate::key::Key;
use crate::key::Natural;
use crate::key::Strategy;

/// A hash map backed by the linear-probing [`HashTable`].
///
/// On top of the table it carries a *default return value*: the value
/// [`get_or_default`](Self::get_or_default) reports for absent keys and the
/// base [`add_to`](Self::add_to) counts from.
///
/// # Performance Characteristics
///
/// - **Memory**: one key and one value slot per bucket, no metadata bytes.
/// - **Lookups**: a single linear probe from the home slot; removals shift
///   entries back, so probe sequences never accumulate tombstones.
#[derive(Clone)]
pub struct HashMap<K: Key, V, S = Natural> {
    table: HashTable<K, V, S>,
    default_return_value: Option<V>,
}

impl<K, V, S> Debug for HashMap<K, V, S>
where
    K: Key + Debug,
    V: Debug,
    S: Strategy<K>,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut map = f.debug_map();
        for (k, v) in self.iter() {
            map.entry(k, v);
        }
        map.finish()
    }
}

impl<K, V, S> PartialEq for HashMap<K, V, S>
where
    K: Key,
    V: PartialEq,
    S: Strategy<K>,
{
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Key,
    S: Strategy<K> + Default,
{
    /// Creates an empty map sized for the default initial size.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shift_hash::HashMap;
    ///
    /// let map: HashMap<i32, String> = HashMap::new();
    /// assert!(map.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::from_table(HashTable::new())
    }

    /// Creates an empty map that holds `expected` entries without growing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shift_hash::HashMap;
    ///
    /// let map: HashMap<i32, String> = HashMap::with_capacity(100);
    /// assert!(map.capacity() >= 100);
    /// ```
    pub fn with_capacity(expected: usize) -> Self {
        Self::from_table(HashTable::with_capacity(expected))
    }

    /// Creates an empty map for `expected` entries at load factor `f`.
    ///
    /// # Panics
    ///
    /// Panics if `f` is not in `(0, 1]`.
    pub fn with_capacity_and_load_factor(expected: usize, f: f32) -> Self {
        Self::from_table(HashTable::with_capacity_and_load_factor(expected, f))
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Key,
    S: Strategy<K>,
{
    fn from_table(table: HashTable<K, V, S>) -> Self {
        Self {
            table,
            default_return_value: None,
        }
    }

    /// Creates an empty map with a custom key strategy.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shift_hash::HashMap;
    /// use shift_hash::key::FnStrategy;
    ///
    /// let by_length = FnStrategy::new(|s: &String| s.len() as u64, |a: &String, b: &String| a.len() == b.len());
    /// let mut map = HashMap::with_strategy(by_length);
    /// map.insert("abc".to_string(), 1);
    /// assert_eq!(map.get(&"xyz".to_string()), Some(&1));
    /// ```
    pub fn with_strategy(strategy: S) -> Self {
        Self::from_table(HashTable::with_strategy(strategy))
    }

    /// Creates an empty map with a custom key strategy, sized for `expected`
    /// entries at load factor `f`.
    ///
    /// # Panics
    ///
    /// Panics if `f` is not in `(0, 1]`.
    pub fn with_capacity_and_strategy(expected: usize, f: f32, strategy: S) -> Self {
        Self::from_table(HashTable::with_capacity_and_strategy(expected, f, strategy))
    }

    /// Fallible version of
    /// [`with_capacity_and_strategy`](Self::with_capacity_and_strategy).
    pub fn try_with_capacity_and_strategy(
        expected: usize,
        f: f32,
        strategy: S,
    ) -> Result<Self, ConfigError> {
        HashTable::try_with_capacity_and_strategy(expected, f, strategy).map(Self::from_table)
    }

    /// Returns the number of entries in the map.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map contains no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of entries the map holds before it grows.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Returns the number of slots of the underlying table.
    pub fn slot_count(&self) -> usize {
        self.table.slot_count()
    }

    /// Returns the load factor.
    pub fn load_factor(&self) -> f32 {
        self.table.load_factor()
    }

    /// Returns the key strategy.
    pub fn strategy(&self) -> &S {
        self.table.strategy()
    }

    /// Returns the value reported for absent keys, if one was set.
    pub fn default_return_value(&self) -> Option<&V> {
        self.default_return_value.as_ref()
    }

    /// Sets the value reported for absent keys.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shift_hash::HashMap;
    ///
    /// let mut map: HashMap<u32, i64> = HashMap::new();
    /// map.set_default_return_value(-1);
    /// assert_eq!(map.get_or_default(&7), Some(&-1));
    /// assert_eq!(map.get(&7), None);
    /// ```
    pub fn set_default_return_value(&mut self, value: V) {
        self.default_return_value = Some(value);
    }

    /// Returns the value for `key`, or the default return value if the key is
    /// absent.
    pub fn get_or_default(&self, key: &K) -> Option<&V> {
        self.table.get(key).or(self.default_return_value.as_ref())
    }

    /// Removes every entry, keeping the capacity.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Grows the map so it can take `additional` more entries without
    /// rehashing.
    pub fn reserve(&mut self, additional: usize) {
        self.table.reserve(additional);
    }

    /// Shrinks the map to the smallest capacity that holds its entries.
    /// Returns `false` if the allocation failed.
    pub fn trim(&mut self) -> bool {
        self.table.trim()
    }

    /// Shrinks the map to the capacity needed for `target` entries. Returns
    /// `false` if the allocation failed.
    pub fn trim_to(&mut self, target: usize) -> bool {
        self.table.trim_to(target)
    }

    /// Inserts a key-value pair, returning the previous value for the key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shift_hash::HashMap;
    ///
    /// let mut map = HashMap::<u32, &str>::new();
    /// assert_eq!(map.insert(37, "a"), None);
    /// assert_eq!(map.insert(37, "b"), Some("a"));
    /// assert_eq!(map[&37], "b");
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.table.insert(key, value)
    }

    /// Inserts `value` only if `key` is absent. Returns the existing value
    /// otherwise, leaving it untouched.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shift_hash::HashMap;
    ///
    /// let mut map = HashMap::<u32, &str>::new();
    /// assert_eq!(map.put_if_absent(1, "first"), None);
    /// assert_eq!(map.put_if_absent(1, "second"), Some(&"first"));
    /// ```
    pub fn put_if_absent(&mut self, key: K, value: V) -> Option<&V> {
        match self.table.entry(key) {
            Entry::Occupied(entry) => Some(&*entry.into_mut()),
            Entry::Vacant(entry) => {
                entry.insert(value);
                None
            }
        }
    }

    /// Replaces the value for `key` only if it is present, returning the old
    /// value.
    pub fn replace(&mut self, key: &K, value: V) -> Option<V> {
        self.table
            .get_mut(key)
            .map(|slot| core::mem::replace(slot, value))
    }

    /// Adds `increment` to the value for `key` and returns the value before
    /// the addition.
    ///
    /// An absent key starts from the default return value, or from
    /// `V::default()` when none was set.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shift_hash::HashMap;
    ///
    /// let mut counts: HashMap<char, u32> = HashMap::new();
    /// for c in "mississippi".chars() {
    ///     counts.add_to(c, 1);
    /// }
    /// assert_eq!(counts[&'s'], 4);
    /// assert_eq!(counts.add_to('m', 10), 1);
    /// assert_eq!(counts[&'m'], 11);
    /// ```
    pub fn add_to(&mut self, key: K, increment: V) -> V
    where
        V: Copy + Add<Output = V> + Default,
    {
        let base = self.default_return_value.unwrap_or_default();
        match self.table.entry(key) {
            Entry::Occupied(mut entry) => {
                let old = *entry.get();
                entry.insert(old + increment);
                old
            }
            Entry::Vacant(entry) => {
                entry.insert(base + increment);
                base
            }
        }
    }

    /// Returns the value stored for `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.table.get(key)
    }

    /// Returns a mutable reference to the value stored for `key`.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.table.get_mut(key)
    }

    /// Returns the stored key and value for `key`.
    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        self.table.get_key_value(key)
    }

    /// Returns `true` if the map contains `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.table.contains_key(key)
    }

    /// Returns `true` if some entry holds `value`. This is a full scan.
    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.table.values().any(|v| v == value)
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.table.remove(key)
    }

    /// Removes `key`, returning the stored key and its value.
    pub fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        self.table.remove_entry(key)
    }

    /// Gets the entry for `key` for in-place manipulation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shift_hash::HashMap;
    ///
    /// let mut map: HashMap<u32, Vec<u32>> = HashMap::new();
    /// for n in 0..10 {
    ///     map.entry(n % 3).or_default().push(n);
    /// }
    /// assert_eq!(map[&1], vec![1, 4, 7]);
    /// ```
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V, S> {
        self.table.entry(key)
    }

    /// Returns an iterator over the entries.
    pub fn iter(&self) -> Iter<'_, K, V> {
        self.table.iter()
    }

    /// Returns an iterator with mutable access to the values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        self.table.iter_mut()
    }

    /// Returns an iterator over the keys.
    pub fn keys(&self) -> Keys<'_, K, V> {
        self.table.keys()
    }

    /// Returns an iterator over the values.
    pub fn values(&self) -> Values<'_, K, V> {
        self.table.values()
    }

    /// Returns an iterator over mutable references to the values.
    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        self.table.values_mut()
    }

    /// Removes and yields every entry, keeping the capacity.
    pub fn drain(&mut self) -> Drain<'_, K, V, S> {
        self.table.drain()
    }

    /// Returns a cursor that can remove the entry it just yielded. See
    /// [`HashTable::cursor`].
    pub fn cursor(&mut self) -> Cursor<'_, K, V, S>
    where
        K: Clone,
    {
        self.table.cursor()
    }

    /// Keeps only the entries for which `f` returns `true`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shift_hash::HashMap;
    ///
    /// let mut map: HashMap<u32, u32> = (0..8).map(|x| (x, x * 10)).collect();
    /// map.retain(|&k, _| k % 2 == 0);
    /// assert_eq!(map.len(), 4);
    /// ```
    pub fn retain(&mut self, f: impl FnMut(&K, &mut V) -> bool)
    where
        K: Clone,
    {
        self.table.retain(f);
    }
}

impl<K, V, S> Default for HashMap<K, V, S>
where
    K: Key,
    S: Strategy<K> + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> Index<&K> for HashMap<K, V, S>
where
    K: Key,
    S: Strategy<K>,
{
    type Output = V;

    /// # Panics
    ///
    /// Panics if the key is absent.
    fn index(&self, key: &K) -> &V {
        match self.get(key) {
            Some(value) => value,
            None => panic!("key not found in HashMap"),
        }
    }
}

impl<K, V, S> Extend<(K, V)> for HashMap<K, V, S>
where
    K: Key,
    S: Strategy<K>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.table.extend(iter);
    }
}

impl<K, V, S> FromIterator<(K, V)> for HashMap<K, V, S>
where
    K: Key,
    S: Strategy<K> + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_table(iter.into_iter().collect())
    }
}

impl<'a, K: Key, V, S: Strategy<K>> IntoIterator for &'a HashMap<K, V, S> {
    type IntoIter = Iter<'a, K, V>;
    type Item = (&'a K, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K: Key, V, S: Strategy<K>> IntoIterator for &'a mut HashMap<K, V, S> {
    type IntoIter = IterMut<'a, K, V>;
    type Item = (&'a K, &'a mut V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<K: Key, V, S: Strategy<K>> IntoIterator for HashMap<K, V, S> {
    type IntoIter = IntoIter<K, V, S>;
    type Item = (K, V);

    fn into_iter(self) -> Self::IntoIter {
        self.table.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec::Vec;
    use core::hash::Hasher;
    use std::collections::HashMap as StdHashMap;

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
        let map: HashMap<String, i32, SipStrategy> = HashMap::new();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);

        let map2 = HashMap::<String, i32, _>::with_strategy(SipStrategy::default());
        assert!(map2.is_empty());
        assert_eq!(map2.default_return_value(), None);
    }

    #[test]
    fn test_with_capacity() {
        let map: HashMap<u64, String> = HashMap::with_capacity(100);
        assert!(map.capacity() >= 100);
        assert_eq!(map.slot_count(), 256);

        let map2: HashMap<u64, String> = HashMap::with_capacity_and_load_factor(100, 0.5);
        assert_eq!(map2.slot_count(), 256);
        assert_eq!(map2.load_factor(), 0.5);

        assert!(
            HashMap::<String, u8, _>::try_with_capacity_and_strategy(1, -1.0, SipStrategy::default())
                .is_err()
        );
    }

    #[test]
    fn test_insert_and_get() {
        let mut map = HashMap::with_strategy(SipStrategy::default());

        assert_eq!(map.insert("one".to_string(), 1), None);
        assert_eq!(map.insert("two".to_string(), 2), None);
        assert_eq!(map.insert("one".to_string(), 11), Some(1));
        assert_eq!(map.len(), 2);

        assert_eq!(map.get(&"one".to_string()), Some(&11));
        assert_eq!(map.get(&"three".to_string()), None);
        assert_eq!(map[&"two".to_string()], 2);
    }

    #[test]
    fn test_empty_string_key() {
        let mut map = HashMap::with_strategy(SipStrategy::default());
        map.insert(String::new(), "empty");
        map.insert("x".to_string(), "x");
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&String::new()), Some(&"empty"));
        assert_eq!(map.remove(&String::new()), Some("empty"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_default_return_value() {
        let mut map: HashMap<u32, i32> = HashMap::new();
        assert_eq!(map.get_or_default(&1), None);

        map.set_default_return_value(-1);
        assert_eq!(map.default_return_value(), Some(&-1));
        assert_eq!(map.get_or_default(&1), Some(&-1));

        map.insert(1, 5);
        assert_eq!(map.get_or_default(&1), Some(&5));
        // Plain lookups are unaffected.
        assert_eq!(map.get(&2), None);
    }

    #[test]
    fn test_add_to() {
        let mut map: HashMap<u32, i64> = HashMap::new();
        assert_eq!(map.add_to(3, 5), 0);
        assert_eq!(map.add_to(3, 5), 5);
        assert_eq!(map[&3], 10);

        map.set_default_return_value(100);
        assert_eq!(map.add_to(4, 1), 100);
        assert_eq!(map[&4], 101);
        assert_eq!(map.add_to(0, -1), 100);
        assert_eq!(map[&0], 99);
    }

    #[test]
    fn test_put_if_absent_and_replace() {
        let mut map: HashMap<u32, &str> = HashMap::new();
        assert_eq!(map.put_if_absent(1, "a"), None);
        assert_eq!(map.put_if_absent(1, "b"), Some(&"a"));
        assert_eq!(map[&1], "a");

        assert_eq!(map.replace(&1, "c"), Some("a"));
        assert_eq!(map.replace(&2, "d"), None);
        assert!(!map.contains_key(&2));
        assert_eq!(map[&1], "c");
    }

    #[test]
    fn test_contains_value() {
        let map: HashMap<u32, String> = (1..10).map(|k| (k, k.to_string())).collect();
        assert!(map.contains_value(&"7".to_string()));
        assert!(!map.contains_value(&"70".to_string()));
    }

    #[test]
    fn test_remove() {
        let mut map: HashMap<u32, String> = HashMap::new();
        map.insert(1, "hello".to_string());
        map.insert(2, "world".to_string());

        assert_eq!(map.remove(&1), Some("hello".to_string()));
        assert_eq!(map.len(), 1);
        assert!(!map.contains_key(&1));
        assert!(map.contains_key(&2));
        assert_eq!(map.remove_entry(&2), Some((2, "world".to_string())));
        assert!(map.is_empty());
    }

    #[test]
    fn test_grow_and_shrink() {
        let mut map: HashMap<u64, u64> = HashMap::with_capacity_and_load_factor(4, 0.75);
        for k in 1..=6 {
            map.insert(k, k * 10);
        }
        assert_eq!(map.slot_count(), 16);
        for k in 1..=5 {
            map.remove(&k);
        }
        assert_eq!(map.slot_count(), 8);
        assert_eq!(map.get(&6), Some(&60));
    }

    #[test]
    fn test_cursor_and_retain() {
        let mut map: HashMap<u32, u32> = (0..100).map(|k| (k, k)).collect();
        let mut cursor = map.cursor();
        while let Some((k, v)) = cursor.next() {
            *v += 1;
            if k % 4 == 0 {
                cursor.remove().unwrap();
            }
        }
        assert_eq!(map.len(), 75);
        assert_eq!(map.get(&1), Some(&2));

        map.retain(|k, _| k % 2 == 1);
        assert_eq!(map.len(), 50);
        assert!(map.keys().all(|k| k % 2 == 1));
    }

    #[test]
    fn test_iteration() {
        let mut map: HashMap<u32, u32> = (0..50).map(|k| (k, k)).collect();
        for (_, v) in &mut map {
            *v *= 2;
        }
        let mut pairs: Vec<(u32, u32)> = map.iter().map(|(k, v)| (*k, *v)).collect();
        pairs.sort_unstable();
        assert_eq!(pairs, (0..50).map(|k| (k, k * 2)).collect::<Vec<_>>());

        assert_eq!(map.values().sum::<u32>(), (0..50).map(|k| k * 2).sum::<u32>());
        let drained: Vec<(u32, u32)> = map.drain().collect();
        assert_eq!(drained.len(), 50);
        assert!(map.is_empty());
    }

    #[test]
    fn test_equality_and_debug() {
        let a: HashMap<u32, u32> = (0..20).map(|k| (k, k)).collect();
        let mut b: HashMap<u32, u32> = HashMap::with_capacity(1000);
        for k in (0..20).rev() {
            b.insert(k, k);
        }
        assert_eq!(a, b);
        b.insert(5, 6);
        assert_ne!(a, b);

        let mut single: HashMap<u32, &str> = HashMap::new();
        single.insert(1, "x");
        assert_eq!(std::format!("{single:?}"), r#"{1: "x"}"#);
    }

    #[test]
    fn test_trim() {
        let mut map: HashMap<u32, u32> = HashMap::with_capacity(10_000);
        map.extend((0..100).map(|k| (k, k)));
        assert!(map.trim());
        assert_eq!(map.slot_count(), 256);
        assert!((0..100).all(|k| map.get(&k) == Some(&k)));
    }

    #[test]
    fn test_random_operations_match_std() {
        let mut rng = SmallRng::seed_from_u64(0xfeed);
        let mut map: HashMap<String, u32, SipStrategy> = HashMap::new();
        let mut model: StdHashMap<String, u32> = StdHashMap::new();

        for round in 0..5000 {
            let key = rng.random_range(0..300u32).to_string();
            match rng.random_range(0..3) {
                0 => assert_eq!(map.remove(&key), model.remove(&key)),
                _ => assert_eq!(map.insert(key.clone(), round), model.insert(key, round)),
            }
            assert_eq!(map.len(), model.len());
        }
        for (k, v) in &model {
            assert_eq!(map.get(k), Some(v));
        }
    }
}
