//! A map for a handful of entries, stored as parallel key and value vectors
//! and searched linearly.
//!
//! For very small maps a linear scan over a dense array beats hashing, and
//! the map costs no more memory than its contents.

use alloc::vec::Vec;
use core::fmt::Debug;
use core::iter::Zip;
use core::mem;
use core::slice;

use crate::error::ConfigError;

/// A map backed by two parallel vectors.
///
/// Removal moves the last entry into the hole, so the iteration order is
/// insertion order only until the first removal.
///
/// ```rust
/// use shift_hash::ArrayMap;
///
/// let mut map = ArrayMap::from_parts(vec!["a", "b"], vec![1, 2]).unwrap();
/// map.insert("c", 3);
/// assert_eq!(map.get(&"b"), Some(&2));
/// assert_eq!(map.remove(&"a"), Some(1));
/// assert_eq!(map.keys(), &["c", "b"]);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct ArrayMap<K, V> {
    keys: Vec<K>,
    values: Vec<V>,
}

impl<K: Debug, V: Debug> Debug for ArrayMap<K, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V> Default for ArrayMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ArrayMap<K, V> {
    /// Creates an empty map.
    pub const fn new() -> Self {
        Self {
            keys: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Creates an empty map with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    /// Builds a map from parallel key and value vectors.
    ///
    /// The keys are trusted to be distinct.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::LengthMismatch`] if the vectors differ in length.
    pub fn from_parts(keys: Vec<K>, values: Vec<V>) -> Result<Self, ConfigError> {
        if keys.len() != values.len() {
            return Err(ConfigError::LengthMismatch {
                keys: keys.len(),
                values: values.len(),
            });
        }
        Ok(Self { keys, values })
    }

    /// Splits the map back into its key and value vectors.
    pub fn into_parts(self) -> (Vec<K>, Vec<V>) {
        (self.keys, self.values)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.keys.clear();
        self.values.clear();
    }

    /// The keys, in storage order.
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// The values, in storage order.
    pub fn values(&self) -> &[V] {
        &self.values
    }

    /// Returns an iterator over the entries in storage order.
    pub fn iter(&self) -> Zip<slice::Iter<'_, K>, slice::Iter<'_, V>> {
        self.keys.iter().zip(self.values.iter())
    }

    /// Returns an iterator with mutable access to the values.
    pub fn iter_mut(&mut self) -> Zip<slice::Iter<'_, K>, slice::IterMut<'_, V>> {
        self.keys.iter().zip(self.values.iter_mut())
    }
}

impl<K: PartialEq, V> ArrayMap<K, V> {
    fn find(&self, key: &K) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    /// Inserts a key-value pair, returning the previous value for the key.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.find(&key) {
            Some(i) => Some(mem::replace(&mut self.values[i], value)),
            None => {
                self.keys.push(key);
                self.values.push(value);
                None
            }
        }
    }

    /// Returns the value stored for `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.find(key).map(|i| &self.values[i])
    }

    /// Returns a mutable reference to the value stored for `key`.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.find(key).map(|i| &mut self.values[i])
    }

    /// Returns `true` if the map contains `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    /// Removes `key`, returning its value. The last entry takes its place.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.remove_entry(key).map(|(_, v)| v)
    }

    /// Removes `key`, returning the stored key and value.
    pub fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        let i = self.find(key)?;
        Some((self.keys.swap_remove(i), self.values.swap_remove(i)))
    }
}

impl<K: PartialEq, V> Extend<(K, V)> for ArrayMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K: PartialEq, V> FromIterator<(K, V)> for ArrayMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<'a, K, V> IntoIterator for &'a ArrayMap<K, V> {
    type IntoIter = Zip<slice::Iter<'a, K>, slice::Iter<'a, V>>;
    type Item = (&'a K, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
