//! A flat open-addressing hash table with linear probing.
//!
//! Keys live in one array of `n + 1` slots, values in a parallel array. Slot
//! `n` is reserved for the null key (see [`Key`]), so the probe loop can use
//! "slot holds the null value" as its emptiness test and needs no occupancy
//! bitmap.
//!
//! Removal uses backward-shift deletion: instead of leaving a tombstone, the
//! entries that follow the removed one in its cluster are shifted back into
//! the hole whenever their probe sequence passes through it. Lookups never
//! degrade under churn, and the table shrinks when it becomes sparse.

use alloc::boxed::Box;
use alloc::collections::TryReserveError;
use alloc::vec::Vec;
use core::fmt::Debug;
use core::iter::FusedIterator;
use core::iter::Rev;
use core::iter::Zip;
use core::mem;
use core::mem::MaybeUninit;
use core::slice;

use crate::common::DEFAULT_INITIAL_SIZE;
use crate::common::DEFAULT_LOAD_FACTOR;
use crate::common::array_size;
use crate::common::max_fill;
use crate::common::mix_long;
use crate::common::try_array_size;
use crate::error::ConfigError;
use crate::error::CursorError;
use crate::key::Key;
use crate::key::Natural;
use crate::key::Strategy;

type Slots<K, V> = (Box<[K]>, Box<[MaybeUninit<V>]>);

fn alloc_slots<K: Key, V>(n: usize) -> Slots<K, V> {
    (
        (0..=n).map(|_| K::null()).collect(),
        (0..=n).map(|_| MaybeUninit::uninit()).collect(),
    )
}

fn try_alloc_slots<K: Key, V>(n: usize) -> Result<Slots<K, V>, TryReserveError> {
    let mut keys = Vec::new();
    keys.try_reserve_exact(n + 1)?;
    keys.resize_with(n + 1, K::null);

    let mut values = Vec::new();
    values.try_reserve_exact(n + 1)?;
    values.resize_with(n + 1, MaybeUninit::uninit);

    Ok((keys.into_boxed_slice(), values.into_boxed_slice()))
}

/// An open-addressing hash table mapping keys of type `K` to values of type
/// `V`, with key equivalence decided by the strategy `S`.
///
/// This is the engine behind [`HashMap`](crate::HashMap) and
/// [`HashSet`](crate::HashSet), and can be used directly as a map.
///
/// ## Sizing
///
/// A table built for `expected` entries with load factor `f` gets
/// `n = max(2, next_power_of_two(ceil(expected / f)))` slots and grows as
/// soon as its size reaches `floor(n * f)`. It halves itself when removals
/// bring the size under a quarter of that threshold, but never below the
/// capacity it was built with.
///
/// ## Example
///
/// ```rust
/// use shift_hash::HashTable;
///
/// let mut table: HashTable<u64, &str> = HashTable::with_capacity(4);
/// assert_eq!(table.insert(1, "one"), None);
/// assert_eq!(table.insert(0, "zero"), None);
/// assert_eq!(table.insert(1, "uno"), Some("one"));
///
/// assert_eq!(table.get(&1), Some(&"uno"));
/// assert_eq!(table.get(&0), Some(&"zero"));
/// assert_eq!(table.len(), 2);
///
/// assert_eq!(table.remove(&1), Some("uno"));
/// assert!(!table.contains_key(&1));
/// ```
pub struct HashTable<K: Key, V, S = Natural> {
    keys: Box<[K]>,
    values: Box<[MaybeUninit<V>]>,

    n: usize,
    mask: usize,
    max_fill: usize,
    min_n: usize,

    size: usize,
    contains_null_key: bool,

    load_factor: f32,
    strategy: S,
}

impl<K, V, S> Debug for HashTable<K, V, S>
where
    K: Key + Debug,
    V: Debug,
    S: Strategy<K>,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> Clone for HashTable<K, V, S>
where
    K: Key + Clone,
    V: Clone,
    S: Clone,
{
    fn clone(&self) -> Self {
        let mut values: Box<[MaybeUninit<V>]> =
            (0..=self.n).map(|_| MaybeUninit::uninit()).collect();

        for (index, key) in self.keys[..self.n].iter().enumerate() {
            if !key.is_null() {
                // SAFETY: A non-null key in a regular slot marks an initialized value.
                let value = unsafe { self.values[index].assume_init_ref() };
                values[index].write(value.clone());
            }
        }
        if self.contains_null_key {
            // SAFETY: The reserved slot holds a value while the null key is present.
            let value = unsafe { self.values[self.n].assume_init_ref() };
            values[self.n].write(value.clone());
        }

        Self {
            keys: self.keys.clone(),
            values,
            n: self.n,
            mask: self.mask,
            max_fill: self.max_fill,
            min_n: self.min_n,
            size: self.size,
            contains_null_key: self.contains_null_key,
            load_factor: self.load_factor,
            strategy: self.strategy.clone(),
        }
    }
}

impl<K: Key, V, S> Drop for HashTable<K, V, S> {
    fn drop(&mut self) {
        if !mem::needs_drop::<V>() || self.size == 0 {
            return;
        }

        for (index, key) in self.keys[..self.n].iter().enumerate() {
            if !key.is_null() {
                // SAFETY: A non-null key in a regular slot marks an initialized value,
                // and the table is being destroyed so it is dropped exactly once.
                unsafe { self.values[index].assume_init_drop() };
            }
        }
        if self.contains_null_key {
            // SAFETY: The reserved slot holds a value while the null key is present.
            unsafe { self.values[self.n].assume_init_drop() };
        }
    }
}

impl<K: Key, V, S: Strategy<K> + Default> HashTable<K, V, S> {
    /// Creates a table sized for [`DEFAULT_INITIAL_SIZE`] entries at the
    /// default load factor.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INITIAL_SIZE)
    }

    /// Creates a table sized for `expected` entries at the default load
    /// factor.
    ///
    /// ```rust
    /// use shift_hash::HashTable;
    ///
    /// let table: HashTable<u32, u32> = HashTable::with_capacity(100);
    /// assert!(table.capacity() >= 100);
    /// assert_eq!(table.slot_count(), 256);
    /// ```
    pub fn with_capacity(expected: usize) -> Self {
        Self::with_capacity_and_load_factor(expected, DEFAULT_LOAD_FACTOR)
    }

    /// Creates a table sized for `expected` entries at load factor `f`.
    ///
    /// # Panics
    ///
    /// Panics if `f` is not in `(0, 1]` or the size cannot be addressed.
    pub fn with_capacity_and_load_factor(expected: usize, f: f32) -> Self {
        Self::with_capacity_and_strategy(expected, f, S::default())
    }

    /// Fallible version of
    /// [`with_capacity_and_load_factor`](Self::with_capacity_and_load_factor).
    pub fn try_with_capacity_and_load_factor(expected: usize, f: f32) -> Result<Self, ConfigError> {
        Self::try_with_capacity_and_strategy(expected, f, S::default())
    }
}

impl<K: Key, V, S: Strategy<K>> HashTable<K, V, S> {
    /// Creates a table with a custom key strategy, sized for
    /// [`DEFAULT_INITIAL_SIZE`] entries at the default load factor.
    pub fn with_strategy(strategy: S) -> Self {
        Self::with_capacity_and_strategy(DEFAULT_INITIAL_SIZE, DEFAULT_LOAD_FACTOR, strategy)
    }

    /// Creates a table with a custom key strategy.
    ///
    /// # Panics
    ///
    /// Panics if `f` is not in `(0, 1]` or the size cannot be addressed.
    pub fn with_capacity_and_strategy(expected: usize, f: f32, strategy: S) -> Self {
        Self::try_with_capacity_and_strategy(expected, f, strategy).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Creates a table with a custom key strategy, reporting bad parameters
    /// instead of panicking.
    ///
    /// ```rust
    /// use shift_hash::ConfigError;
    /// use shift_hash::HashTable;
    /// use shift_hash::key::Natural;
    ///
    /// let table = HashTable::<u8, u8, _>::try_with_capacity_and_strategy(10, 1.5, Natural);
    /// assert_eq!(table.err(), Some(ConfigError::InvalidLoadFactor(1.5)));
    /// ```
    pub fn try_with_capacity_and_strategy(
        expected: usize,
        f: f32,
        strategy: S,
    ) -> Result<Self, ConfigError> {
        let n = try_array_size(expected, f)?;
        let (keys, values) = alloc_slots(n);

        Ok(Self {
            keys,
            values,
            n,
            mask: n - 1,
            max_fill: max_fill(n, f),
            min_n: n,
            size: 0,
            contains_null_key: false,
            load_factor: f,
            strategy,
        })
    }

    /// Returns the number of entries, counting the null key.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns how many entries the table holds before it grows.
    pub fn capacity(&self) -> usize {
        self.max_fill
    }

    /// Returns the number of probe slots, always a power of two.
    pub fn slot_count(&self) -> usize {
        self.n
    }

    /// Returns the load factor the table was built with.
    pub fn load_factor(&self) -> f32 {
        self.load_factor
    }

    /// Returns the key strategy.
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    #[inline(always)]
    fn home(&self, key: &K) -> usize {
        mix_long(self.strategy.hash(key)) as usize & self.mask
    }

    /// Finds `key`: `Ok(slot)` if present, otherwise `Err(slot)` with the
    /// slot it would be inserted into.
    #[inline]
    pub(crate) fn locate(&self, key: &K) -> Result<usize, usize> {
        if self.strategy.is_null(key) {
            return if self.contains_null_key {
                Ok(self.n)
            } else {
                Err(self.n)
            };
        }

        let mut pos = self.home(key);
        loop {
            let curr = &self.keys[pos];
            if curr.is_null() {
                return Err(pos);
            }
            if self.strategy.equals(key, curr) {
                return Ok(pos);
            }
            pos = (pos + 1) & self.mask;
        }
    }

    /// Stores `key` in place of the equivalent stored key and returns the old
    /// one, or hands `key` back if no equivalent key is stored.
    pub(crate) fn replace_key(&mut self, key: K) -> Result<K, K> {
        match self.locate(&key) {
            Ok(pos) => Ok(mem::replace(&mut self.keys[pos], key)),
            Err(_) => Err(key),
        }
    }

    /// Returns `true` if the table contains `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.locate(key).is_ok()
    }

    /// Returns the value stored for `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        let pos = self.locate(key).ok()?;
        // SAFETY: `locate` only returns `Ok` for occupied slots.
        Some(unsafe { self.values[pos].assume_init_ref() })
    }

    /// Returns the stored key and value for `key`.
    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        let pos = self.locate(key).ok()?;
        // SAFETY: `locate` only returns `Ok` for occupied slots.
        Some((&self.keys[pos], unsafe { self.values[pos].assume_init_ref() }))
    }

    /// Returns a mutable reference to the value stored for `key`.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let pos = self.locate(key).ok()?;
        // SAFETY: `locate` only returns `Ok` for occupied slots.
        Some(unsafe { self.values[pos].assume_init_mut() })
    }

    /// Inserts a key-value pair, returning the previous value for the key.
    ///
    /// The stored key is kept when the key was already present.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.locate(&key) {
            Ok(pos) => {
                // SAFETY: `locate` only returns `Ok` for occupied slots.
                let slot = unsafe { self.values[pos].assume_init_mut() };
                Some(mem::replace(slot, value))
            }
            Err(pos) => {
                self.insert_at(pos, key, value);
                None
            }
        }
    }

    /// Stores a new entry in the vacant slot `pos` produced by `locate`, then
    /// grows the table if it reached its fill threshold. Returns the slot the
    /// entry ends up in.
    pub(crate) fn insert_at(&mut self, pos: usize, key: K, value: V) -> usize {
        if pos == self.n {
            self.contains_null_key = true;
        }
        self.keys[pos] = key;
        self.values[pos].write(value);
        self.size += 1;

        if self.size >= self.max_fill {
            let new_n = array_size(self.size + 1, self.load_factor).max(self.n * 2);
            return self.rehash(new_n, Some(pos));
        }
        pos
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.remove_entry(key).map(|(_, v)| v)
    }

    /// Removes `key`, returning the stored key and its value.
    ///
    /// ```rust
    /// use shift_hash::HashTable;
    ///
    /// let mut table: HashTable<String, u32> = HashTable::new();
    /// table.insert("a".to_string(), 1);
    /// assert_eq!(table.remove_entry(&"a".to_string()), Some(("a".to_string(), 1)));
    /// assert_eq!(table.remove_entry(&"a".to_string()), None);
    /// ```
    pub fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        let pos = self.locate(key).ok()?;
        Some(self.remove_slot(pos))
    }

    pub(crate) fn remove_slot(&mut self, pos: usize) -> (K, V) {
        let entry = self.remove_at(pos, |_| {});
        self.maybe_shrink();
        entry
    }

    /// Takes the entry out of the occupied slot `pos` and closes the gap.
    ///
    /// `on_wrap` sees every key that the backward shift moves from a slot
    /// below the hole it fills, i.e. across the end of the array.
    fn remove_at(&mut self, pos: usize, on_wrap: impl FnMut(&K)) -> (K, V) {
        // SAFETY: Callers only pass occupied slots. The key is replaced by the null
        // value right after, so the value is never read again.
        let value = unsafe { self.values[pos].assume_init_read() };
        let key = mem::replace(&mut self.keys[pos], K::null());

        if pos == self.n {
            self.contains_null_key = false;
        } else {
            self.shift_keys(pos, on_wrap);
        }
        self.size -= 1;

        (key, value)
    }

    /// Backward-shift deletion starting from the empty slot `pos`.
    fn shift_keys(&mut self, mut pos: usize, mut on_wrap: impl FnMut(&K)) {
        loop {
            let last = pos;
            pos = (last + 1) & self.mask;

            loop {
                if self.keys[pos].is_null() {
                    return;
                }

                // The entry must move if its home is cyclically outside
                // `(last, pos]`, since its probe sequence then crosses `last`.
                let slot = self.home(&self.keys[pos]);
                let must_move = if last <= pos {
                    last >= slot || slot > pos
                } else {
                    last >= slot && slot > pos
                };
                if must_move {
                    break;
                }
                pos = (pos + 1) & self.mask;
            }

            if pos < last {
                on_wrap(&self.keys[pos]);
            }
            // `last` holds the null key and an uninitialized value, so swapping
            // moves the entry back and leaves the hole at `pos`.
            self.keys.swap(last, pos);
            self.values.swap(last, pos);
        }
    }

    fn maybe_shrink(&mut self) {
        if self.n > self.min_n && self.size < self.max_fill / 4 {
            tracing::trace!(size = self.size, n = self.n, "table sparse, halving");
            self.rehash(self.n / 2, None);
        }
    }

    fn rehash(&mut self, new_n: usize, follow: Option<usize>) -> usize {
        let (keys, values) = alloc_slots(new_n);
        self.rehash_into(keys, values, new_n, follow)
    }

    /// Moves every entry into the freshly allocated `new_keys`/`new_values`
    /// of capacity `new_n`. Returns the new slot of the entry that was at
    /// `follow`, if any.
    fn rehash_into(
        &mut self,
        new_keys: Box<[K]>,
        new_values: Box<[MaybeUninit<V>]>,
        new_n: usize,
        follow: Option<usize>,
    ) -> usize {
        tracing::debug!(old = self.n, new = new_n, size = self.size, "rehash");

        let old_n = self.n;
        let mut old_keys = mem::replace(&mut self.keys, new_keys);
        let mut old_values = mem::replace(&mut self.values, new_values);
        self.n = new_n;
        self.mask = new_n - 1;
        self.max_fill = max_fill(new_n, self.load_factor);

        let mut followed = new_n;
        for index in 0..old_n {
            if old_keys[index].is_null() {
                continue;
            }

            let key = mem::replace(&mut old_keys[index], K::null());
            // SAFETY: The key was non-null, so the value is initialized. It is moved out
            // exactly once and the old array never drops its contents.
            let value = unsafe { old_values[index].assume_init_read() };

            let mut pos = self.home(&key);
            while !self.keys[pos].is_null() {
                pos = (pos + 1) & self.mask;
            }
            if follow == Some(index) {
                followed = pos;
            }
            self.keys[pos] = key;
            self.values[pos].write(value);
        }

        if self.contains_null_key {
            self.keys[new_n] = mem::replace(&mut old_keys[old_n], K::null());
            mem::swap(&mut self.values[new_n], &mut old_values[old_n]);
        }

        followed
    }

    /// Grows the table so it can take `additional` more entries without
    /// rehashing.
    pub fn reserve(&mut self, additional: usize) {
        let needed = array_size(self.size.saturating_add(additional), self.load_factor);
        if needed > self.n {
            self.rehash(needed, None);
        }
    }

    /// Shrinks the table to the smallest capacity that holds its entries.
    ///
    /// Returns `false`, leaving the table untouched, if the smaller arrays
    /// could not be allocated.
    pub fn trim(&mut self) -> bool {
        self.trim_to(self.size)
    }

    /// Shrinks the table to the capacity needed for `target` entries, or for
    /// the current entries if there are more of them.
    ///
    /// A successful trim also lowers the floor that automatic shrinking
    /// respects. Returns `false`, leaving the table untouched, if the smaller
    /// arrays could not be allocated.
    ///
    /// ```rust
    /// use shift_hash::HashTable;
    ///
    /// let mut table: HashTable<u32, ()> = HashTable::with_capacity(1000);
    /// table.insert(1, ());
    /// assert!(table.trim_to(10));
    /// assert_eq!(table.slot_count(), 16);
    /// assert!(table.contains_key(&1));
    /// ```
    pub fn trim_to(&mut self, target: usize) -> bool {
        let Ok(l) = try_array_size(target, self.load_factor) else {
            return true;
        };
        if l >= self.n || self.size > max_fill(l, self.load_factor) {
            return true;
        }

        match try_alloc_slots(l) {
            Ok((keys, values)) => {
                self.rehash_into(keys, values, l, None);
                self.min_n = self.min_n.min(l);
                true
            }
            Err(error) => {
                tracing::warn!(capacity = l, %error, "trim failed to allocate");
                false
            }
        }
    }

    /// Removes every entry, keeping the capacity.
    pub fn clear(&mut self) {
        if self.size == 0 {
            return;
        }

        for index in 0..self.n {
            if !self.keys[index].is_null() {
                self.keys[index] = K::null();
                // SAFETY: The key was non-null, so the value is initialized; the key is
                // now null so the value is not dropped again.
                unsafe { self.values[index].assume_init_drop() };
            }
        }
        if self.contains_null_key {
            self.contains_null_key = false;
            self.keys[self.n] = K::null();
            // SAFETY: The reserved slot held a value while the null key was present.
            unsafe { self.values[self.n].assume_init_drop() };
        }
        self.size = 0;
    }

    /// Gets the entry for `key` for in-place manipulation.
    ///
    /// ```rust
    /// use shift_hash::HashTable;
    ///
    /// let mut counts: HashTable<char, u32> = HashTable::new();
    /// for c in "hello".chars() {
    ///     *counts.entry(c).or_insert(0) += 1;
    /// }
    /// assert_eq!(counts.get(&'l'), Some(&2));
    /// ```
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V, S> {
        match self.locate(&key) {
            Ok(pos) => Entry::Occupied(OccupiedEntry { table: self, pos }),
            Err(pos) => Entry::Vacant(VacantEntry {
                table: self,
                pos,
                key,
            }),
        }
    }

    /// Returns an iterator over the entries.
    ///
    /// The null key comes first, then the remaining entries in slot order
    /// from the end of the table. The order is otherwise unspecified.
    pub fn iter(&self) -> Iter<'_, K, V> {
        let (slot_keys, null_key) = self.keys.split_at(self.n);
        let (slot_values, null_value) = self.values.split_at(self.n);
        let null_entry = if self.contains_null_key {
            // SAFETY: The reserved slot holds a value while the null key is present.
            Some((&null_key[0], unsafe { null_value[0].assume_init_ref() }))
        } else {
            None
        };

        Iter {
            null_entry,
            slots: slot_keys.iter().zip(slot_values.iter()).rev(),
            remaining: self.size,
        }
    }

    /// Returns an iterator with mutable access to the values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        let (slot_keys, null_key) = self.keys.split_at(self.n);
        let (slot_values, null_value) = self.values.split_at_mut(self.n);
        let null_entry = if self.contains_null_key {
            // SAFETY: The reserved slot holds a value while the null key is present.
            Some((&null_key[0], unsafe { null_value[0].assume_init_mut() }))
        } else {
            None
        };

        IterMut {
            null_entry,
            slots: slot_keys.iter().zip(slot_values.iter_mut()).rev(),
            remaining: self.size,
        }
    }

    /// Returns an iterator over the keys.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over the values.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Returns an iterator over mutable references to the values.
    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    /// Removes and yields every entry. The capacity is kept.
    ///
    /// Leaking the returned iterator leaves the table in an unspecified (but
    /// memory-safe) state.
    pub fn drain(&mut self) -> Drain<'_, K, V, S> {
        let pos = self.n;
        Drain { table: self, pos }
    }

    /// Takes out the null entry, then the entries below `*pos`, without
    /// shifting: the caller empties the whole table.
    fn pop_unordered(&mut self, pos: &mut usize) -> Option<(K, V)> {
        if self.contains_null_key {
            self.contains_null_key = false;
            self.size -= 1;
            let key = mem::replace(&mut self.keys[self.n], K::null());
            // SAFETY: The reserved slot held a value while the null key was present.
            return Some((key, unsafe { self.values[self.n].assume_init_read() }));
        }

        while *pos > 0 {
            *pos -= 1;
            if !self.keys[*pos].is_null() {
                self.size -= 1;
                let key = mem::replace(&mut self.keys[*pos], K::null());
                // SAFETY: The key was non-null, so the value is initialized; the key is
                // now null so the value is not read again.
                return Some((key, unsafe { self.values[*pos].assume_init_read() }));
            }
        }
        None
    }

    /// Returns a cursor that can remove the entry it just yielded.
    ///
    /// Removal through the cursor never shrinks the table, and every entry
    /// present when the cursor was created is yielded exactly once, even when
    /// a removal shifts a not-yet-visited entry into a visited slot.
    ///
    /// ```rust
    /// use shift_hash::HashTable;
    ///
    /// let mut table: HashTable<u32, u32> = (1..=10).map(|k| (k, k * k)).collect();
    /// let mut cursor = table.cursor();
    /// while let Some((k, _)) = cursor.next() {
    ///     if k % 2 == 0 {
    ///         cursor.remove().unwrap();
    ///     }
    /// }
    /// assert_eq!(table.len(), 5);
    /// assert!(table.contains_key(&3) && !table.contains_key(&4));
    /// ```
    pub fn cursor(&mut self) -> Cursor<'_, K, V, S>
    where
        K: Clone,
    {
        Cursor {
            pos: self.n,
            remaining: self.size,
            must_return_null: self.contains_null_key,
            last: Last::None,
            wrapped: Vec::new(),
            wrapped_pos: 0,
            table: self,
        }
    }

    /// Keeps only the entries for which `f` returns `true`.
    pub fn retain(&mut self, mut f: impl FnMut(&K, &mut V) -> bool)
    where
        K: Clone,
    {
        let mut cursor = self.cursor();
        while let Some((key, value)) = cursor.next() {
            if !f(key, value) {
                let _ = cursor.remove();
            }
        }
    }
}

impl<K: Key, V, S: Strategy<K> + Default> Default for HashTable<K, V, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Key, V, S: Strategy<K>> Extend<(K, V)> for HashTable<K, V, S> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.reserve(iter.size_hint().0);
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K: Key, V, S: Strategy<K> + Default> FromIterator<(K, V)> for HashTable<K, V, S> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut table = Self::with_capacity(iter.size_hint().0);
        table.extend(iter);
        table
    }
}

impl<'a, K: Key, V, S: Strategy<K>> IntoIterator for &'a HashTable<K, V, S> {
    type IntoIter = Iter<'a, K, V>;
    type Item = (&'a K, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K: Key, V, S: Strategy<K>> IntoIterator for &'a mut HashTable<K, V, S> {
    type IntoIter = IterMut<'a, K, V>;
    type Item = (&'a K, &'a mut V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<K: Key, V, S: Strategy<K>> IntoIterator for HashTable<K, V, S> {
    type IntoIter = IntoIter<K, V, S>;
    type Item = (K, V);

    fn into_iter(self) -> Self::IntoIter {
        let pos = self.n;
        IntoIter { table: self, pos }
    }
}

/// A view into a single entry of a [`HashTable`].
pub enum Entry<'a, K: Key, V, S> {
    /// The key is present.
    Occupied(OccupiedEntry<'a, K, V, S>),
    /// The key is absent.
    Vacant(VacantEntry<'a, K, V, S>),
}

impl<'a, K: Key, V, S: Strategy<K>> Entry<'a, K, V, S> {
    /// Inserts `default` if the key is absent and returns the value.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts the result of `default` if the key is absent and returns the
    /// value.
    pub fn or_insert_with(self, default: impl FnOnce() -> V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Like [`or_insert_with`](Self::or_insert_with), with access to the key.
    pub fn or_insert_with_key(self, default: impl FnOnce(&K) -> V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let value = default(entry.key());
                entry.insert(value)
            }
        }
    }

    /// Modifies the value in place if the key is present.
    pub fn and_modify(mut self, f: impl FnOnce(&mut V)) -> Self {
        if let Entry::Occupied(entry) = &mut self {
            f(entry.get_mut());
        }
        self
    }

    /// Returns the entry's key.
    pub fn key(&self) -> &K {
        match self {
            Entry::Occupied(entry) => entry.key(),
            Entry::Vacant(entry) => entry.key(),
        }
    }
}

impl<'a, K: Key, V: Default, S: Strategy<K>> Entry<'a, K, V, S> {
    /// Inserts `V::default()` if the key is absent and returns the value.
    pub fn or_default(self) -> &'a mut V {
        self.or_insert_with(V::default)
    }
}

/// An entry whose key is present.
pub struct OccupiedEntry<'a, K: Key, V, S> {
    table: &'a mut HashTable<K, V, S>,
    pos: usize,
}

impl<'a, K: Key, V, S: Strategy<K>> OccupiedEntry<'a, K, V, S> {
    /// The stored key.
    pub fn key(&self) -> &K {
        &self.table.keys[self.pos]
    }

    /// The stored value.
    pub fn get(&self) -> &V {
        // SAFETY: Occupied entries point at initialized slots.
        unsafe { self.table.values[self.pos].assume_init_ref() }
    }

    /// The stored value, mutably.
    pub fn get_mut(&mut self) -> &mut V {
        // SAFETY: Occupied entries point at initialized slots.
        unsafe { self.table.values[self.pos].assume_init_mut() }
    }

    /// Converts the entry into a reference bound to the table's lifetime.
    pub fn into_mut(self) -> &'a mut V {
        let table = self.table;
        // SAFETY: Occupied entries point at initialized slots.
        unsafe { table.values[self.pos].assume_init_mut() }
    }

    /// Replaces the value, returning the old one.
    pub fn insert(&mut self, value: V) -> V {
        mem::replace(self.get_mut(), value)
    }

    /// Removes the entry, returning its value.
    pub fn remove(self) -> V {
        self.remove_entry().1
    }

    /// Removes the entry, returning the stored key and value.
    pub fn remove_entry(self) -> (K, V) {
        self.table.remove_slot(self.pos)
    }
}

/// An entry whose key is absent.
pub struct VacantEntry<'a, K: Key, V, S> {
    table: &'a mut HashTable<K, V, S>,
    pos: usize,
    key: K,
}

impl<'a, K: Key, V, S: Strategy<K>> VacantEntry<'a, K, V, S> {
    /// The key that would be inserted.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Takes back the key.
    pub fn into_key(self) -> K {
        self.key
    }

    /// Inserts `value` and returns a reference to it.
    pub fn insert(self, value: V) -> &'a mut V {
        let table = self.table;
        let pos = table.insert_at(self.pos, self.key, value);
        // SAFETY: `insert_at` returns the slot the new entry was written to.
        unsafe { table.values[pos].assume_init_mut() }
    }
}

type SlotIter<'a, K, V> = Rev<Zip<slice::Iter<'a, K>, slice::Iter<'a, MaybeUninit<V>>>>;
type SlotIterMut<'a, K, V> = Rev<Zip<slice::Iter<'a, K>, slice::IterMut<'a, MaybeUninit<V>>>>;

/// An iterator over the entries of a [`HashTable`].
pub struct Iter<'a, K, V> {
    null_entry: Option<(&'a K, &'a V)>,
    slots: SlotIter<'a, K, V>,
    remaining: usize,
}

impl<'a, K: Key, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        if let Some(entry) = self.null_entry.take() {
            return Some(entry);
        }

        self.slots.find(|(key, _)| !key.is_null()).map(|(key, value)| {
            // SAFETY: A non-null key in a regular slot marks an initialized value.
            (key, unsafe { value.assume_init_ref() })
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K: Key, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K: Key, V> FusedIterator for Iter<'_, K, V> {}

/// A mutable iterator over the entries of a [`HashTable`].
pub struct IterMut<'a, K, V> {
    null_entry: Option<(&'a K, &'a mut V)>,
    slots: SlotIterMut<'a, K, V>,
    remaining: usize,
}

impl<'a, K: Key, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        if let Some(entry) = self.null_entry.take() {
            return Some(entry);
        }

        self.slots.find(|(key, _)| !key.is_null()).map(|(key, value)| {
            // SAFETY: A non-null key in a regular slot marks an initialized value.
            (key, unsafe { value.assume_init_mut() })
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K: Key, V> ExactSizeIterator for IterMut<'_, K, V> {}
impl<K: Key, V> FusedIterator for IterMut<'_, K, V> {}

/// An iterator over the keys of a [`HashTable`].
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K: Key, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K: Key, V> ExactSizeIterator for Keys<'_, K, V> {}

/// An iterator over the values of a [`HashTable`].
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K: Key, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K: Key, V> ExactSizeIterator for Values<'_, K, V> {}

/// An iterator over mutable references to the values of a [`HashTable`].
pub struct ValuesMut<'a, K, V> {
    inner: IterMut<'a, K, V>,
}

impl<'a, K: Key, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// A draining iterator over the entries of a [`HashTable`].
pub struct Drain<'a, K: Key, V, S> {
    table: &'a mut HashTable<K, V, S>,
    pos: usize,
}

impl<K: Key, V, S: Strategy<K>> Iterator for Drain<'_, K, V, S> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.table.pop_unordered(&mut self.pos)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.table.size, Some(self.table.size))
    }
}

impl<K: Key, V, S> Drop for Drain<'_, K, V, S> {
    fn drop(&mut self) {
        // Finish with plain slot resets: everything left is discarded.
        let table = &mut *self.table;
        for index in 0..self.pos {
            if !table.keys[index].is_null() {
                table.keys[index] = K::null();
                // SAFETY: The key was non-null, so the value is initialized.
                unsafe { table.values[index].assume_init_drop() };
            }
        }
        if table.contains_null_key {
            table.contains_null_key = false;
            table.keys[table.n] = K::null();
            // SAFETY: The reserved slot held a value while the null key was present.
            unsafe { table.values[table.n].assume_init_drop() };
        }
        table.size = 0;
    }
}

/// An owning iterator over the entries of a [`HashTable`].
pub struct IntoIter<K: Key, V, S> {
    table: HashTable<K, V, S>,
    pos: usize,
}

impl<K: Key, V, S: Strategy<K>> Iterator for IntoIter<K, V, S> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.table.pop_unordered(&mut self.pos)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.table.size, Some(self.table.size))
    }
}

impl<K: Key, V, S: Strategy<K>> ExactSizeIterator for IntoIter<K, V, S> {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Last {
    None,
    Slot(usize),
    Wrapped(usize),
}

/// A traversal of a [`HashTable`] that can remove the entry it last
/// yielded.
///
/// Created by [`HashTable::cursor`]. The cursor scans slots from the end of
/// the table towards slot 0. When a removal shifts an entry that has not
/// been visited yet across the end of the array into a visited slot, the
/// cursor remembers its key and yields it after the scan.
pub struct Cursor<'a, K: Key, V, S> {
    table: &'a mut HashTable<K, V, S>,
    pos: usize,
    remaining: usize,
    must_return_null: bool,
    last: Last,
    wrapped: Vec<K>,
    wrapped_pos: usize,
}

impl<K: Key + Clone, V, S: Strategy<K>> Cursor<'_, K, V, S> {
    /// Returns `true` if [`next`](Self::next) will yield an entry.
    pub fn has_next(&self) -> bool {
        self.remaining != 0
    }

    /// Advances to the next entry.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<(&K, &mut V)> {
        if self.remaining == 0 {
            return None;
        }

        let pos = if self.must_return_null {
            self.must_return_null = false;
            self.table.n
        } else {
            loop {
                if self.pos == 0 {
                    let index = self.wrapped_pos;
                    let key = self.wrapped.get(index)?;
                    self.wrapped_pos += 1;
                    let pos = self.locate_wrapped(key);
                    self.last = Last::Wrapped(index);
                    self.remaining -= 1;
                    return self.entry_at(pos);
                }
                self.pos -= 1;
                if !self.table.keys[self.pos].is_null() {
                    break self.pos;
                }
            }
        };

        self.last = Last::Slot(pos);
        self.remaining -= 1;
        self.entry_at(pos)
    }

    /// Removes the entry returned by the last call to [`next`](Self::next).
    ///
    /// # Errors
    ///
    /// Returns [`CursorError::NoCurrentEntry`] if `next` has not yielded an
    /// entry since the last removal.
    pub fn remove(&mut self) -> Result<(K, V), CursorError> {
        match mem::replace(&mut self.last, Last::None) {
            Last::None => Err(CursorError::NoCurrentEntry),
            Last::Slot(pos) => {
                let wrapped = &mut self.wrapped;
                Ok(self.table.remove_at(pos, |key| wrapped.push(key.clone())))
            }
            Last::Wrapped(index) => {
                let pos = self.locate_wrapped(&self.wrapped[index]);
                Ok(self.table.remove_at(pos, |_| {}))
            }
        }
    }

    fn locate_wrapped(&self, key: &K) -> usize {
        match self.table.locate(key) {
            Ok(pos) => pos,
            Err(_) => unreachable!("shifted entry vanished from the table"),
        }
    }

    fn entry_at(&mut self, pos: usize) -> Option<(&K, &mut V)> {
        let table = &mut *self.table;
        // SAFETY: `pos` is an occupied slot found by the scan or by `locate`.
        Some((&table.keys[pos], unsafe { table.values[pos].assume_init_mut() }))
    }
}
