//! The segmented table: the same linear-probing algorithm as
//! [`HashTable`](crate::HashTable), over a [`BigArray`] whose length and
//! size are 64-bit.
//!
//! The null key does not get a reserved slot at the end of the array.
//! Its entry is held beside the segments instead.

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

use crate::big_array::BigArray;
use crate::big_array::SEGMENT_SHIFT;
use crate::big_array::displacement;
use crate::big_array::index;
use crate::big_array::segment;
use crate::big_array::segment_size;
use crate::common::DEFAULT_INITIAL_SIZE;
use crate::common::DEFAULT_LOAD_FACTOR;
use crate::common::big_array_size;
use crate::common::big_max_fill;
use crate::common::mix_long;
use crate::common::try_big_array_size;
use crate::error::ConfigError;
use crate::error::CursorError;
use crate::key::Key;
use crate::key::Natural;
use crate::key::Strategy;

type Slots<K, V, const SHIFT: u32> = (BigArray<K, SHIFT>, BigArray<MaybeUninit<V>, SHIFT>);

fn alloc_slots<K: Key, V, const SHIFT: u32>(n: u64) -> Slots<K, V, SHIFT> {
    (
        BigArray::from_fn(n, K::null),
        BigArray::from_fn(n, MaybeUninit::uninit),
    )
}

fn try_alloc_slots<K: Key, V, const SHIFT: u32>(
    n: u64,
) -> Result<Slots<K, V, SHIFT>, TryReserveError> {
    Ok((
        BigArray::try_from_fn(n, K::null)?,
        BigArray::try_from_fn(n, MaybeUninit::uninit)?,
    ))
}

/// A linear-probing hash table over segmented storage, for tables too large
/// to address with one contiguous allocation.
///
/// `SHIFT` sets the segment size to `2^SHIFT` slots; the default gives
/// 128 Mi-slot segments. A table with `n` slots uses `max(1, n >> SHIFT)`
/// segments of `min(n, 2^SHIFT)` slots each.
///
/// ```rust
/// use shift_hash::BigHashTable;
///
/// let mut table: BigHashTable<u64, u64> = BigHashTable::with_capacity(1000);
/// for k in 0..1000 {
///     table.insert(k, k * k);
/// }
/// assert_eq!(table.len(), 1000u64);
/// assert_eq!(table.get(&30), Some(&900));
/// ```
pub struct BigHashTable<K: Key, V, S = Natural, const SHIFT: u32 = SEGMENT_SHIFT> {
    keys: BigArray<K, SHIFT>,
    values: BigArray<MaybeUninit<V>, SHIFT>,
    null_entry: Option<(K, V)>,

    n: u64,
    mask: u64,
    segment_mask: usize,
    base_mask: usize,
    max_fill: u64,
    min_n: u64,

    size: u64,

    load_factor: f32,
    strategy: S,
}

impl<K, V, S, const SHIFT: u32> Debug for BigHashTable<K, V, S, SHIFT>
where
    K: Key + Debug,
    V: Debug,
    S: Strategy<K>,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S, const SHIFT: u32> Clone for BigHashTable<K, V, S, SHIFT>
where
    K: Key + Clone,
    V: Clone,
    S: Clone,
{
    fn clone(&self) -> Self {
        let mut values: BigArray<MaybeUninit<V>, SHIFT> = BigArray::from_fn(self.n, MaybeUninit::uninit);
        let sources = self.keys.segments().iter().zip(self.values.segments());
        for ((keys, src), dst) in sources.zip(values.segments_mut()) {
            for ((key, src), dst) in keys.iter().zip(src.iter()).zip(dst.iter_mut()) {
                if !key.is_null() {
                    // SAFETY: A non-null key marks an initialized value.
                    dst.write(unsafe { src.assume_init_ref() }.clone());
                }
            }
        }

        Self {
            keys: self.keys.clone(),
            values,
            null_entry: self.null_entry.clone(),
            n: self.n,
            mask: self.mask,
            segment_mask: self.segment_mask,
            base_mask: self.base_mask,
            max_fill: self.max_fill,
            min_n: self.min_n,
            size: self.size,
            load_factor: self.load_factor,
            strategy: self.strategy.clone(),
        }
    }
}

impl<K: Key, V, S, const SHIFT: u32> Drop for BigHashTable<K, V, S, SHIFT> {
    fn drop(&mut self) {
        if mem::needs_drop::<V>() {
            drop_values(&self.keys, &mut self.values);
        }
    }
}

/// Drops every value whose key is non-null. Keys are left as they are.
fn drop_values<K: Key, V, const SHIFT: u32>(
    keys: &BigArray<K, SHIFT>,
    values: &mut BigArray<MaybeUninit<V>, SHIFT>,
) {
    for (keys, values) in keys.segments().iter().zip(values.segments_mut()) {
        for (key, value) in keys.iter().zip(values.iter_mut()) {
            if !key.is_null() {
                // SAFETY: A non-null key marks an initialized value; callers reset
                // or discard the keys afterwards.
                unsafe { value.assume_init_drop() };
            }
        }
    }
}

impl<K: Key, V, S: Strategy<K> + Default, const SHIFT: u32> BigHashTable<K, V, S, SHIFT> {
    /// Creates a table sized for [`DEFAULT_INITIAL_SIZE`] entries at the
    /// default load factor.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INITIAL_SIZE as u64)
    }

    /// Creates a table sized for `expected` entries at the default load
    /// factor.
    pub fn with_capacity(expected: u64) -> Self {
        Self::with_capacity_and_load_factor(expected, DEFAULT_LOAD_FACTOR)
    }

    /// Creates a table sized for `expected` entries at load factor `f`.
    ///
    /// # Panics
    ///
    /// Panics if `f` is not in `(0, 1]` or the size cannot be addressed.
    pub fn with_capacity_and_load_factor(expected: u64, f: f32) -> Self {
        Self::with_capacity_and_strategy(expected, f, S::default())
    }
}

impl<K: Key, V, S: Strategy<K>, const SHIFT: u32> BigHashTable<K, V, S, SHIFT> {
    /// Creates a table with a custom key strategy.
    pub fn with_strategy(strategy: S) -> Self {
        Self::with_capacity_and_strategy(DEFAULT_INITIAL_SIZE as u64, DEFAULT_LOAD_FACTOR, strategy)
    }

    /// Creates a table with a custom key strategy, sized for `expected`
    /// entries at load factor `f`.
    ///
    /// # Panics
    ///
    /// Panics if `f` is not in `(0, 1]` or the size cannot be addressed.
    pub fn with_capacity_and_strategy(expected: u64, f: f32, strategy: S) -> Self {
        Self::try_with_capacity_and_strategy(expected, f, strategy).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Creates a table with a custom key strategy, reporting bad parameters
    /// instead of panicking.
    pub fn try_with_capacity_and_strategy(
        expected: u64,
        f: f32,
        strategy: S,
    ) -> Result<Self, ConfigError> {
        let n = try_big_array_size(expected, f)?;
        let (keys, values) = alloc_slots(n);

        let mut table = Self {
            keys,
            values,
            null_entry: None,
            n: 0,
            mask: 0,
            segment_mask: 0,
            base_mask: 0,
            max_fill: 0,
            min_n: n,
            size: 0,
            load_factor: f,
            strategy,
        };
        table.set_capacity(n);
        Ok(table)
    }

    fn set_capacity(&mut self, n: u64) {
        self.n = n;
        self.mask = n - 1;
        self.segment_mask = (n.min(segment_size::<SHIFT>()) - 1) as usize;
        self.base_mask = ((n >> SHIFT).max(1) - 1) as usize;
        self.max_fill = big_max_fill(n, self.load_factor);
    }

    /// Returns the number of entries, counting the null key.
    pub fn len(&self) -> u64 {
        self.size
    }

    /// Returns `true` if the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns how many entries the table holds before it grows.
    pub fn capacity(&self) -> u64 {
        self.max_fill
    }

    /// Returns the number of probe slots, always a power of two.
    pub fn slot_count(&self) -> u64 {
        self.n
    }

    /// Returns the number of storage segments.
    pub fn segment_count(&self) -> usize {
        self.keys.segments().len()
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
    fn home(&self, key: &K) -> u64 {
        mix_long(self.strategy.hash(key)) & self.mask
    }

    /// Probes for a key that is not null under the strategy: `Ok(slot)` if
    /// present, `Err(slot)` with the free slot otherwise.
    fn find_slot(&self, key: &K) -> Result<u64, u64> {
        let home = self.home(key);
        let mut base = segment::<SHIFT>(home);
        let mut displ = displacement::<SHIFT>(home);
        let segments = self.keys.segments();

        loop {
            let curr = &segments[base][displ];
            if curr.is_null() {
                return Err(index::<SHIFT>(base, displ));
            }
            if self.strategy.equals(key, curr) {
                return Ok(index::<SHIFT>(base, displ));
            }

            displ = (displ + 1) & self.segment_mask;
            if displ == 0 {
                base = (base + 1) & self.base_mask;
            }
        }
    }

    /// Returns `true` if the table contains `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        if self.strategy.is_null(key) {
            return self.null_entry.is_some();
        }
        self.find_slot(key).is_ok()
    }

    /// Returns the value stored for `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.get_key_value(key).map(|(_, v)| v)
    }

    /// Returns the stored key and value for `key`.
    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        if self.strategy.is_null(key) {
            return self.null_entry.as_ref().map(|(k, v)| (k, v));
        }
        let pos = self.find_slot(key).ok()?;
        // SAFETY: `find_slot` only returns `Ok` for occupied slots.
        Some((&self.keys[pos], unsafe { self.values[pos].assume_init_ref() }))
    }

    /// Returns a mutable reference to the value stored for `key`.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        if self.strategy.is_null(key) {
            return self.null_entry.as_mut().map(|(_, v)| v);
        }
        let pos = self.find_slot(key).ok()?;
        // SAFETY: `find_slot` only returns `Ok` for occupied slots.
        Some(unsafe { self.values[pos].assume_init_mut() })
    }

    /// Inserts a key-value pair, returning the previous value for the key.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if self.strategy.is_null(&key) {
            if let Some((_, old)) = &mut self.null_entry {
                return Some(mem::replace(old, value));
            }
            self.null_entry = Some((key, value));
        } else {
            match self.find_slot(&key) {
                Ok(pos) => {
                    // SAFETY: `find_slot` only returns `Ok` for occupied slots.
                    let old = unsafe { self.values[pos].assume_init_mut() };
                    return Some(mem::replace(old, value));
                }
                Err(pos) => {
                    self.keys[pos] = key;
                    self.values[pos].write(value);
                }
            }
        }

        self.size += 1;
        if self.size >= self.max_fill {
            let new_n = big_array_size(self.size + 1, self.load_factor).max(self.n * 2);
            self.rehash(new_n);
        }
        None
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.remove_entry(key).map(|(_, v)| v)
    }

    /// Removes `key`, returning the stored key and its value.
    pub fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        let entry = if self.strategy.is_null(key) {
            let entry = self.null_entry.take()?;
            self.size -= 1;
            entry
        } else {
            let pos = self.find_slot(key).ok()?;
            self.remove_at(pos, |_| {})
        };
        self.maybe_shrink();
        Some(entry)
    }

    fn remove_at(&mut self, pos: u64, on_wrap: impl FnMut(&K)) -> (K, V) {
        // SAFETY: Callers only pass occupied slots, and the key is nulled right after.
        let value = unsafe { self.values[pos].assume_init_read() };
        let key = self.keys.replace(pos, K::null());
        self.shift_keys(pos, on_wrap);
        self.size -= 1;
        (key, value)
    }

    fn shift_keys(&mut self, mut pos: u64, mut on_wrap: impl FnMut(&K)) {
        loop {
            let last = pos;
            pos = (last + 1) & self.mask;

            loop {
                if self.keys[pos].is_null() {
                    return;
                }
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
            self.keys.swap(last, pos);
            self.values.swap(last, pos);
        }
    }

    fn maybe_shrink(&mut self) {
        if self.n > self.min_n && self.size < self.max_fill / 4 {
            tracing::trace!(size = self.size, n = self.n, "big table sparse, halving");
            self.rehash(self.n / 2);
        }
    }

    fn rehash(&mut self, new_n: u64) {
        let (keys, values) = alloc_slots(new_n);
        self.rehash_into(keys, values, new_n);
    }

    fn rehash_into(
        &mut self,
        new_keys: BigArray<K, SHIFT>,
        new_values: BigArray<MaybeUninit<V>, SHIFT>,
        new_n: u64,
    ) {
        tracing::debug!(old = self.n, new = new_n, size = self.size, "rehash big table");

        let mut old_keys = mem::replace(&mut self.keys, new_keys);
        let mut old_values = mem::replace(&mut self.values, new_values);
        self.set_capacity(new_n);

        let old = old_keys.segments_mut().iter_mut().zip(old_values.segments_mut());
        for (keys, values) in old {
            for (slot, value) in keys.iter_mut().zip(values.iter_mut()) {
                if slot.is_null() {
                    continue;
                }
                let key = mem::replace(slot, K::null());
                // SAFETY: The key was non-null, so the value is initialized. It is moved
                // out exactly once and the old array never drops its contents.
                let value = unsafe { value.assume_init_read() };

                let mut pos = self.home(&key);
                while !self.keys[pos].is_null() {
                    pos = (pos + 1) & self.mask;
                }
                self.keys[pos] = key;
                self.values[pos].write(value);
            }
        }
    }

    /// Grows the table so it can take `additional` more entries without
    /// rehashing.
    pub fn reserve(&mut self, additional: u64) {
        let needed = big_array_size(self.size.saturating_add(additional), self.load_factor);
        if needed > self.n {
            self.rehash(needed);
        }
    }

    /// Shrinks the table to the smallest capacity that holds its entries.
    /// Returns `false` if the allocation failed.
    pub fn trim(&mut self) -> bool {
        self.trim_to(self.size)
    }

    /// Shrinks the table to the capacity needed for `target` entries, or for
    /// the current entries if there are more of them. Returns `false`,
    /// leaving the table untouched, if the allocation failed.
    pub fn trim_to(&mut self, target: u64) -> bool {
        let Ok(l) = try_big_array_size(target, self.load_factor) else {
            return true;
        };
        if l >= self.n || self.size > big_max_fill(l, self.load_factor) {
            return true;
        }

        match try_alloc_slots(l) {
            Ok((keys, values)) => {
                self.rehash_into(keys, values, l);
                self.min_n = self.min_n.min(l);
                true
            }
            Err(error) => {
                tracing::warn!(capacity = l, %error, "big table trim failed to allocate");
                false
            }
        }
    }

    /// Removes every entry, keeping the capacity.
    pub fn clear(&mut self) {
        if self.size == 0 {
            return;
        }
        drop_values(&self.keys, &mut self.values);
        for keys in self.keys.segments_mut() {
            keys.iter_mut().for_each(|k| *k = K::null());
        }
        self.null_entry = None;
        self.size = 0;
    }

    /// Returns an iterator over the entries: the null key first, then slots
    /// from the end of the table.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            null_entry: self.null_entry.as_ref().map(|(k, v)| (k, v)),
            segments: self.keys.segments().iter().zip(self.values.segments().iter()).rev(),
            current: None,
            remaining: self.size,
        }
    }

    /// Returns an iterator with mutable access to the values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            null_entry: self.null_entry.as_mut().map(|(k, v)| (&*k, v)),
            segments: self.keys.segments().iter().zip(self.values.segments_mut().iter_mut()).rev(),
            current: None,
            remaining: self.size,
        }
    }

    /// Returns an iterator over the keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    /// Returns an iterator over the values.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    /// Returns an iterator over mutable references to the values.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> + '_ {
        self.iter_mut().map(|(_, v)| v)
    }

    fn pop_unordered(&mut self, pos: &mut u64) -> Option<(K, V)> {
        if let Some(entry) = self.null_entry.take() {
            self.size -= 1;
            return Some(entry);
        }
        while *pos > 0 {
            *pos -= 1;
            if !self.keys[*pos].is_null() {
                self.size -= 1;
                let key = self.keys.replace(*pos, K::null());
                // SAFETY: The key was non-null, so the value is initialized; the key is
                // now null so the value is not read again.
                return Some((key, unsafe { self.values[*pos].assume_init_read() }));
            }
        }
        None
    }

    /// Returns a cursor that can remove the entry it just yielded. It
    /// behaves like [`HashTable::cursor`](crate::HashTable::cursor).
    pub fn cursor(&mut self) -> Cursor<'_, K, V, S, SHIFT>
    where
        K: Clone,
    {
        Cursor {
            pos: self.n,
            remaining: self.size,
            must_return_null: self.null_entry.is_some(),
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

impl<K: Key, V, S: Strategy<K> + Default, const SHIFT: u32> Default for BigHashTable<K, V, S, SHIFT> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Key, V, S: Strategy<K>, const SHIFT: u32> Extend<(K, V)> for BigHashTable<K, V, S, SHIFT> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.reserve(iter.size_hint().0 as u64);
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K: Key, V, S: Strategy<K> + Default, const SHIFT: u32> FromIterator<(K, V)>
    for BigHashTable<K, V, S, SHIFT>
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = Self::new();
        table.extend(iter);
        table
    }
}

impl<'a, K: Key, V, S: Strategy<K>, const SHIFT: u32> IntoIterator for &'a BigHashTable<K, V, S, SHIFT> {
    type IntoIter = Iter<'a, K, V>;
    type Item = (&'a K, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Key, V, S: Strategy<K>, const SHIFT: u32> IntoIterator for BigHashTable<K, V, S, SHIFT> {
    type IntoIter = IntoIter<K, V, S, SHIFT>;
    type Item = (K, V);

    fn into_iter(self) -> Self::IntoIter {
        let pos = self.n;
        IntoIter { table: self, pos }
    }
}

type SegmentIter<'a, K, V> = Rev<Zip<slice::Iter<'a, Box<[K]>>, slice::Iter<'a, Box<[MaybeUninit<V>]>>>>;
type SegmentIterMut<'a, K, V> =
    Rev<Zip<slice::Iter<'a, Box<[K]>>, slice::IterMut<'a, Box<[MaybeUninit<V>]>>>>;
type SlotIter<'a, K, V> = Rev<Zip<slice::Iter<'a, K>, slice::Iter<'a, MaybeUninit<V>>>>;
type SlotIterMut<'a, K, V> = Rev<Zip<slice::Iter<'a, K>, slice::IterMut<'a, MaybeUninit<V>>>>;

/// An iterator over the entries of a [`BigHashTable`].
pub struct Iter<'a, K, V> {
    null_entry: Option<(&'a K, &'a V)>,
    segments: SegmentIter<'a, K, V>,
    current: Option<SlotIter<'a, K, V>>,
    remaining: u64,
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

        loop {
            if let Some(slots) = &mut self.current {
                if let Some((key, value)) = slots.find(|(key, _)| !key.is_null()) {
                    // SAFETY: A non-null key marks an initialized value.
                    return Some((key, unsafe { value.assume_init_ref() }));
                }
            }
            let (keys, values) = self.segments.next()?;
            self.current = Some(keys.iter().zip(values.iter()).rev());
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (remaining, usize::try_from(self.remaining).ok())
    }
}

impl<K: Key, V> FusedIterator for Iter<'_, K, V> {}

/// A mutable iterator over the entries of a [`BigHashTable`].
pub struct IterMut<'a, K, V> {
    null_entry: Option<(&'a K, &'a mut V)>,
    segments: SegmentIterMut<'a, K, V>,
    current: Option<SlotIterMut<'a, K, V>>,
    remaining: u64,
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

        loop {
            if let Some(slots) = &mut self.current {
                if let Some((key, value)) = slots.find(|(key, _)| !key.is_null()) {
                    // SAFETY: A non-null key marks an initialized value.
                    return Some((key, unsafe { value.assume_init_mut() }));
                }
            }
            let (keys, values) = self.segments.next()?;
            self.current = Some(keys.iter().zip(values.iter_mut()).rev());
        }
    }
}

/// An owning iterator over the entries of a [`BigHashTable`].
pub struct IntoIter<K: Key, V, S, const SHIFT: u32> {
    table: BigHashTable<K, V, S, SHIFT>,
    pos: u64,
}

impl<K: Key, V, S: Strategy<K>, const SHIFT: u32> Iterator for IntoIter<K, V, S, SHIFT> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.table.pop_unordered(&mut self.pos)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Last {
    None,
    Null,
    Slot(u64),
    Wrapped(usize),
}

/// A removal-aware traversal of a [`BigHashTable`].
pub struct Cursor<'a, K: Key, V, S, const SHIFT: u32> {
    table: &'a mut BigHashTable<K, V, S, SHIFT>,
    pos: u64,
    remaining: u64,
    must_return_null: bool,
    last: Last,
    wrapped: Vec<K>,
    wrapped_pos: usize,
}

impl<K: Key + Clone, V, S: Strategy<K>, const SHIFT: u32> Cursor<'_, K, V, S, SHIFT> {
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

        if self.must_return_null {
            self.must_return_null = false;
            self.remaining -= 1;
            self.last = Last::Null;
            return self.table.null_entry.as_mut().map(|(k, v)| (&*k, v));
        }

        let pos = loop {
            if self.pos == 0 {
                let index = self.wrapped_pos;
                let key = self.wrapped.get(index)?;
                self.wrapped_pos += 1;
                let pos = self.locate_wrapped(key);
                self.last = Last::Wrapped(index);
                break pos;
            }
            self.pos -= 1;
            if !self.table.keys[self.pos].is_null() {
                self.last = Last::Slot(self.pos);
                break self.pos;
            }
        };

        self.remaining -= 1;
        let table = &mut *self.table;
        // SAFETY: `pos` is an occupied slot found by the scan or by probing.
        Some((&table.keys[pos], unsafe { table.values[pos].assume_init_mut() }))
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
            Last::Null => {
                let entry = self.table.null_entry.take().ok_or(CursorError::NoCurrentEntry)?;
                self.table.size -= 1;
                Ok(entry)
            }
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

    fn locate_wrapped(&self, key: &K) -> u64 {
        match self.table.find_slot(key) {
            Ok(pos) => pos,
            Err(_) => unreachable!("shifted entry vanished from the table"),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::vec;
    use alloc::vec::Vec;
    use std::collections::HashMap as StdHashMap;
    use std::collections::HashSet as StdHashSet;

    use rand::Rng;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::common::inv_mix_long;
    use crate::key::FnStrategy;

    /// Eight-slot segments, so small tables already span several segments.
    type Small<K, V, S = Natural> = BigHashTable<K, V, S, 3>;

    fn placed() -> FnStrategy<impl Fn(&u64) -> u64 + Clone, impl Fn(&u64, &u64) -> bool + Clone> {
        FnStrategy::new(|k: &u64| inv_mix_long(*k >> 8), |a: &u64, b: &u64| a == b)
    }

    fn at(home: u64, tag: u64) -> u64 {
        (home << 8) | tag
    }

    fn assert_probe_invariant<K: Key, V, S: Strategy<K>, const SHIFT: u32>(
        table: &BigHashTable<K, V, S, SHIFT>,
    ) {
        let mut live = 0;
        for i in 0..table.n {
            if table.keys[i].is_null() {
                continue;
            }
            live += 1;
            let mut pos = table.home(&table.keys[i]);
            while pos != i {
                assert!(!table.keys[pos].is_null(), "slot {i} unreachable from its home");
                pos = (pos + 1) & table.mask;
            }
        }
        if table.null_entry.is_some() {
            live += 1;
        }
        assert_eq!(live, table.size);
    }

    #[test]
    fn segment_geometry() {
        let table: Small<u64, ()> = Small::with_capacity_and_load_factor(4, 0.75);
        assert_eq!(table.slot_count(), 8);
        assert_eq!(table.segment_count(), 1);

        let table: Small<u64, ()> = Small::with_capacity_and_load_factor(100, 0.5);
        assert_eq!(table.slot_count(), 256);
        assert_eq!(table.segment_count(), 32);
        assert_eq!(table.segment_mask, 7);
        assert_eq!(table.base_mask, 31);

        let table: BigHashTable<u64, ()> = BigHashTable::with_capacity(1000);
        assert_eq!(table.segment_count(), 1);
        assert_eq!(table.segment_mask, 2047);
    }

    #[test]
    fn insert_and_get_across_segments() {
        let mut table: Small<u64, u64> = Small::with_capacity(0);
        for k in 0..2000 {
            assert_eq!(table.insert(k, k + 1), None);
        }
        assert_eq!(table.len(), 2000);
        assert!(table.segment_count() > 1);
        for k in 0..2000 {
            assert_eq!(table.get(&k), Some(&(k + 1)));
        }
        assert!(!table.contains_key(&2000));
        assert_probe_invariant(&table);
    }

    #[test]
    fn grows_then_shrinks_back_to_initial_capacity() {
        let mut table: Small<u32, u32> = Small::with_capacity_and_load_factor(4, 0.75);
        assert_eq!(table.slot_count(), 8);
        for k in 1..=6 {
            table.insert(k, k);
        }
        assert_eq!(table.slot_count(), 16);
        for k in 1..=5 {
            table.remove(&k);
        }
        assert_eq!(table.slot_count(), 8);
        assert_eq!(table.get(&6), Some(&6));
    }

    #[test]
    fn probe_crosses_segment_boundary() {
        let mut table: Small<u64, u64, _> = Small::with_capacity_and_strategy(8, 0.75, placed());
        assert_eq!(table.slot_count(), 16);
        assert_eq!(table.segment_count(), 2);

        // Three keys homed at slot 7, the last slot of segment 0.
        let keys = [at(7, 1), at(7, 2), at(7, 3)];
        for &k in &keys {
            table.insert(k, k);
        }
        assert_eq!(table.keys.segments()[0][7], at(7, 1));
        assert_eq!(table.keys.segments()[1][0], at(7, 2));
        assert_eq!(table.keys.segments()[1][1], at(7, 3));
        for &k in &keys {
            assert_eq!(table.get(&k), Some(&k));
        }

        table.remove(&at(7, 1));
        assert_eq!(table.keys.segments()[0][7], at(7, 2));
        assert_eq!(table.keys.segments()[1][0], at(7, 3));
        assert!(table.keys.segments()[1][1].is_null());
        assert_probe_invariant(&table);
    }

    #[test]
    fn segment_aligned_keys_survive_growth() {
        // Each key hashes to its own value, so `seg * 8` is homed at offset 0
        // of segment `seg` for as long as the table is large enough.
        let identity = FnStrategy::new(|k: &u64| inv_mix_long(*k), |a: &u64, b: &u64| a == b);
        let mut table: Small<u64, u64, _> = Small::with_capacity_and_strategy(4, 0.75, identity);
        assert_eq!(table.slot_count(), 8);

        let keys: Vec<u64> = (1..200).map(|seg| seg * 8).collect();
        let mut last_slots = table.slot_count();
        let mut grows = 0;
        for &k in &keys {
            assert_eq!(table.insert(k, k / 8), None);
            assert_eq!(table.home(&k) & 7, 0);
            if table.slot_count() != last_slots {
                last_slots = table.slot_count();
                grows += 1;
                assert!(keys.iter().take_while(|&&j| j <= k).all(|j| table.get(j) == Some(&(j / 8))));
            }
        }
        assert!(grows >= 3);
        assert!(table.segment_count() > 1);
        assert_probe_invariant(&table);

        for &k in keys.iter().step_by(2) {
            assert_eq!(table.remove(&k), Some(k / 8));
        }
        for (i, k) in keys.iter().enumerate() {
            assert_eq!(table.contains_key(k), i % 2 == 1);
        }
        assert_eq!(table.len(), 99);
        assert_probe_invariant(&table);
    }

    #[test]
    fn probe_wraps_from_last_segment_to_first() {
        let mut table: Small<u64, (), _> = Small::with_capacity_and_strategy(8, 0.75, placed());
        let keys = [at(15, 1), at(15, 2), at(15, 3), at(0, 1)];
        for &k in &keys {
            table.insert(k, ());
        }
        assert_eq!(table.keys.segments()[1][7], at(15, 1));
        assert_eq!(table.keys.segments()[0][0], at(15, 2));
        assert_eq!(table.keys.segments()[0][2], at(0, 1));

        table.remove(&at(15, 1));
        assert_eq!(table.keys[15], at(15, 2));
        assert_eq!(table.keys[0], at(15, 3));
        assert_eq!(table.keys[1], at(0, 1));
        assert!(table.keys[2].is_null());
        assert!(keys[1..].iter().all(|k| table.contains_key(k)));
    }

    #[test]
    fn null_key_is_held_out_of_band() {
        let mut table: Small<i32, &str> = Small::new();
        table.insert(0, "zero");
        table.insert(1, "one");
        assert_eq!(table.len(), 2);
        assert_eq!(table.iter().next(), Some((&0, &"zero")));
        assert_eq!(table.insert(0, "nil"), Some("zero"));
        *table.get_mut(&0).unwrap() = "none";
        assert_eq!(table.remove_entry(&0), Some((0, "none")));
        assert!(!table.contains_key(&0));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn random_churn_matches_model() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut table: Small<u64, u64> = Small::with_capacity(4);
        let mut model = StdHashMap::new();
        for round in 0..20_000u64 {
            let key = rng.random_range(0..700);
            if rng.random_bool(0.6) {
                assert_eq!(table.insert(key, round), model.insert(key, round));
            } else {
                assert_eq!(table.remove(&key), model.remove(&key));
            }
            if round % 2000 == 0 {
                assert_probe_invariant(&table);
            }
        }
        assert_eq!(table.len(), model.len() as u64);
        for (k, v) in &model {
            assert_eq!(table.get(k), Some(v));
        }
        assert_eq!(table.iter().count(), model.len());
    }

    #[test]
    fn cursor_every_third_across_segments() {
        let mut table: Small<u32, u32> = (1..=100).map(|k| (k, k)).collect();
        let mut seen = StdHashSet::new();
        let mut cursor = table.cursor();
        let mut i = 0;
        while let Some((&k, _)) = cursor.next() {
            assert!(seen.insert(k));
            i += 1;
            if i % 3 == 0 {
                cursor.remove().unwrap();
            }
        }
        assert_eq!(seen.len(), 100);
        assert_eq!(table.len(), 67);
        assert_probe_invariant(&table);
    }

    #[test]
    fn cursor_yields_entries_shifted_across_the_end() {
        let mut table: Small<u64, (), _> = Small::with_capacity_and_strategy(8, 0.75, placed());
        let keys = [at(15, 1), at(15, 2), at(15, 3), at(15, 4), at(1, 1), 0];
        for &k in &keys {
            table.insert(k, ());
        }

        let mut yielded = vec![];
        let mut cursor = table.cursor();
        while let Some((&k, _)) = cursor.next() {
            yielded.push(k);
            cursor.remove().unwrap();
        }
        yielded.sort_unstable();
        let mut expected = keys.to_vec();
        expected.sort_unstable();
        assert_eq!(yielded, expected);
        assert!(table.is_empty());
        assert_eq!(table.slot_count(), 16);
    }

    #[test]
    fn trim_and_clear() {
        let mut table: Small<u64, u64> = Small::with_capacity(1000);
        table.extend((0..20).map(|k| (k, k)));
        assert!(table.trim());
        assert_eq!(table.slot_count(), 32);
        assert_eq!(table.segment_count(), 4);
        assert!((0..20).all(|k| table.get(&k) == Some(&k)));

        table.clear();
        assert!(table.is_empty());
        assert!(!table.contains_key(&0));
        assert!(!table.contains_key(&5));
        assert_eq!(table.slot_count(), 32);
    }

    #[test]
    fn shrink_floor() {
        let mut table: Small<u64, ()> = Small::with_capacity(1000);
        for k in 0..4000 {
            table.insert(k, ());
        }
        for k in 0..4000 {
            table.remove(&k);
            assert!(table.slot_count() >= 2048);
        }
        assert_eq!(table.slot_count(), 2048);
    }

    #[test]
    fn values_are_dropped_exactly_once() {
        let marker = Rc::new(());
        {
            let mut table: Small<u32, Rc<()>> = Small::with_capacity(2);
            for k in 0..64 {
                table.insert(k, Rc::clone(&marker));
            }
            for k in 0..32 {
                table.remove(&k);
            }
            assert_eq!(Rc::strong_count(&marker), 33);

            let copy = table.clone();
            assert_eq!(Rc::strong_count(&marker), 65);
            let mut rest = copy.into_iter();
            rest.next();
            drop(rest);
            assert_eq!(Rc::strong_count(&marker), 33);

            table.retain(|k, _| k % 2 == 0);
            assert_eq!(Rc::strong_count(&marker), 17);
            for v in table.values_mut() {
                *v = Rc::clone(&marker);
            }
            assert_eq!(Rc::strong_count(&marker), 17);
        }
        assert_eq!(Rc::strong_count(&marker), 1);
    }
}
