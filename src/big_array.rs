//! Segmented arrays addressed by 64-bit logical indices.
//!
//! A logical index `i` is split into a segment number `i >> SHIFT` and a
//! displacement `i & (2^SHIFT - 1)` inside that segment. Every segment but
//! the last holds exactly `2^SHIFT` elements, so very large arrays never
//! need one contiguous allocation.

use alloc::boxed::Box;
use alloc::collections::TryReserveError;
use alloc::vec::Vec;
use core::mem;
use core::ops::Index;
use core::ops::IndexMut;

/// Default segment shift: segments of 2<sup>27</sup> elements.
pub const SEGMENT_SHIFT: u32 = 27;

/// Returns the number of elements in a full segment.
#[inline(always)]
pub const fn segment_size<const SHIFT: u32>() -> u64 {
    1 << SHIFT
}

/// Returns the segment holding logical index `index`.
#[inline(always)]
pub const fn segment<const SHIFT: u32>(index: u64) -> usize {
    (index >> SHIFT) as usize
}

/// Returns the position of logical index `index` inside its segment.
#[inline(always)]
pub const fn displacement<const SHIFT: u32>(index: u64) -> usize {
    (index & (segment_size::<SHIFT>() - 1)) as usize
}

/// Recombines a segment number and a displacement into a logical index.
#[inline(always)]
pub const fn index<const SHIFT: u32>(segment: usize, displacement: usize) -> u64 {
    ((segment as u64) << SHIFT) | displacement as u64
}

/// An array of `len` elements stored as segments of `2^SHIFT` elements.
///
/// ```rust
/// use shift_hash::big_array::BigArray;
///
/// let mut array: BigArray<u32, 2> = BigArray::from_fn(10, || 0);
/// assert_eq!(array.segments().len(), 3);
/// array[9] = 7;
/// array.swap(9, 0);
/// assert_eq!(array[0], 7);
/// ```
#[derive(Clone, Debug)]
pub struct BigArray<T, const SHIFT: u32 = SEGMENT_SHIFT> {
    segments: Vec<Box<[T]>>,
    len: u64,
}

impl<T, const SHIFT: u32> BigArray<T, SHIFT> {
    fn segment_lengths(len: u64) -> impl Iterator<Item = usize> {
        let size = segment_size::<SHIFT>();
        let count = len.div_ceil(size);
        (0..count).map(move |i| (len - i * size).min(size) as usize)
    }

    /// Creates an array of `len` elements produced by `fill`.
    pub fn from_fn(len: u64, mut fill: impl FnMut() -> T) -> Self {
        let segments = Self::segment_lengths(len)
            .map(|seg_len| (0..seg_len).map(|_| fill()).collect())
            .collect();
        Self { segments, len }
    }

    /// Like [`from_fn`](Self::from_fn), but reports allocation failure
    /// instead of aborting.
    pub fn try_from_fn(len: u64, mut fill: impl FnMut() -> T) -> Result<Self, TryReserveError> {
        let mut segments = Vec::new();
        segments.try_reserve_exact(len.div_ceil(segment_size::<SHIFT>()) as usize)?;
        for seg_len in Self::segment_lengths(len) {
            let mut segment = Vec::new();
            segment.try_reserve_exact(seg_len)?;
            segment.resize_with(seg_len, &mut fill);
            segments.push(segment.into_boxed_slice());
        }
        Ok(Self { segments, len })
    }

    /// Returns the logical length.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns `true` if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the segments.
    pub fn segments(&self) -> &[Box<[T]>] {
        &self.segments
    }

    /// Returns the segments, mutably.
    pub fn segments_mut(&mut self) -> &mut [Box<[T]>] {
        &mut self.segments
    }

    /// Swaps the elements at logical indices `a` and `b`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of bounds.
    pub fn swap(&mut self, a: u64, b: u64) {
        let (sa, da) = (segment::<SHIFT>(a), displacement::<SHIFT>(a));
        let (sb, db) = (segment::<SHIFT>(b), displacement::<SHIFT>(b));
        if sa == sb {
            self.segments[sa].swap(da, db);
            return;
        }

        let (low, high, dl, dh) = if sa < sb { (sa, sb, da, db) } else { (sb, sa, db, da) };
        let (head, tail) = self.segments.split_at_mut(high);
        mem::swap(&mut head[low][dl], &mut tail[0][dh]);
    }

    /// Stores `value` at `index`, returning the previous element.
    pub fn replace(&mut self, index: u64, value: T) -> T {
        mem::replace(&mut self[index], value)
    }
}

impl<T, const SHIFT: u32> Index<u64> for BigArray<T, SHIFT> {
    type Output = T;

    #[inline(always)]
    fn index(&self, index: u64) -> &T {
        &self.segments[segment::<SHIFT>(index)][displacement::<SHIFT>(index)]
    }
}

impl<T, const SHIFT: u32> IndexMut<u64> for BigArray<T, SHIFT> {
    #[inline(always)]
    fn index_mut(&mut self, index: u64) -> &mut T {
        &mut self.segments[segment::<SHIFT>(index)][displacement::<SHIFT>(index)]
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;

    #[test]
    fn index_decomposition() {
        assert_eq!(segment::<3>(0), 0);
        assert_eq!(segment::<3>(7), 0);
        assert_eq!(segment::<3>(8), 1);
        assert_eq!(displacement::<3>(13), 5);
        assert_eq!(index::<3>(1, 5), 13);
        for i in 0..1000u64 {
            assert_eq!(index::<4>(segment::<4>(i), displacement::<4>(i)), i);
        }
        assert_eq!(segment::<SEGMENT_SHIFT>(1 << 27), 1);
    }

    #[test]
    fn segments_are_full_except_the_last() {
        let array: BigArray<u8, 3> = BigArray::from_fn(20, || 1);
        let lengths: Vec<usize> = array.segments().iter().map(|s| s.len()).collect();
        assert_eq!(lengths, [8, 8, 4]);
        assert_eq!(array.len(), 20);

        let small: BigArray<u8, 3> = BigArray::from_fn(4, || 1);
        assert_eq!(small.segments().len(), 1);
        assert_eq!(small.segments()[0].len(), 4);

        let empty: BigArray<u8, 3> = BigArray::from_fn(0, || 1);
        assert!(empty.is_empty());
        assert!(empty.segments().is_empty());
    }

    #[test]
    fn logical_indexing_crosses_segments() {
        let mut next = 0u64;
        let mut array: BigArray<u64, 2> = BigArray::try_from_fn(16, || {
            next += 1;
            next - 1
        })
        .unwrap();
        for i in 0..16 {
            assert_eq!(array[i], i);
        }

        array.swap(1, 14);
        assert_eq!((array[1], array[14]), (14, 1));
        array.swap(14, 1);
        array.swap(5, 6);
        assert_eq!((array[5], array[6]), (6, 5));

        assert_eq!(array.replace(12, 100), 12);
        assert_eq!(array.segments()[3][0], 100);
    }
}
