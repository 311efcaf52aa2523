//! Key types and key-equivalence strategies.
//!
//! Tables never store an occupancy bit per slot. Instead every key type
//! names one "null" value through [`Key::null`]; a slot holding the null
//! value is empty. The null value is still a perfectly good key: tables keep
//! it out of the probe sequence in a reserved slot.
//!
//! How keys are hashed and compared is decided by a [`Strategy`]. The default
//! [`Natural`] strategy uses the key type's own [`Key::hash_code`] and
//! [`Key::key_eq`] and is resolved at compile time. Custom strategies (for
//! instance case-insensitive strings) can be supplied as any type
//! implementing [`Strategy`], including a boxed trait object.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::hash::BuildHasher;
use core::hash::Hash;

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        type ObjectHashState = foldhash::fast::FixedState;
    } else {
        #[allow(deprecated)]
        type ObjectHashState = core::hash::BuildHasherDefault<core::hash::SipHasher>;
    }
}

#[inline]
fn object_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    ObjectHashState::default().hash_one(value)
}

/// A type that can be used as a table key.
pub trait Key: Sized {
    /// The value that marks an empty slot.
    fn null() -> Self;

    /// Whether `self` is the null value, bit for bit.
    fn is_null(&self) -> bool;

    /// The natural hash code, before mixing.
    fn hash_code(&self) -> u64;

    /// Natural equality. Must be consistent with [`Key::hash_code`].
    fn key_eq(&self, other: &Self) -> bool;
}

macro_rules! int_key {
    ($($t:ty),*) => {$(
        impl Key for $t {
            #[inline(always)]
            fn null() -> Self {
                0
            }

            #[inline(always)]
            fn is_null(&self) -> bool {
                *self == 0
            }

            #[inline(always)]
            fn hash_code(&self) -> u64 {
                *self as u64
            }

            #[inline(always)]
            fn key_eq(&self, other: &Self) -> bool {
                self == other
            }
        }
    )*};
}

int_key!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

impl Key for u128 {
    fn null() -> Self {
        0
    }

    fn is_null(&self) -> bool {
        *self == 0
    }

    fn hash_code(&self) -> u64 {
        (*self as u64) ^ ((*self >> 64) as u64)
    }

    fn key_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl Key for i128 {
    fn null() -> Self {
        0
    }

    fn is_null(&self) -> bool {
        *self == 0
    }

    fn hash_code(&self) -> u64 {
        (*self as u128).hash_code()
    }

    fn key_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl Key for bool {
    fn null() -> Self {
        false
    }

    fn is_null(&self) -> bool {
        !*self
    }

    fn hash_code(&self) -> u64 {
        *self as u64
    }

    fn key_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl Key for char {
    fn null() -> Self {
        '\0'
    }

    fn is_null(&self) -> bool {
        *self == '\0'
    }

    fn hash_code(&self) -> u64 {
        *self as u64
    }

    fn key_eq(&self, other: &Self) -> bool {
        self == other
    }
}

// Floating-point keys compare by bit pattern with every NaN collapsed to the
// canonical one, so NaN finds itself and `-0.0` is a different key from
// `0.0`. Only `+0.0` is null.
macro_rules! float_key {
    ($($t:ty),*) => {$(
        impl Key for $t {
            #[inline(always)]
            fn null() -> Self {
                0.0
            }

            #[inline(always)]
            fn is_null(&self) -> bool {
                self.to_bits() == 0
            }

            #[inline(always)]
            fn hash_code(&self) -> u64 {
                if self.is_nan() {
                    <$t>::NAN.to_bits() as u64
                } else {
                    self.to_bits() as u64
                }
            }

            #[inline(always)]
            fn key_eq(&self, other: &Self) -> bool {
                if self.is_nan() {
                    other.is_nan()
                } else {
                    self.to_bits() == other.to_bits()
                }
            }
        }
    )*};
}

float_key!(f32, f64);

impl<T: Hash + Eq> Key for Option<T> {
    fn null() -> Self {
        None
    }

    fn is_null(&self) -> bool {
        self.is_none()
    }

    fn hash_code(&self) -> u64 {
        object_hash(self)
    }

    fn key_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl Key for String {
    fn null() -> Self {
        String::new()
    }

    fn is_null(&self) -> bool {
        self.is_empty()
    }

    fn hash_code(&self) -> u64 {
        object_hash(self.as_str())
    }

    fn key_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl<T: Hash + Eq> Key for Vec<T> {
    fn null() -> Self {
        Vec::new()
    }

    fn is_null(&self) -> bool {
        self.is_empty()
    }

    fn hash_code(&self) -> u64 {
        object_hash(self.as_slice())
    }

    fn key_eq(&self, other: &Self) -> bool {
        self == other
    }
}

/// Boxed keys.
///
/// `null()` allocates, and tables call it for every empty slot, so each
/// rehash makes one small allocation per slot. Prefer unboxed keys in tables
/// that resize often.
impl<T: Key> Key for Box<T> {
    fn null() -> Self {
        Box::new(T::null())
    }

    fn is_null(&self) -> bool {
        (**self).is_null()
    }

    fn hash_code(&self) -> u64 {
        (**self).hash_code()
    }

    fn key_eq(&self, other: &Self) -> bool {
        (**self).key_eq(other)
    }
}

/// Hashing and equality for keys of type `K`.
///
/// Implementations must keep `hash` consistent with `equals`: keys that are
/// equal must hash equally. A key that is `equals` to [`Key::null`] is stored
/// in the table's reserved slot.
pub trait Strategy<K: Key> {
    /// Hash code of `key`, before mixing.
    fn hash(&self, key: &K) -> u64;

    /// Whether `a` and `b` are the same key.
    fn equals(&self, a: &K, b: &K) -> bool;

    /// Whether `key` is routed to the reserved slot.
    #[inline]
    fn is_null(&self, key: &K) -> bool {
        self.equals(key, &K::null())
    }
}

/// The key type's own hashing and equality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Natural;

impl<K: Key> Strategy<K> for Natural {
    #[inline(always)]
    fn hash(&self, key: &K) -> u64 {
        key.hash_code()
    }

    #[inline(always)]
    fn equals(&self, a: &K, b: &K) -> bool {
        a.key_eq(b)
    }

    #[inline(always)]
    fn is_null(&self, key: &K) -> bool {
        key.is_null()
    }
}

/// A strategy assembled from two closures.
///
/// ```rust
/// use shift_hash::HashSet;
/// use shift_hash::key::FnStrategy;
///
/// // Integers compared modulo 10.
/// let strategy = FnStrategy::new(|k: &u32| u64::from(k % 10), |a: &u32, b: &u32| a % 10 == b % 10);
/// let mut set = HashSet::with_strategy(strategy);
/// assert!(set.insert(13));
/// assert!(!set.insert(23));
/// assert!(set.contains(&3));
/// ```
#[derive(Clone, Copy)]
pub struct FnStrategy<H, E> {
    hash: H,
    equals: E,
}

impl<H, E> FnStrategy<H, E> {
    /// Creates a strategy from a hash function and an equality predicate.
    pub fn new(hash: H, equals: E) -> Self {
        Self { hash, equals }
    }
}

impl<K, H, E> Strategy<K> for FnStrategy<H, E>
where
    K: Key,
    H: Fn(&K) -> u64,
    E: Fn(&K, &K) -> bool,
{
    #[inline]
    fn hash(&self, key: &K) -> u64 {
        (self.hash)(key)
    }

    #[inline]
    fn equals(&self, a: &K, b: &K) -> bool {
        (self.equals)(a, b)
    }
}

macro_rules! forward_strategy {
    ($($ptr:ident),*) => {$(
        impl<K: Key, T: Strategy<K> + ?Sized> Strategy<K> for $ptr<T> {
            #[inline]
            fn hash(&self, key: &K) -> u64 {
                (**self).hash(key)
            }

            #[inline]
            fn equals(&self, a: &K, b: &K) -> bool {
                (**self).equals(a, b)
            }

            #[inline]
            fn is_null(&self, key: &K) -> bool {
                (**self).is_null(key)
            }
        }
    )*};
}

forward_strategy!(Box, Rc, Arc);

impl<K: Key, T: Strategy<K> + ?Sized> Strategy<K> for &T {
    #[inline]
    fn hash(&self, key: &K) -> u64 {
        (**self).hash(key)
    }

    #[inline]
    fn equals(&self, a: &K, b: &K) -> bool {
        (**self).equals(a, b)
    }

    #[inline]
    fn is_null(&self, key: &K) -> bool {
        (**self).is_null(key)
    }
}
