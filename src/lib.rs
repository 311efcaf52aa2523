#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;
#[cfg(all(test, not(feature = "std")))]
extern crate std;

pub mod array_map;
pub mod big_array;

/// A set over the segmented [`BigHashTable`].
///
/// Lengths are 64-bit, and the key and value arrays are split into segments
/// so no single allocation grows past `2^SHIFT` slots.
pub mod big_hash_set;

pub mod big_table;
pub mod common;
pub mod error;

/// A map over [`HashTable`] with a configurable default return value.
///
/// Besides the usual map interface it offers the counter-style
/// [`add_to`](HashMap::add_to) and a cursor that removes while iterating.
pub mod hash_map;

pub mod hash_table;

/// A set over [`HashTable`] storing `()` values.
pub mod hash_set;

pub mod key;

#[cfg(feature = "serde")]
mod serde;

pub use array_map::ArrayMap;
pub use big_hash_set::BigHashSet;
pub use big_table::BigHashTable;
pub use error::ConfigError;
pub use error::CursorError;
pub use hash_map::HashMap;
pub use hash_set::HashSet;
pub use hash_table::Entry;
pub use hash_table::HashTable;
pub use key::FnStrategy;
pub use key::Key;
pub use key::Natural;
pub use key::Strategy;
