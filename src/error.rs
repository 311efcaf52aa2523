//! Error types.
//!
//! Configuration problems are detected when a container is built and reported
//! through [`ConfigError`]; the non-`try` constructors panic with the same
//! message. Misusing a removal cursor is reported through [`CursorError`].

/// An invalid construction parameter.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// The load factor was not in `(0, 1]`.
    #[error("load factor must be in (0, 1], got {0}")]
    InvalidLoadFactor(f32),

    /// The requested size cannot be addressed by the table.
    #[error("expected size {expected} exceeds the maximum table capacity")]
    CapacityOverflow {
        /// The expected number of entries that was requested.
        expected: u64,
    },

    /// Parallel key and value arrays had different lengths.
    #[error("key array has {keys} elements but value array has {values}")]
    LengthMismatch {
        /// Length of the key array.
        keys: usize,
        /// Length of the value array.
        values: usize,
    },
}

/// Misuse of a removal cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CursorError {
    /// `remove` was called before the first `next`, or twice for the same
    /// entry.
    #[error("no current entry: call next() before remove()")]
    NoCurrentEntry,
}
