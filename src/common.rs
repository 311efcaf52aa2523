//! Hash mixing and table sizing.
//!
//! Every raw hash code passes through [`mix_long`] before it is masked down
//! to a slot index. Linear probing degrades badly when the low bits of the
//! hash codes are correlated (sequential integers, aligned pointers), and the
//! backward-shift deletion in this crate assumes a reasonably uniform spread
//! of home slots.

use crate::error::ConfigError;

/// 2<sup>32</sup> &middot; &phi;, the golden-ratio multiplier for 32-bit
/// mixing.
pub const INT_PHI: u32 = 0x9E37_79B9;
/// The multiplicative inverse of [`INT_PHI`] modulo 2<sup>32</sup>.
pub const INV_INT_PHI: u32 = 0x144C_BC89;
/// 2<sup>64</sup> &middot; &phi;, the golden-ratio multiplier for 64-bit
/// mixing.
pub const LONG_PHI: u64 = 0x9E37_79B9_7F4A_7C15;
/// The multiplicative inverse of [`LONG_PHI`] modulo 2<sup>64</sup>.
pub const INV_LONG_PHI: u64 = 0xF1DE_83E1_9937_733D;

/// Initial expected size used by the `new` constructors.
pub const DEFAULT_INITIAL_SIZE: usize = 16;
/// Default load factor.
pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;
/// Load factor trading memory for shorter probe sequences.
pub const FAST_LOAD_FACTOR: f32 = 0.5;
/// Load factor trading even more memory for shorter probe sequences.
pub const VERY_FAST_LOAD_FACTOR: f32 = 0.25;

/// Smallest capacity a table is ever allocated with.
pub const MIN_CAPACITY: usize = 2;
/// Largest capacity of a flat table. Larger tables should use
/// [`BigHashTable`](crate::BigHashTable).
pub const MAX_FLAT_CAPACITY: usize = 1 << 30;
/// Largest capacity of a big table.
pub const MAX_BIG_CAPACITY: u64 = 1 << 62;

/// Avalanches a 32-bit hash code.
#[inline(always)]
pub const fn mix(x: u32) -> u32 {
    let h = x.wrapping_mul(INT_PHI);
    h ^ (h >> 16)
}

/// The inverse of [`mix`].
#[inline]
pub const fn inv_mix(x: u32) -> u32 {
    (x ^ (x >> 16)).wrapping_mul(INV_INT_PHI)
}

/// Avalanches a 64-bit hash code.
#[inline(always)]
pub const fn mix_long(x: u64) -> u64 {
    let mut h = x.wrapping_mul(LONG_PHI);
    h ^= h >> 32;
    h ^ (h >> 16)
}

/// The inverse of [`mix_long`]: `mix_long(inv_mix_long(x)) == x`.
///
/// Useful to construct hash codes that land on a chosen slot.
#[inline]
pub const fn inv_mix_long(x: u64) -> u64 {
    let mut x = x ^ (x >> 16) ^ (x >> 32) ^ (x >> 48);
    x ^= x >> 32;
    x.wrapping_mul(INV_LONG_PHI)
}

#[inline]
pub(crate) fn check_load_factor(f: f32) -> Result<(), ConfigError> {
    // Written so that NaN fails too.
    if f > 0.0 && f <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidLoadFactor(f))
    }
}

/// Returns the smallest power-of-two capacity `n` such that
/// `expected <= n * f`, and at least [`MIN_CAPACITY`].
///
/// # Errors
///
/// Fails if the load factor is not in `(0, 1]` or if the capacity would
/// exceed [`MAX_FLAT_CAPACITY`].
pub fn try_array_size(expected: usize, f: f32) -> Result<usize, ConfigError> {
    check_load_factor(f)?;
    let s = (expected as f64 / f64::from(f)).ceil();
    if s > MAX_FLAT_CAPACITY as f64 {
        return Err(ConfigError::CapacityOverflow {
            expected: expected as u64,
        });
    }
    Ok((s as usize).next_power_of_two().max(MIN_CAPACITY))
}

/// Panicking variant of [`try_array_size`].
///
/// # Panics
///
/// Panics on an invalid load factor or a capacity overflow.
pub fn array_size(expected: usize, f: f32) -> usize {
    try_array_size(expected, f).unwrap_or_else(|e| panic!("{e}"))
}

/// Big-table version of [`try_array_size`], bounded by [`MAX_BIG_CAPACITY`].
///
/// # Errors
///
/// Fails if the load factor is not in `(0, 1]` or if the capacity would
/// exceed [`MAX_BIG_CAPACITY`].
pub fn try_big_array_size(expected: u64, f: f32) -> Result<u64, ConfigError> {
    check_load_factor(f)?;
    let s = (expected as f64 / f64::from(f)).ceil();
    if s > MAX_BIG_CAPACITY as f64 {
        return Err(ConfigError::CapacityOverflow { expected });
    }
    Ok((s as u64).next_power_of_two().max(MIN_CAPACITY as u64))
}

/// Panicking variant of [`try_big_array_size`].
///
/// # Panics
///
/// Panics on an invalid load factor or a capacity overflow.
pub fn big_array_size(expected: u64, f: f32) -> u64 {
    try_big_array_size(expected, f).unwrap_or_else(|e| panic!("{e}"))
}

/// The number of entries a table of capacity `n` holds before it grows:
/// `floor(n * f)`, capped at `n - 1` so at least one slot is always empty.
#[inline]
pub fn max_fill(n: usize, f: f32) -> usize {
    ((n as f64 * f64::from(f)) as usize).min(n - 1)
}

/// Big-table version of [`max_fill`].
#[inline]
pub fn big_max_fill(n: u64, f: f32) -> u64 {
    ((n as f64 * f64::from(f)) as u64).min(n - 1)
}

#[cfg(test)]
mod tests {
    use rand::Rng;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    #[test]
    fn mix_inverses_round_trip() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..10_000 {
            let x: u32 = rng.random();
            assert_eq!(mix(inv_mix(x)), x);
            assert_eq!(inv_mix(mix(x)), x);

            let y: u64 = rng.random();
            assert_eq!(mix_long(inv_mix_long(y)), y);
            assert_eq!(inv_mix_long(mix_long(y)), y);
        }
        assert_eq!(INT_PHI.wrapping_mul(INV_INT_PHI), 1);
        assert_eq!(LONG_PHI.wrapping_mul(INV_LONG_PHI), 1);
    }

    #[test]
    fn sequential_keys_spread_over_low_bits() {
        let mask = 1023u64;
        let mut seen = alloc::vec![false; 1024];
        for k in 0..1024u64 {
            seen[(mix_long(k) & mask) as usize] = true;
        }
        let distinct = seen.iter().filter(|&&s| s).count();
        // A uniform hash fills about 1 - 1/e of the slots.
        assert!(distinct > 550, "only {distinct} distinct home slots");
    }

    #[test]
    fn array_size_examples() {
        assert_eq!(array_size(4, 0.75), 8);
        assert_eq!(array_size(6, 0.75), 8);
        assert_eq!(array_size(7, 0.75), 16);
        assert_eq!(array_size(1000, 0.75), 2048);
        assert_eq!(array_size(0, 0.75), MIN_CAPACITY);
        assert_eq!(array_size(1, 1.0), MIN_CAPACITY);
        assert_eq!(array_size(16, 1.0), 16);
        assert_eq!(big_array_size(1000, 0.75), 2048);
        assert_eq!(big_array_size(0, 0.5), MIN_CAPACITY as u64);
    }

    #[test]
    fn array_size_rejects_bad_parameters() {
        assert_eq!(
            try_array_size(10, 0.0),
            Err(ConfigError::InvalidLoadFactor(0.0))
        );
        assert_eq!(
            try_array_size(10, 1.01),
            Err(ConfigError::InvalidLoadFactor(1.01))
        );
        assert!(try_array_size(10, f32::NAN).is_err());
        assert_eq!(
            try_array_size(MAX_FLAT_CAPACITY, 0.5),
            Err(ConfigError::CapacityOverflow {
                expected: MAX_FLAT_CAPACITY as u64
            })
        );
        assert!(try_big_array_size(MAX_BIG_CAPACITY, 0.5).is_err());
    }

    #[test]
    fn max_fill_keeps_a_free_slot() {
        assert_eq!(max_fill(8, 0.75), 6);
        assert_eq!(max_fill(16, 0.75), 12);
        assert_eq!(max_fill(8, 1.0), 7);
        assert_eq!(max_fill(2, 0.75), 1);
        assert_eq!(big_max_fill(16, 0.75), 12);
        assert_eq!(big_max_fill(4, 1.0), 3);
    }
}
