// Seed hashing for the old-sequence index.
//
// An 8-byte seed is read as a little-endian u64 and mixed with a
// Fibonacci multiplier; bucket selection takes the high bits, which is
// where multiplicative hashing concentrates entropy.

use super::config::SEED_LEN;

/// Fibonacci hashing multiplier (golden-ratio derived).
pub const SEED_MULT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Hash the `SEED_LEN` bytes at the start of `base`.
#[inline(always)]
pub fn seed_hash(base: &[u8]) -> u64 {
    debug_assert!(base.len() >= SEED_LEN);
    let val = u64::from_le_bytes(base[..SEED_LEN].try_into().unwrap());
    val.wrapping_mul(SEED_MULT)
}

// ---------------------------------------------------------------------------
// Bucket index computation
// ---------------------------------------------------------------------------

/// Hash table geometry: a power-of-two bucket array addressed by the
/// high bits of the seed hash.
#[derive(Clone, Debug)]
pub struct HashCfg {
    /// Number of buckets (power of 2).
    pub size: usize,
    /// Bit shift: `64 - log2(size)`.
    pub shift: u32,
}

impl HashCfg {
    /// Create a hash config for the given number of expected entries.
    /// Uses one bit less than the covering power of two (compaction),
    /// trading a little chain length for halved table memory.
    pub fn new(slots: usize) -> Self {
        let bits = size_hashtable_bits(slots);
        Self {
            size: 1usize << bits,
            shift: 64 - bits as u32,
        }
    }

    /// Compute the bucket index for a seed hash.
    #[inline(always)]
    pub fn bucket(&self, hash: u64) -> usize {
        (hash >> self.shift) as usize
    }
}

/// Bit width for a bucket array expected to hold `slots` entries.
fn size_hashtable_bits(slots: usize) -> usize {
    let max_bits = 28usize;
    for i in 3..=max_bits {
        if slots < (1 << i) {
            return i - 1; // compaction
        }
    }
    max_bits
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
