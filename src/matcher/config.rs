// Matcher tuning profiles.
//
// Each profile trades index density and search depth for speed.  The
// constants were chosen empirically on mixed binary corpora (firmware
// images, tarballs, sqlite files); they are contracts of this crate,
// not of the container format, and may be retuned between versions.

/// Seed width for the old-sequence index (bytes hashed per entry).
pub const SEED_LEN: usize = 8;

/// Minimum copy length worth encoding.  A copy op costs 2..=12 encoded
/// bytes (tag varint + zigzag delta), so 8 is the smallest length that
/// can never lose to storing the bytes as literals.
pub const MIN_MATCH: usize = 8;

/// Hard cap on index entries.  For old inputs large enough to exceed
/// this, the effective step widens so index memory stays constant no
/// matter the input size.
pub const MAX_INDEX_SLOTS: usize = 1 << 22;

/// Default new-sequence window size (4 MiB).
pub const DEFAULT_WINDOW_SIZE: usize = 1 << 22;

/// Block size for file-backed old access (64 KiB).
pub const BLOCK_SIZE: usize = 64 * 1024;

/// Maximum LRU block cache entries for file-backed old access.
pub const MAX_LRU_BLOCKS: usize = 32;

/// Matcher profile configuration.
#[derive(Debug, Clone, Copy)]
pub struct MatcherConfig {
    /// Name for display purposes.
    pub name: &'static str,
    /// Bytes between indexed positions in old.
    pub step: usize,
    /// Maximum hash-chain candidates examined per query.
    pub max_chain: usize,
    /// Match length considered long enough to stop searching.
    pub long_enough: usize,
}

/// Map a compression level (0-9) to a profile.
///
/// Level 0 means "store only" and is handled by the caller (no matcher
/// is built at all); it maps to the fastest profile here for
/// completeness.
pub fn config_for_level(level: u32) -> MatcherConfig {
    match level {
        0 | 1 | 2 => FAST,
        3..=5 => BALANCED,
        6 => DEFAULT,
        _ => THOROUGH,
    }
}

pub const FAST: MatcherConfig = MatcherConfig {
    name: "fast",
    step: 8,
    max_chain: 4,
    long_enough: 256,
};

pub const BALANCED: MatcherConfig = MatcherConfig {
    name: "balanced",
    step: 4,
    max_chain: 16,
    long_enough: 512,
};

pub const DEFAULT: MatcherConfig = MatcherConfig {
    name: "default",
    step: 3,
    max_chain: 32,
    long_enough: 1024,
};

pub const THOROUGH: MatcherConfig = MatcherConfig {
    name: "thorough",
    step: 1,
    max_chain: 64,
    long_enough: 4096,
};

impl MatcherConfig {
    /// Effective indexing step for an old sequence of `old_len` bytes:
    /// widens beyond the profile step once the index would outgrow
    /// `MAX_INDEX_SLOTS`.
    pub fn effective_step(&self, old_len: u64) -> usize {
        let floor = old_len.div_ceil(MAX_INDEX_SLOTS as u64) as usize;
        self.step.max(floor).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_mapping() {
        assert_eq!(config_for_level(0).name, "fast");
        assert_eq!(config_for_level(2).name, "fast");
        assert_eq!(config_for_level(3).name, "balanced");
        assert_eq!(config_for_level(5).name, "balanced");
        assert_eq!(config_for_level(6).name, "default");
        assert_eq!(config_for_level(7).name, "thorough");
        assert_eq!(config_for_level(9).name, "thorough");
    }

    #[test]
    fn min_match_covers_worst_case_copy_cost() {
        // Matches shorter than the seed are undetectable, and a copy op
        // costs 2..=12 encoded bytes, so the threshold must sit at or
        // above the seed width.
        assert!(MIN_MATCH >= SEED_LEN);
        assert_eq!(MIN_MATCH, 8);
    }

    #[test]
    fn effective_step_bounds_index() {
        let cfg = THOROUGH;
        assert_eq!(cfg.effective_step(1024), 1);
        let huge = (MAX_INDEX_SLOTS as u64) * 100;
        let step = cfg.effective_step(huge);
        assert!(huge.div_ceil(step as u64) <= MAX_INDEX_SLOTS as u64);
    }
}
