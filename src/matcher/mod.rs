//! Byte matcher: seed index over the old sequence plus longest-match
//! queries with a locality tie-break.
//!
//! The index is a flat hash-chain arena keyed by 8-byte seeds.  Its
//! memory is capped; old inputs beyond the cap are indexed at a wider
//! step instead of growing the tables.

pub mod config;
pub mod search;
pub mod seed;
pub mod table;

pub use config::{config_for_level, MatcherConfig, MIN_MATCH, SEED_LEN};
pub use search::{Match, Matcher};
