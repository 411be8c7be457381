// Longest-match search over the indexed old sequence.
//
// Queries hash the seed at the current new position, walk the hash
// chain, and verify each candidate by direct byte comparison (forward
// extension only).  Positions are indexed in descending order so
// chains yield the lowest offset first; on highly repetitive data that
// candidate has the most room to extend, so long runs collapse into
// one copy instead of exhausting the chain cap on near-end offsets.
// Ties on length are broken by proximity to the previous copy's end,
// which keeps the encoded signed offset deltas small.

use std::io;

use crate::error::{DeltaError, Result};
use crate::source::OldData;

use super::config::{MatcherConfig, MIN_MATCH, SEED_LEN};
use super::seed::seed_hash;
use super::table::ChainIndex;

/// Bytes read per chunk while indexing a file-backed old sequence.
const INDEX_CHUNK: usize = 1 << 20;

/// Bytes read per chunk while extending a match against file-backed old.
const EXTEND_CHUNK: usize = 4096;

/// A verified copy candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    /// Absolute offset in the old sequence.
    pub old_pos: u64,
    /// Verified match length in bytes.
    pub len: usize,
}

/// Seed index plus query state for one old sequence.
pub struct Matcher {
    config: MatcherConfig,
    index: ChainIndex,
    old_len: u64,
    scratch: Vec<u8>,
}

impl Matcher {
    /// Index the old sequence.  Memory is bounded by `MAX_INDEX_SLOTS`
    /// regardless of `old.len()`; larger inputs get a wider step.
    pub fn build<O: OldData>(config: MatcherConfig, old: &mut O) -> Result<Self> {
        let old_len = old.len();
        let step = config.effective_step(old_len);
        let slots = if old_len < SEED_LEN as u64 {
            0
        } else {
            ((old_len - SEED_LEN as u64) / step as u64 + 1) as usize
        };
        let mut index = ChainIndex::new(slots, step);

        if let Some(all) = old.as_slice(0, old_len as usize) {
            Self::index_slice(&mut index, all, 0, step);
        } else {
            Self::index_chunked(&mut index, old, step)?;
        }

        Ok(Self {
            config,
            index,
            old_len,
            scratch: Vec::new(),
        })
    }

    /// Insert every step-aligned seed of `data`, highest position
    /// first.  `base` is the absolute offset of `data[0]` and must be
    /// step-aligned.
    fn index_slice(index: &mut ChainIndex, data: &[u8], base: u64, step: usize) {
        if data.len() < SEED_LEN {
            return;
        }
        let last = (data.len() - SEED_LEN) / step * step;
        let mut p = last;
        loop {
            index.insert(seed_hash(&data[p..p + SEED_LEN]), base + p as u64);
            if p < step {
                break;
            }
            p -= step;
        }
    }

    /// Chunked indexing for file-backed old.  Blocks are processed
    /// from the top of the file down so the resulting chain order is
    /// identical to the one-shot slice path.
    fn index_chunked<O: OldData>(
        index: &mut ChainIndex,
        old: &mut O,
        step: usize,
    ) -> Result<()> {
        let old_len = old.len();
        if old_len < SEED_LEN as u64 {
            return Ok(());
        }
        // Step-aligned positions per block.
        let stride = (INDEX_CHUNK / step).max(1) as u64 * step as u64;
        let last_pos = (old_len - SEED_LEN as u64) / step as u64 * step as u64;
        let mut buf = vec![0u8; stride as usize + SEED_LEN - 1];

        let mut block_base = last_pos / stride * stride;
        loop {
            let n = old
                .read_at(block_base, &mut buf)
                .map_err(DeltaError::InputRead)?;
            // Positions past this block's stride belong to the next
            // block up, already indexed.
            let span = n.min(stride as usize + SEED_LEN - 1);
            Self::index_slice(index, &buf[..span], block_base, step);
            if block_base == 0 {
                break;
            }
            block_base -= stride;
        }
        Ok(())
    }

    /// Profile this matcher was built with.
    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Old sequence length the index covers.
    pub fn old_len(&self) -> u64 {
        self.old_len
    }

    /// Find the longest old match for `window[pos..]`.
    ///
    /// Returns the longest verified match of at least `MIN_MATCH`
    /// bytes; among equal lengths, the candidate whose offset is
    /// closest to `prev_copy_end` wins.
    pub fn find<O: OldData>(
        &mut self,
        old: &mut O,
        window: &[u8],
        pos: usize,
        prev_copy_end: u64,
    ) -> Result<Option<Match>> {
        let remaining = window.len() - pos;
        if remaining < SEED_LEN {
            return Ok(None);
        }
        let want = &window[pos..];
        let hash = seed_hash(&want[..SEED_LEN]);

        let mut best: Option<Match> = None;
        let mut best_dist = u64::MAX;

        // Collected up front: extension needs &mut old and &mut self.
        let candidates: Vec<u64> = self
            .index
            .candidates(hash)
            .take(self.config.max_chain)
            .collect();

        for old_pos in candidates {
            let cap = (self.old_len - old_pos).min(remaining as u64) as usize;
            if cap < MIN_MATCH {
                continue;
            }
            if let Some(b) = &best {
                // A candidate capped below the best length cannot win
                // or tie; one capped at it can still tie closer.
                if b.len > cap {
                    continue;
                }
            }

            let len = self
                .match_len(old, old_pos, &want[..cap])
                .map_err(DeltaError::InputRead)?;
            if len < MIN_MATCH {
                // Hash collision or too short to pay for itself.
                continue;
            }

            let dist = old_pos.abs_diff(prev_copy_end);
            let better = match &best {
                None => true,
                Some(b) => len > b.len || (len == b.len && dist < best_dist),
            };
            if better {
                best = Some(Match { old_pos, len });
                best_dist = dist;
            }

            if len >= self.config.long_enough || len == remaining {
                break;
            }
        }

        Ok(best)
    }

    /// Length of the common prefix of old[old_pos..] and `want`.
    fn match_len<O: OldData>(
        &mut self,
        old: &mut O,
        old_pos: u64,
        want: &[u8],
    ) -> io::Result<usize> {
        if let Some(have) = old.as_slice(old_pos, want.len()) {
            return Ok(common_prefix(have, want));
        }

        // File-backed path: compare in buffered chunks.
        let mut matched = 0usize;
        while matched < want.len() {
            let chunk = EXTEND_CHUNK.min(want.len() - matched);
            self.scratch.resize(chunk, 0);
            let n = old.read_at(old_pos + matched as u64, &mut self.scratch)?;
            if n == 0 {
                break;
            }
            let run = common_prefix(&self.scratch[..n], &want[matched..matched + n]);
            matched += run;
            if run < n {
                break;
            }
        }
        Ok(matched)
    }
}

/// Common-prefix length, compared a word at a time.
#[inline]
pub fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    let n = a.len().min(b.len());
    let mut i = 0usize;

    while i + 8 <= n {
        let wa = u64::from_le_bytes(a[i..i + 8].try_into().unwrap());
        let wb = u64::from_le_bytes(b[i..i + 8].try_into().unwrap());
        if wa != wb {
            return i + ((wa ^ wb).trailing_zeros() / 8) as usize;
        }
        i += 8;
    }
    while i < n && a[i] == b[i] {
        i += 1;
    }
    i
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::config::THOROUGH;
    use crate::source::BlockCachedFile;
    use std::io::Write;

    fn matcher_over(old: &[u8]) -> Matcher {
        let mut src: &[u8] = old;
        Matcher::build(THOROUGH, &mut src).unwrap()
    }

    #[test]
    fn finds_exact_copy() {
        let old = b"the quick brown fox jumps over the lazy dog".to_vec();
        let mut m = matcher_over(&old);
        let mut src: &[u8] = &old;

        let found = m.find(&mut src, &old, 0, 0).unwrap().unwrap();
        assert_eq!(found.old_pos, 0);
        assert_eq!(found.len, old.len());
    }

    #[test]
    fn finds_shifted_match() {
        let old: Vec<u8> = (0..128u8).collect();
        let mut m = matcher_over(&old);
        let mut src: &[u8] = &old;

        // New window holds old[40..90] after some unrelated bytes.
        let mut new = vec![0xEEu8; 16];
        new.extend_from_slice(&old[40..90]);
        let found = m.find(&mut src, &new, 16, 0).unwrap().unwrap();
        assert_eq!(found.old_pos, 40);
        assert_eq!(found.len, 50);
    }

    #[test]
    fn no_match_in_unrelated_data() {
        let old = vec![0x00u8; 256];
        let mut m = matcher_over(&old);
        let mut src: &[u8] = &old;

        let new = vec![0xFFu8; 64];
        assert!(m.find(&mut src, &new, 0, 0).unwrap().is_none());
    }

    #[test]
    fn short_tail_returns_none() {
        let old: Vec<u8> = (0..64u8).collect();
        let mut m = matcher_over(&old);
        let mut src: &[u8] = &old;

        let new = old.clone();
        // Fewer than SEED_LEN bytes left in the window.
        assert!(m.find(&mut src, &new, new.len() - 4, 0).unwrap().is_none());
    }

    #[test]
    fn locality_breaks_length_ties() {
        // The same 24-byte pattern at old offsets 0 and 1000,
        // surrounded by bytes that stop extension past it.
        let pattern: Vec<u8> = (1..=24u8).collect();
        let mut old = vec![0u8; 1100];
        old[0..24].copy_from_slice(&pattern);
        old[1000..1024].copy_from_slice(&pattern);

        let mut m = matcher_over(&old);
        let mut src: &[u8] = &old[..];

        let mut new = vec![0x77u8; 8];
        new.extend_from_slice(&pattern);
        new.extend(vec![0x88u8; 8]);

        let near_start = m.find(&mut src, &new, 8, 10).unwrap().unwrap();
        assert_eq!(near_start.old_pos, 0);
        assert_eq!(near_start.len, 24);

        let near_end = m.find(&mut src, &new, 8, 990).unwrap().unwrap();
        assert_eq!(near_end.old_pos, 1000);
        assert_eq!(near_end.len, 24);
    }

    #[test]
    fn file_backed_matches_slice_backed() {
        let mut state = 0x2545_F491_4F6C_DD1Du64;
        let mut old: Vec<u8> = (0..200_000)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                (state >> 56) as u8
            })
            .collect();
        // Stop extension exactly at the match boundary.
        old[60_000] = 0x00;
        let mut new = old[50_000..60_000].to_vec();
        new.extend(vec![0xABu8; 100]);

        let mut slice_src: &[u8] = &old;
        let mut m1 = Matcher::build(THOROUGH, &mut slice_src).unwrap();
        let expect = m1.find(&mut slice_src, &new, 0, 0).unwrap().unwrap();

        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&old).unwrap();
        f.flush().unwrap();
        let mut file_src = BlockCachedFile::open(f.path()).unwrap();
        let mut m2 = Matcher::build(THOROUGH, &mut file_src).unwrap();
        let got = m2.find(&mut file_src, &new, 0, 0).unwrap().unwrap();

        assert_eq!(got, expect);
        assert_eq!(got.old_pos, 50_000);
        assert_eq!(got.len, 10_000);
    }

    #[test]
    fn common_prefix_word_and_tail() {
        assert_eq!(common_prefix(b"abcdefgh12", b"abcdefgh12"), 10);
        assert_eq!(common_prefix(b"abcdefgh12", b"abcdefgh13"), 9);
        assert_eq!(common_prefix(b"abcdefgX", b"abcdefgY"), 7);
        assert_eq!(common_prefix(b"", b"x"), 0);
        assert_eq!(common_prefix(b"same", b"same-longer"), 4);
    }
}
