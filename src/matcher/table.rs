// Hash-chain index over the old sequence.
//
// Flat arena layout: two u32 arrays, no pointer graph.
//   heads[bucket] = newest slot in that bucket + 1, or 0 (empty)
//   links[slot]   = previous slot in the same bucket + 1, or 0
// A slot is an indexed position divided by the step, so u32 slots cover
// old inputs far beyond 4 GiB once the step widens.

use super::seed::HashCfg;

/// Offset added to stored slots so 0 means "empty".
const SLOT_OFFSET: u32 = 1;

/// Chained index over the old sequence's seeds.
pub struct ChainIndex {
    heads: Vec<u32>,
    links: Vec<u32>,
    cfg: HashCfg,
    /// Bytes between indexed positions.
    step: usize,
}

impl ChainIndex {
    /// Create an index for `slots` entries at the given step.
    pub fn new(slots: usize, step: usize) -> Self {
        debug_assert!(step >= 1);
        let cfg = HashCfg::new(slots.max(8));
        Self {
            heads: vec![0u32; cfg.size],
            links: vec![0u32; slots],
            cfg,
            step,
        }
    }

    /// Insert the seed at old position `pos` (must be step-aligned).
    #[inline]
    pub fn insert(&mut self, hash: u64, pos: u64) {
        debug_assert_eq!(pos % self.step as u64, 0);
        let slot = (pos / self.step as u64) as usize;
        if slot >= self.links.len() {
            return;
        }
        let bucket = self.cfg.bucket(hash);
        self.links[slot] = self.heads[bucket];
        self.heads[bucket] = slot as u32 + SLOT_OFFSET;
    }

    /// Iterate candidate old positions for a seed hash, newest first.
    #[inline]
    pub fn candidates(&self, hash: u64) -> Candidates<'_> {
        let bucket = self.cfg.bucket(hash);
        Candidates {
            index: self,
            next: self.heads[bucket],
        }
    }

    /// Number of buckets allocated.
    pub fn bucket_count(&self) -> usize {
        self.cfg.size
    }

    /// Indexing step.
    pub fn step(&self) -> usize {
        self.step
    }
}

/// Iterator over chained candidate positions.
pub struct Candidates<'a> {
    index: &'a ChainIndex,
    next: u32,
}

impl Iterator for Candidates<'_> {
    type Item = u64;

    #[inline]
    fn next(&mut self) -> Option<u64> {
        if self.next == 0 {
            return None;
        }
        let slot = (self.next - SLOT_OFFSET) as usize;
        self.next = self.index.links[slot];
        Some(slot as u64 * self.index.step as u64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
