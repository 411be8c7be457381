// Old-sequence access abstraction.
//
// Copy operations reference arbitrary offsets in old, so both the
// matcher and the patcher need random access.  `OldData` is implemented
// for in-memory slices (zero-copy fast path) and for seekable files
// behind a fixed-size LRU block cache, which is what keeps streaming
// memory independent of old_size.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use crate::matcher::config::{BLOCK_SIZE, MAX_LRU_BLOCKS};

/// Random-access view of the old sequence.
pub trait OldData {
    /// Total length in bytes.
    fn len(&self) -> u64;

    /// Whether the old sequence is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read bytes at `offset` into `buf`; returns bytes read (short
    /// only at end of data).
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Zero-copy slice access for contiguous in-memory data.
    fn as_slice(&self, _offset: u64, _len: usize) -> Option<&[u8]> {
        None
    }
}

impl OldData for &[u8] {
    fn len(&self) -> u64 {
        <[u8]>::len(self) as u64
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let off = offset as usize;
        if off >= <[u8]>::len(self) {
            return Ok(0);
        }
        let avail = &self[off..];
        let n = buf.len().min(avail.len());
        buf[..n].copy_from_slice(&avail[..n]);
        Ok(n)
    }

    fn as_slice(&self, offset: u64, len: usize) -> Option<&[u8]> {
        let off = offset as usize;
        if off + len <= <[u8]>::len(self) {
            Some(&self[off..off + len])
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// File-backed old with an LRU block cache
// ---------------------------------------------------------------------------

struct CachedBlock {
    /// Block index (offset / BLOCK_SIZE).
    block: u64,
    data: Vec<u8>,
    /// Monotonic use counter for LRU eviction.
    last_used: u64,
}

/// Seekable file wrapped in a bounded LRU block cache.
///
/// Worst-case memory is `MAX_LRU_BLOCKS * BLOCK_SIZE` (2 MiB with the
/// defaults) regardless of file size.
pub struct BlockCachedFile {
    file: File,
    len: u64,
    blocks: Vec<CachedBlock>,
    tick: u64,
}

impl BlockCachedFile {
    /// Open a file for cached random access.
    pub fn open(path: &std::path::Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            file,
            len,
            blocks: Vec::with_capacity(MAX_LRU_BLOCKS),
            tick: 0,
        })
    }

    /// Wrap an already-open file.
    pub fn from_file(file: File) -> io::Result<Self> {
        let len = file.metadata()?.len();
        Ok(Self {
            file,
            len,
            blocks: Vec::with_capacity(MAX_LRU_BLOCKS),
            tick: 0,
        })
    }

    /// Fetch (loading if needed) the cache entry for `block`, returning
    /// its index in `self.blocks`.
    fn fetch_block(&mut self, block: u64) -> io::Result<usize> {
        self.tick += 1;

        if let Some(i) = self.blocks.iter().position(|b| b.block == block) {
            self.blocks[i].last_used = self.tick;
            return Ok(i);
        }

        // Load the block from disk.
        let offset = block * BLOCK_SIZE as u64;
        let want = (BLOCK_SIZE as u64).min(self.len.saturating_sub(offset)) as usize;
        let mut data = vec![0u8; want];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut data)?;

        let entry = CachedBlock {
            block,
            data,
            last_used: self.tick,
        };

        if self.blocks.len() < MAX_LRU_BLOCKS {
            self.blocks.push(entry);
            Ok(self.blocks.len() - 1)
        } else {
            // Evict the least recently used block in place.
            let victim = self
                .blocks
                .iter()
                .enumerate()
                .min_by_key(|(_, b)| b.last_used)
                .map(|(i, _)| i)
                .unwrap_or(0);
            self.blocks[victim] = entry;
            Ok(victim)
        }
    }
}

impl OldData for BlockCachedFile {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.len {
            return Ok(0);
        }
        let mut done = 0usize;
        let total = buf.len().min((self.len - offset) as usize);

        while done < total {
            let pos = offset + done as u64;
            let block = pos / BLOCK_SIZE as u64;
            let within = (pos % BLOCK_SIZE as u64) as usize;

            let i = self.fetch_block(block)?;
            let data = &self.blocks[i].data;
            let n = (total - done).min(data.len() - within);
            buf[done..done + n].copy_from_slice(&data[within..within + n]);
            done += n;
        }

        Ok(done)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
