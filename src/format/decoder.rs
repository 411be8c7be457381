// Container decoding and patch application.
//
// The decoder streams: it reads one chunk at a time, replays its ops
// against the old sequence, and writes reconstructed bytes straight to
// the output writer.  Peak memory is one chunk's sections plus the old
// access layer, independent of old_size and new_size.
//
// Validation order matters: the old length is checked against the
// header before a single output byte is produced.

use std::io::{Read, Write};

use log::{debug, trace};

use crate::codec::{codec_for_id, LiteralCodec};
use crate::error::{DeltaError, Result};
use crate::matcher::config::BLOCK_SIZE;
use crate::source::OldData;

use super::header::{ChunkFlags, ChunkHeader, Header};
use super::varint;

/// Upper bound on encoded op bytes per output byte: every op emits at
/// least one byte and encodes in at most two 10-byte varints.
const MAX_OP_BYTES_PER_OUT: u64 = 20;

/// Streaming container reader and patcher.
pub struct DiffDecoder<R: Read> {
    reader: R,
    header: Header,
    codec: Option<Box<dyn LiteralCodec>>,
    verify_checksum: bool,
    /// Source offset the next copy delta is relative to.
    prev_copy_end: u64,
    produced: u64,
    chunks: u64,
}

impl<R: Read> DiffDecoder<R> {
    /// Read and validate the file header.
    pub fn new(reader: R) -> Result<Self> {
        Self::with_checksum(reader, true)
    }

    /// Like `new`, with stored-checksum verification toggled.
    pub fn with_checksum(mut reader: R, verify_checksum: bool) -> Result<Self> {
        let header = Header::decode(&mut reader)?;
        let codec = match header.codec_id {
            Some(id) => Some(codec_for_id(id)?),
            None => None,
        };
        Ok(Self {
            reader,
            header,
            codec,
            verify_checksum,
            prev_copy_end: 0,
            produced: 0,
            chunks: 0,
        })
    }

    /// Parsed file header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Chunks decoded so far.
    pub fn chunk_count(&self) -> u64 {
        self.chunks
    }

    /// Replay the whole diff against `old`, writing new to `out`.
    /// Returns the number of bytes written.
    pub fn decode_to<O: OldData, W: Write>(&mut self, old: &mut O, out: &mut W) -> Result<u64> {
        if old.len() != self.header.old_size {
            return Err(DeltaError::SizeMismatch {
                expected: self.header.old_size,
                actual: old.len(),
            });
        }

        if self.verify_checksum {
            if let Some(stored) = self.header.old_adler32 {
                let actual = adler32_of(old)?;
                if actual != stored {
                    return Err(DeltaError::corrupt(format!(
                        "old data checksum {actual:#010x} does not match stored {stored:#010x}"
                    )));
                }
            }
        }

        let mut new_hash = simd_adler32::Adler32::new();
        let mut copy_buf = vec![0u8; BLOCK_SIZE];

        while self.produced < self.header.new_size {
            let chunk = match ChunkHeader::decode(&mut self.reader)? {
                Some(c) => c,
                None => {
                    return Err(DeltaError::corrupt(format!(
                        "diff ends after {} of {} bytes",
                        self.produced, self.header.new_size
                    )));
                }
            };
            if chunk.out_len > self.header.new_size - self.produced {
                return Err(DeltaError::corrupt(format!(
                    "chunk output overruns new_size ({} + {} > {})",
                    self.produced, chunk.out_len, self.header.new_size
                )));
            }
            check_section_bounds(&chunk)?;

            self.apply_chunk(&chunk, old, out, &mut new_hash, &mut copy_buf)?;
            self.chunks += 1;
            trace!("chunk {}: {} bytes out", self.chunks, chunk.out_len);
        }

        if self.verify_checksum {
            if let Some(stored) = self.header.new_adler32 {
                let actual = new_hash.finish();
                if actual != stored {
                    return Err(DeltaError::corrupt(format!(
                        "output checksum {actual:#010x} does not match stored {stored:#010x}"
                    )));
                }
            }
        }

        out.flush().map_err(DeltaError::OutputWrite)?;
        debug!(
            "patched {} bytes from {} chunks",
            self.produced, self.chunks
        );
        Ok(self.produced)
    }

    fn apply_chunk<O: OldData, W: Write>(
        &mut self,
        chunk: &ChunkHeader,
        old: &mut O,
        out: &mut W,
        new_hash: &mut simd_adler32::Adler32,
        copy_buf: &mut [u8],
    ) -> Result<()> {
        let ops_raw = self.read_section(
            chunk.ops_len,
            chunk.flags.contains(ChunkFlags::OPS_COMPRESSED),
            chunk.ops_raw_len,
            "op section",
        )?;
        let literals = self.read_section(
            chunk.lit_len,
            chunk.flags.contains(ChunkFlags::LIT_COMPRESSED),
            chunk.lit_raw_len,
            "literal pool",
        )?;

        let mut ops = &ops_raw[..];
        let mut lit = &literals[..];
        let mut remaining = chunk.out_len;

        while remaining > 0 {
            let (tag, n) = varint::read_u64(ops)
                .map_err(|e| DeltaError::corrupt(format!("bad op varint: {e}")))?;
            ops = &ops[n..];

            let len = tag >> 1;
            if len == 0 {
                return Err(DeltaError::corrupt("zero-length op"));
            }
            if len > remaining {
                return Err(DeltaError::corrupt(format!(
                    "op produces {len} bytes with only {remaining} left in chunk"
                )));
            }

            if tag & 1 == 1 {
                let (delta, n) = varint::read_i64(ops)
                    .map_err(|e| DeltaError::corrupt(format!("bad copy delta: {e}")))?;
                ops = &ops[n..];

                let start = self.prev_copy_end as i128 + delta as i128;
                if start < 0 || start + len as i128 > self.header.old_size as i128 {
                    return Err(DeltaError::corrupt(format!(
                        "copy range {start}..{} outside old data",
                        start + len as i128
                    )));
                }
                let old_pos = start as u64;
                self.copy_old(old, old_pos, len, out, new_hash, copy_buf)?;
                self.prev_copy_end = old_pos + len;
            } else {
                let len = len as usize;
                if len > lit.len() {
                    return Err(DeltaError::corrupt(format!(
                        "insert of {len} bytes exceeds literal pool ({} left)",
                        lit.len()
                    )));
                }
                out.write_all(&lit[..len]).map_err(DeltaError::OutputWrite)?;
                new_hash.write(&lit[..len]);
                lit = &lit[len..];
            }

            remaining -= len;
            self.produced += len;
        }

        if !ops.is_empty() {
            return Err(DeltaError::corrupt(format!(
                "{} trailing bytes in op section",
                ops.len()
            )));
        }
        if !lit.is_empty() {
            return Err(DeltaError::corrupt(format!(
                "{} unconsumed literal bytes",
                lit.len()
            )));
        }
        Ok(())
    }

    /// Read a stored section, decompressing it if flagged.
    fn read_section(
        &mut self,
        stored_len: u64,
        compressed: bool,
        raw_len: Option<u64>,
        what: &str,
    ) -> Result<Vec<u8>> {
        // Grow with the bytes actually present rather than trusting the
        // stored length up front.
        let mut stored = Vec::with_capacity(stored_len.min(BLOCK_SIZE as u64) as usize);
        let got = self
            .reader
            .by_ref()
            .take(stored_len)
            .read_to_end(&mut stored)
            .map_err(DeltaError::InputRead)?;
        if (got as u64) < stored_len {
            return Err(DeltaError::corrupt(format!("truncated {what}")));
        }

        if !compressed {
            return Ok(stored);
        }
        let codec = self
            .codec
            .as_ref()
            .ok_or_else(|| DeltaError::corrupt(format!("compressed {what} but no codec id in header")))?;
        let raw_len =
            raw_len.ok_or_else(|| DeltaError::corrupt(format!("compressed {what} missing raw length")))?;
        codec.decompress(&stored, raw_len as usize)
    }

    fn copy_old<O: OldData, W: Write>(
        &self,
        old: &mut O,
        old_pos: u64,
        len: u64,
        out: &mut W,
        new_hash: &mut simd_adler32::Adler32,
        copy_buf: &mut [u8],
    ) -> Result<()> {
        if let Some(bytes) = old.as_slice(old_pos, len as usize) {
            out.write_all(bytes).map_err(DeltaError::OutputWrite)?;
            new_hash.write(bytes);
            return Ok(());
        }

        let mut done = 0u64;
        while done < len {
            let want = copy_buf.len().min((len - done) as usize);
            let n = old
                .read_at(old_pos + done, &mut copy_buf[..want])
                .map_err(DeltaError::InputRead)?;
            if n == 0 {
                // Range was validated against old_size; a short read
                // means the old input shrank under us.
                return Err(DeltaError::corrupt("old data ended inside a copy range"));
            }
            out.write_all(&copy_buf[..n]).map_err(DeltaError::OutputWrite)?;
            new_hash.write(&copy_buf[..n]);
            done += n as u64;
        }
        Ok(())
    }
}

/// Reject section lengths no valid chunk could carry.  The literal pool
/// never exceeds the chunk's output and the op section never exceeds
/// [`MAX_OP_BYTES_PER_OUT`] bytes per output byte, so anything larger is
/// damage and gets refused before a byte of it is read.
fn check_section_bounds(chunk: &ChunkHeader) -> Result<()> {
    let lit_cap = chunk.out_len;
    let lit_raw = chunk.lit_raw_len.unwrap_or(chunk.lit_len);
    if chunk.lit_len > lit_cap || lit_raw > lit_cap {
        return Err(DeltaError::corrupt(format!(
            "literal section of {} bytes in a {}-byte chunk",
            chunk.lit_len.max(lit_raw),
            chunk.out_len
        )));
    }

    let ops_cap = chunk.out_len.saturating_mul(MAX_OP_BYTES_PER_OUT);
    let ops_raw = chunk.ops_raw_len.unwrap_or(chunk.ops_len);
    if chunk.ops_len > ops_cap || ops_raw > ops_cap {
        return Err(DeltaError::corrupt(format!(
            "op section of {} bytes in a {}-byte chunk",
            chunk.ops_len.max(ops_raw),
            chunk.out_len
        )));
    }
    Ok(())
}

/// Adler-32 over an `OldData`, read in blocks.
fn adler32_of<O: OldData>(old: &mut O) -> Result<u32> {
    let mut hash = simd_adler32::Adler32::new();
    if let Some(all) = old.as_slice(0, old.len() as usize) {
        hash.write(all);
        return Ok(hash.finish());
    }

    let mut buf = vec![0u8; BLOCK_SIZE];
    let mut offset = 0u64;
    while offset < old.len() {
        let n = old.read_at(offset, &mut buf).map_err(DeltaError::InputRead)?;
        if n == 0 {
            break;
        }
        hash.write(&buf[..n]);
        offset += n as u64;
    }
    Ok(hash.finish())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
