// Container serialization.
//
// `DiffEncoder` writes the file header up front (the caller supplies
// sizes and checksums), then one chunk per edit-script window.  Output
// depends only on the inputs and options, never on timing or
// allocation behavior, so equal inputs always produce equal diffs.

use std::io::{self, Write};

use log::debug;

use crate::codec::{compress_section, LiteralCodec};
use crate::error::{DeltaError, Result};
use crate::script::{EditOp, EditScript};

use super::header::{ChunkFlags, ChunkHeader, Header};
use super::varint;

/// Streaming container writer.
pub struct DiffEncoder<W: Write> {
    writer: W,
    codec: Option<Box<dyn LiteralCodec>>,
    new_size: u64,
    /// Source offset the next copy delta is relative to.
    prev_copy_end: u64,
    /// New bytes covered by chunks written so far.
    covered: u64,
    chunks: u64,
    bytes_written: u64,
}

impl<W: Write> DiffEncoder<W> {
    /// Write the file header and return an encoder ready for chunks.
    ///
    /// `header.codec_id` must name the codec passed here (both come
    /// from the same options in practice).
    pub fn new(
        mut writer: W,
        header: &Header,
        codec: Option<Box<dyn LiteralCodec>>,
    ) -> Result<Self> {
        debug_assert_eq!(header.codec_id, codec.as_ref().map(|c| c.id()));

        let mut head = Vec::with_capacity(32);
        header
            .encode(&mut head)
            .map_err(DeltaError::OutputWrite)?;
        writer.write_all(&head).map_err(DeltaError::OutputWrite)?;

        Ok(Self {
            writer,
            codec,
            new_size: header.new_size,
            prev_copy_end: 0,
            covered: 0,
            chunks: 0,
            bytes_written: head.len() as u64,
        })
    }

    /// Serialize one window's edit script as a chunk.
    pub fn write_chunk(&mut self, script: &EditScript) -> Result<()> {
        let out_len = script.out_len() as u64;
        if out_len == 0 {
            return Ok(());
        }

        let ops_raw = self
            .serialize_ops(&script.ops)
            .map_err(DeltaError::OutputWrite)?;

        let mut flags = ChunkFlags::empty();
        let mut ops_raw_len = None;
        let mut lit_raw_len = None;

        let ops_stored = match &self.codec {
            Some(codec) => match compress_section(codec.as_ref(), &ops_raw)
                .map_err(DeltaError::OutputWrite)?
            {
                Some(packed) => {
                    flags |= ChunkFlags::OPS_COMPRESSED;
                    ops_raw_len = Some(ops_raw.len() as u64);
                    packed
                }
                None => ops_raw,
            },
            None => ops_raw,
        };
        let lit_stored = match &self.codec {
            Some(codec) => match compress_section(codec.as_ref(), &script.literals)
                .map_err(DeltaError::OutputWrite)?
            {
                Some(packed) => {
                    flags |= ChunkFlags::LIT_COMPRESSED;
                    lit_raw_len = Some(script.literals.len() as u64);
                    packed
                }
                None => script.literals.clone(),
            },
            None => script.literals.clone(),
        };

        let chunk = ChunkHeader {
            flags,
            out_len,
            ops_len: ops_stored.len() as u64,
            lit_len: lit_stored.len() as u64,
            ops_raw_len,
            lit_raw_len,
        };
        let mut head = Vec::with_capacity(32);
        chunk.encode(&mut head).map_err(DeltaError::OutputWrite)?;

        self.writer
            .write_all(&head)
            .and_then(|()| self.writer.write_all(&ops_stored))
            .and_then(|()| self.writer.write_all(&lit_stored))
            .map_err(DeltaError::OutputWrite)?;

        self.covered += out_len;
        self.chunks += 1;
        self.bytes_written += (head.len() + ops_stored.len() + lit_stored.len()) as u64;

        debug!(
            "chunk {}: {} ops, {} -> {} op bytes, {} -> {} literal bytes, {} out",
            self.chunks,
            script.ops.len(),
            chunk.ops_raw_len.unwrap_or(chunk.ops_len),
            chunk.ops_len,
            chunk.lit_raw_len.unwrap_or(chunk.lit_len),
            chunk.lit_len,
            out_len,
        );
        Ok(())
    }

    fn serialize_ops(&mut self, ops: &[EditOp]) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(ops.len() * 4);
        for op in ops {
            match *op {
                EditOp::Copy { old_pos, len } => {
                    varint::write_u64(&mut buf, ((len as u64) << 1) | 1)?;
                    let delta = old_pos as i64 - self.prev_copy_end as i64;
                    varint::write_i64(&mut buf, delta)?;
                    self.prev_copy_end = old_pos + len as u64;
                }
                EditOp::Insert { len } => {
                    varint::write_u64(&mut buf, (len as u64) << 1)?;
                }
            }
        }
        Ok(buf)
    }

    /// Chunks written so far.
    pub fn chunk_count(&self) -> u64 {
        self.chunks
    }

    /// Container bytes written so far, header included.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Flush and return the writer.  All of new must be covered.
    pub fn finish(mut self) -> Result<W> {
        debug_assert_eq!(self.covered, self.new_size);
        self.writer.flush().map_err(DeltaError::OutputWrite)?;
        Ok(self.writer)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
