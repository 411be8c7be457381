// Container header and per-chunk header encoding/decoding.
//
// Layout (version 1):
//   magic     "hdp" + version byte (0x00 = v1)
//   flags     1 byte (CHECKSUM, LITERAL_CODEC)
//   codec_id  1 byte, only if LITERAL_CODEC
//   old_size  varint
//   new_size  varint
//   checksums adler32(old) + adler32(new), 4+4 bytes big-endian, if CHECKSUM
//
// Chunks follow until the cumulative chunk output equals new_size.

use std::io::{self, Read, Write};

use bitflags::bitflags;

use super::varint;
use crate::error::DeltaError;

// ---------------------------------------------------------------------------
// Magic and version
// ---------------------------------------------------------------------------

/// Container magic: "hdp" followed by the format version byte.
pub const DELTA_MAGIC: [u8; 4] = [0x68, 0x64, 0x70, 0x00];

/// Current format version (stored as the fourth magic byte).
pub const FORMAT_VERSION: u8 = 0x00;

// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

bitflags! {
    /// Header flag byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HeaderFlags: u8 {
        /// Old/new adler32 checksums are present.
        const CHECKSUM = 1 << 0;
        /// A literal-pool codec id byte follows the flags.
        const LITERAL_CODEC = 1 << 1;
    }
}

bitflags! {
    /// Per-chunk flag byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ChunkFlags: u8 {
        /// The op section is compressed with the header's codec.
        const OPS_COMPRESSED = 1 << 0;
        /// The literal pool is compressed with the header's codec.
        const LIT_COMPRESSED = 1 << 1;
    }
}

// ---------------------------------------------------------------------------
// Codec ids
// ---------------------------------------------------------------------------

/// Zlib/Deflate literal codec id.
pub const CODEC_ZLIB_ID: u8 = 1;
/// LZMA literal codec id.
pub const CODEC_LZMA_ID: u8 = 2;

// ---------------------------------------------------------------------------
// Container header
// ---------------------------------------------------------------------------

/// Parsed container header.
#[derive(Debug, Clone, Default)]
pub struct Header {
    pub flags: HeaderFlags,
    /// Codec id for compressed sections (if LITERAL_CODEC is set).
    pub codec_id: Option<u8>,
    /// Length of the old sequence the diff was built against.
    pub old_size: u64,
    /// Length of the new sequence the diff reconstructs.
    pub new_size: u64,
    /// Adler-32 of the old sequence (if CHECKSUM is set).
    pub old_adler32: Option<u32>,
    /// Adler-32 of the new sequence (if CHECKSUM is set).
    pub new_adler32: Option<u32>,
}

impl Header {
    /// Encode the header to a writer.
    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&DELTA_MAGIC)?;
        w.write_all(&[self.flags.bits()])?;

        if self.flags.contains(HeaderFlags::LITERAL_CODEC) {
            w.write_all(&[self.codec_id.unwrap_or(0)])?;
        }

        varint::write_u64(w, self.old_size)?;
        varint::write_u64(w, self.new_size)?;

        if self.flags.contains(HeaderFlags::CHECKSUM) {
            w.write_all(&self.old_adler32.unwrap_or(0).to_be_bytes())?;
            w.write_all(&self.new_adler32.unwrap_or(0).to_be_bytes())?;
        }

        Ok(())
    }

    /// Decode a container header from a reader.
    ///
    /// A wrong magic or version byte is `UnsupportedFormat`; anything
    /// structurally invalid past that point is `CorruptDiff`.
    pub fn decode<R: Read>(r: &mut R) -> crate::error::Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic).map_err(read_failed)?;
        if magic[..3] != DELTA_MAGIC[..3] {
            return Err(DeltaError::unsupported(format!(
                "bad magic {:02x}{:02x}{:02x}",
                magic[0], magic[1], magic[2]
            )));
        }
        if magic[3] != FORMAT_VERSION {
            return Err(DeltaError::unsupported(format!(
                "version byte {:#04x}",
                magic[3]
            )));
        }

        let mut buf1 = [0u8; 1];
        r.read_exact(&mut buf1).map_err(read_failed)?;
        let flags = HeaderFlags::from_bits(buf1[0])
            .ok_or_else(|| DeltaError::corrupt(format!("invalid header flag bits {:#04x}", buf1[0])))?;

        let codec_id = if flags.contains(HeaderFlags::LITERAL_CODEC) {
            r.read_exact(&mut buf1).map_err(read_failed)?;
            Some(buf1[0])
        } else {
            None
        };

        let old_size = varint::stream_read_u64(r).map_err(read_failed)?;
        let new_size = varint::stream_read_u64(r).map_err(read_failed)?;

        let (old_adler32, new_adler32) = if flags.contains(HeaderFlags::CHECKSUM) {
            let mut cksum = [0u8; 4];
            r.read_exact(&mut cksum).map_err(read_failed)?;
            let old = u32::from_be_bytes(cksum);
            r.read_exact(&mut cksum).map_err(read_failed)?;
            let new = u32::from_be_bytes(cksum);
            (Some(old), Some(new))
        } else {
            (None, None)
        };

        Ok(Self {
            flags,
            codec_id,
            old_size,
            new_size,
            old_adler32,
            new_adler32,
        })
    }
}

// ---------------------------------------------------------------------------
// Per-chunk header
// ---------------------------------------------------------------------------

/// Parsed per-chunk header.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkHeader {
    pub flags: ChunkFlags,
    /// Bytes of new this chunk reconstructs.
    pub out_len: u64,
    /// Stored (possibly compressed) size of the op section.
    pub ops_len: u64,
    /// Stored (possibly compressed) size of the literal pool.
    pub lit_len: u64,
    /// Decompressed op-section size; present iff `OPS_COMPRESSED`.
    pub ops_raw_len: Option<u64>,
    /// Decompressed literal-pool size; present iff `LIT_COMPRESSED`.
    pub lit_raw_len: Option<u64>,
}

impl ChunkHeader {
    /// Encode a chunk header.
    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        debug_assert_eq!(
            self.flags.contains(ChunkFlags::OPS_COMPRESSED),
            self.ops_raw_len.is_some()
        );
        debug_assert_eq!(
            self.flags.contains(ChunkFlags::LIT_COMPRESSED),
            self.lit_raw_len.is_some()
        );
        w.write_all(&[self.flags.bits()])?;
        varint::write_u64(w, self.out_len)?;
        varint::write_u64(w, self.ops_len)?;
        varint::write_u64(w, self.lit_len)?;
        if let Some(raw) = self.ops_raw_len {
            varint::write_u64(w, raw)?;
        }
        if let Some(raw) = self.lit_raw_len {
            varint::write_u64(w, raw)?;
        }
        Ok(())
    }

    /// Decode a chunk header. Returns `Ok(None)` on clean EOF (the byte
    /// stream ended exactly between chunks); the caller decides whether
    /// that EOF was premature.
    pub fn decode<R: Read>(r: &mut R) -> crate::error::Result<Option<Self>> {
        let mut buf1 = [0u8; 1];
        match r.read_exact(&mut buf1) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(read_failed(e)),
        }
        let flags = ChunkFlags::from_bits(buf1[0])
            .ok_or_else(|| DeltaError::corrupt(format!("invalid chunk flag bits {:#04x}", buf1[0])))?;

        let out_len = varint::stream_read_u64(r).map_err(read_failed)?;
        let ops_len = varint::stream_read_u64(r).map_err(read_failed)?;
        let lit_len = varint::stream_read_u64(r).map_err(read_failed)?;
        let ops_raw_len = if flags.contains(ChunkFlags::OPS_COMPRESSED) {
            Some(varint::stream_read_u64(r).map_err(read_failed)?)
        } else {
            None
        };
        let lit_raw_len = if flags.contains(ChunkFlags::LIT_COMPRESSED) {
            Some(varint::stream_read_u64(r).map_err(read_failed)?)
        } else {
            None
        };

        if out_len == 0 {
            return Err(DeltaError::corrupt("zero-length chunk"));
        }

        Ok(Some(Self {
            flags,
            out_len,
            ops_len,
            lit_len,
            ops_raw_len,
            lit_raw_len,
        }))
    }
}

/// Map a read failure mid-structure onto the right error kind: a short
/// read inside a header is a truncated diff, not an I/O problem.
fn read_failed(e: io::Error) -> DeltaError {
    if e.kind() == io::ErrorKind::UnexpectedEof || e.kind() == io::ErrorKind::InvalidData {
        DeltaError::corrupt(format!("truncated or malformed header: {e}"))
    } else {
        DeltaError::InputRead(e)
    }
}

// ---------------------------------------------------------------------------
// Checksums
// ---------------------------------------------------------------------------

/// Adler-32 over a full buffer.
#[inline]
pub fn adler32(data: &[u8]) -> u32 {
    let mut hasher = simd_adler32::Adler32::new();
    hasher.write(data);
    hasher.finish()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
