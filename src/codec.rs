// Literal pool compression.
//
// Ops and literals are compressed per chunk, independently and
// shrink-only: a section is stored compressed only when that actually
// saves bytes, signalled by the chunk flag bits.  The codec id in the
// file header names the algorithm for the whole diff.

use std::io;

use crate::error::{DeltaError, Result};
use crate::format::header::{CODEC_LZMA_ID, CODEC_ZLIB_ID};

/// Minimum section size worth running a compressor over.
const MIN_COMPRESS_SIZE: usize = 32;

/// Cap on upfront output reservation; the promised decoded length comes
/// from the diff and is only trusted once the bytes actually decode.
const PREALLOC_CAP: usize = 1 << 20;

/// A pluggable compressor for chunk sections.
pub trait LiteralCodec: Send + Sync {
    /// Codec id stored in the file header.
    fn id(&self) -> u8;

    /// Human-readable name for logs and stats.
    fn name(&self) -> &'static str;

    /// Compress a section.
    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>>;

    /// Decompress a section previously produced by `compress`.
    /// `expected_len` is the decoded size the chunk header promises.
    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>>;

    /// Whether a section of this size is worth compressing.
    fn should_compress(&self, data: &[u8]) -> bool {
        data.len() >= MIN_COMPRESS_SIZE
    }
}

/// Compress a section if that shrinks it.
///
/// Returns `Some(compressed)` only when the compressed form is
/// strictly smaller; the caller sets the chunk flag accordingly.
pub fn compress_section(codec: &dyn LiteralCodec, data: &[u8]) -> io::Result<Option<Vec<u8>>> {
    if !codec.should_compress(data) {
        return Ok(None);
    }
    let compressed = codec.compress(data)?;
    if compressed.len() < data.len() {
        Ok(Some(compressed))
    } else {
        Ok(None)
    }
}

/// Look up the codec for a header codec id.
///
/// Ids are stable format constants; an id this build has no codec for
/// (unknown, or compiled out) is `UnsupportedFormat`.
pub fn codec_for_id(id: u8) -> Result<Box<dyn LiteralCodec>> {
    match id {
        #[cfg(feature = "zlib-literals")]
        CODEC_ZLIB_ID => Ok(Box::new(ZlibCodec::default())),
        #[cfg(not(feature = "zlib-literals"))]
        CODEC_ZLIB_ID => Err(DeltaError::unsupported(
            "literal codec zlib not enabled in this build",
        )),
        #[cfg(feature = "lzma-literals")]
        CODEC_LZMA_ID => Ok(Box::new(LzmaCodec)),
        #[cfg(not(feature = "lzma-literals"))]
        CODEC_LZMA_ID => Err(DeltaError::unsupported(
            "literal codec lzma not enabled in this build",
        )),
        other => Err(DeltaError::unsupported(format!(
            "unknown literal codec id {other}"
        ))),
    }
}

/// Default codec for new diffs, by build features.
pub fn default_codec() -> Option<Box<dyn LiteralCodec>> {
    #[cfg(feature = "zlib-literals")]
    {
        return Some(Box::new(ZlibCodec::default()));
    }
    #[cfg(all(feature = "lzma-literals", not(feature = "zlib-literals")))]
    {
        return Some(Box::new(LzmaCodec));
    }
    #[allow(unreachable_code)]
    None
}

fn check_len(got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(DeltaError::corrupt(format!(
            "decompressed section is {got} bytes, chunk header says {expected}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Zlib codec
// ---------------------------------------------------------------------------

/// Zlib literal codec (codec id 1, the default).
#[cfg(feature = "zlib-literals")]
#[derive(Debug, Clone, Copy)]
pub struct ZlibCodec {
    level: flate2::Compression,
}

#[cfg(feature = "zlib-literals")]
impl ZlibCodec {
    /// Codec with the given zlib level (0-9).
    pub fn new(level: u32) -> Self {
        Self {
            level: flate2::Compression::new(level),
        }
    }
}

#[cfg(feature = "zlib-literals")]
impl Default for ZlibCodec {
    fn default() -> Self {
        Self::new(6)
    }
}

#[cfg(feature = "zlib-literals")]
impl LiteralCodec for ZlibCodec {
    fn id(&self) -> u8 {
        CODEC_ZLIB_ID
    }

    fn name(&self) -> &'static str {
        "zlib"
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        use flate2::write::ZlibEncoder;
        use io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), self.level);
        encoder.write_all(data)?;
        encoder.finish()
    }

    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        use flate2::read::ZlibDecoder;
        use io::Read;

        let mut output = Vec::with_capacity(expected_len.min(PREALLOC_CAP));
        // Bounded read: a section claiming to inflate past its header
        // length is corrupt, not a reason to balloon memory.
        ZlibDecoder::new(data)
            .take(expected_len as u64 + 1)
            .read_to_end(&mut output)
            .map_err(|e| DeltaError::corrupt(format!("zlib inflate failed: {e}")))?;
        check_len(output.len(), expected_len)?;
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// LZMA codec
// ---------------------------------------------------------------------------

/// LZMA literal codec (codec id 2).
#[cfg(feature = "lzma-literals")]
#[derive(Debug, Clone, Copy, Default)]
pub struct LzmaCodec;

#[cfg(feature = "lzma-literals")]
impl LiteralCodec for LzmaCodec {
    fn id(&self) -> u8 {
        CODEC_LZMA_ID
    }

    fn name(&self) -> &'static str {
        "lzma"
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut input = io::Cursor::new(data);
        let mut output = Vec::new();
        lzma_rs::lzma_compress(&mut input, &mut output)?;
        Ok(output)
    }

    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        let mut input = io::Cursor::new(data);
        let mut output = Vec::with_capacity(expected_len.min(PREALLOC_CAP));
        // The stream's own unpacked-size field is untrusted; the chunk
        // header already says how long the section is, so decode exactly
        // that much and cap the decoder's memory to match.
        let options = lzma_rs::decompress::Options {
            unpacked_size: lzma_rs::decompress::UnpackedSize::ReadHeaderButUseProvided(Some(
                expected_len as u64,
            )),
            memlimit: Some(expected_len.saturating_mul(2).max(1 << 16)),
            allow_incomplete: false,
        };
        lzma_rs::lzma_decompress_with_options(&mut input, &mut output, &options)
            .map_err(|e| DeltaError::corrupt(format!("lzma decode failed: {e}")))?;
        check_len(output.len(), expected_len)?;
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
