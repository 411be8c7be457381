// Buffer diff/patch API.
//
// Thin drivers over the matcher, script builder, and container codec:
// `diff` turns (old, new) slices into a delta, `patch` replays a delta
// against old.  The streaming layer in `stream` reuses the same parts
// with file-backed inputs; both use the same window size, so a diff of
// the same bytes is identical whichever path produced it.

use std::io::Cursor;

use log::debug;

use crate::codec::codec_for_id;
use crate::error::Result;
use crate::format::decoder::DiffDecoder;
use crate::format::encoder::DiffEncoder;
use crate::format::header::{adler32, Header, HeaderFlags};
use crate::matcher::config::{config_for_level, DEFAULT_WINDOW_SIZE};
use crate::matcher::Matcher;
use crate::script::ScriptBuilder;

/// Smallest accepted window size; tiny windows only add chunk
/// overhead.
pub(crate) const MIN_WINDOW_SIZE: usize = 4096;

/// Cap for speculative output preallocation on untrusted headers.
const PREALLOC_CAP: usize = 1 << 26;

/// Tuning knobs for diff construction.
#[derive(Debug, Clone, Copy)]
pub struct DiffOptions {
    /// Effort level, 1 (fastest) to 9 (smallest diff).
    pub level: u32,
    /// New-sequence window size in bytes; one chunk per window.
    pub window_size: usize,
    /// Store adler32 checksums of old and new in the header.
    pub checksum: bool,
    /// Literal codec id for the container, `None` for stored.
    pub codec_id: Option<u8>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            level: 6,
            window_size: DEFAULT_WINDOW_SIZE,
            checksum: true,
            codec_id: default_codec_id(),
        }
    }
}

/// Codec id new diffs get by default, by build features.
pub fn default_codec_id() -> Option<u8> {
    crate::codec::default_codec().map(|c| c.id())
}

/// Diff two in-memory buffers with default options.
pub fn diff(old: &[u8], new: &[u8]) -> Result<Vec<u8>> {
    diff_with_options(old, new, &DiffOptions::default())
}

/// Diff two in-memory buffers.
pub fn diff_with_options(old: &[u8], new: &[u8], opts: &DiffOptions) -> Result<Vec<u8>> {
    let mut src: &[u8] = old;
    let header = Header {
        flags: header_flags(opts),
        codec_id: opts.codec_id,
        old_size: old.len() as u64,
        new_size: new.len() as u64,
        old_adler32: opts.checksum.then(|| adler32(old)),
        new_adler32: opts.checksum.then(|| adler32(new)),
    };

    let out = Vec::with_capacity(64 + new.len() / 4);
    let mut enc = encoder_for(out, &header, opts)?;

    let mut matcher = Matcher::build(config_for_level(opts.level), &mut src)?;
    let mut builder = ScriptBuilder::new();
    for window in new.chunks(opts.window_size.max(MIN_WINDOW_SIZE)) {
        let script = builder.build(&mut matcher, &mut src, window)?;
        enc.write_chunk(&script)?;
    }

    let out = enc.finish()?;
    debug!(
        "diff: {} old + {} new -> {} delta bytes",
        old.len(),
        new.len(),
        out.len()
    );
    Ok(out)
}

/// Apply a diff to an in-memory old buffer, returning new.
pub fn patch(old: &[u8], diff: &[u8]) -> Result<Vec<u8>> {
    let mut dec = DiffDecoder::new(Cursor::new(diff))?;
    let mut out = Vec::with_capacity((dec.header().new_size as usize).min(PREALLOC_CAP));
    let mut src: &[u8] = old;
    dec.decode_to(&mut src, &mut out)?;
    Ok(out)
}

/// Header flag byte implied by a set of options.
pub(crate) fn header_flags(opts: &DiffOptions) -> HeaderFlags {
    let mut flags = HeaderFlags::empty();
    if opts.checksum {
        flags |= HeaderFlags::CHECKSUM;
    }
    if opts.codec_id.is_some() {
        flags |= HeaderFlags::LITERAL_CODEC;
    }
    flags
}

pub(crate) fn encoder_for<W: std::io::Write>(
    writer: W,
    header: &Header,
    opts: &DiffOptions,
) -> Result<DiffEncoder<W>> {
    let codec = match opts.codec_id {
        Some(id) => Some(codec_for_id(id)?),
        None => None,
    };
    DiffEncoder::new(writer, header, codec)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
