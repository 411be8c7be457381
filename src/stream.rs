// Path-based streaming diff/patch.
//
// Neither old nor new is ever held in memory whole: old sits behind
// the LRU block cache, new is read window by window, and the patcher
// writes output as chunks decode.  Peak memory is one window plus the
// fixed-size index and cache, regardless of input sizes.
//
// The container header carries both checksums up front, so the
// streaming differ makes one hashing pre-pass over each input before
// encoding.  Windows are the same size as in the buffer path, which
// makes the two paths produce byte-identical diffs.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::{debug, info};

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::engine::{encoder_for, header_flags, DiffOptions, MIN_WINDOW_SIZE};
use crate::error::{DeltaError, Result};
use crate::format::decoder::DiffDecoder;
use crate::format::header::Header;
use crate::matcher::config::config_for_level;
use crate::matcher::Matcher;
use crate::script::ScriptBuilder;
use crate::source::{BlockCachedFile, OldData};

const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `diff_file()`.
#[derive(Debug, Clone)]
pub struct DiffStats {
    /// Old file size in bytes.
    pub old_size: u64,
    /// New file size in bytes.
    pub new_size: u64,
    /// Diff output size in bytes.
    pub diff_size: u64,
    /// Number of chunks written.
    pub chunks: u64,
    /// SHA-256 of the old file (if the `file-io` feature is enabled).
    pub old_sha256: Option<[u8; 32]>,
    /// SHA-256 of the new file (if the `file-io` feature is enabled).
    pub new_sha256: Option<[u8; 32]>,
}

/// Statistics returned by `patch_file()`.
#[derive(Debug, Clone)]
pub struct PatchStats {
    /// Old file size in bytes.
    pub old_size: u64,
    /// Diff file size in bytes.
    pub diff_size: u64,
    /// Reconstructed output size in bytes.
    pub output_size: u64,
    /// Number of chunks decoded.
    pub chunks: u64,
    /// SHA-256 of the reconstructed output (if `file-io` is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

/// Options for `diff_file_with_options()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamOptions {
    /// Diff construction knobs, shared with the buffer API.
    pub diff: DiffOptions,
    /// After writing the diff, decode it back against old and confirm
    /// the output matches new before returning.
    pub verify: bool,
}

// ---------------------------------------------------------------------------
// Hashing helpers
// ---------------------------------------------------------------------------

/// One sequential pass over a reader: adler32, optional SHA-256, and
/// the byte count.
struct ScanResult {
    len: u64,
    adler32: u32,
    sha256: Option<[u8; 32]>,
}

fn scan_reader<R: Read>(reader: &mut R) -> io::Result<ScanResult> {
    let mut adler = simd_adler32::Adler32::new();
    #[cfg(feature = "file-io")]
    let mut sha = sha2::Sha256::new();

    let mut len = 0u64;
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        adler.write(&buf[..n]);
        #[cfg(feature = "file-io")]
        sha.update(&buf[..n]);
        len += n as u64;
    }

    #[cfg(feature = "file-io")]
    let sha256 = Some(sha.finalize().into());
    #[cfg(not(feature = "file-io"))]
    let sha256 = None;

    Ok(ScanResult {
        len,
        adler32: adler.finish(),
        sha256,
    })
}

fn scan_file(path: &Path) -> Result<ScanResult> {
    let file = File::open(path).map_err(DeltaError::InputRead)?;
    let mut reader = BufReader::with_capacity(BUF_SIZE, file);
    scan_reader(&mut reader).map_err(DeltaError::InputRead)
}

/// Writer that forwards to `inner` while hashing everything written.
#[cfg(feature = "file-io")]
struct HashingWriter<'a, W: Write> {
    inner: &'a mut W,
    hasher: &'a mut sha2::Sha256,
}

#[cfg(feature = "file-io")]
impl<W: Write> Write for HashingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Sink that discards bytes while hashing them, for post-diff
/// verification.
struct VerifySink {
    len: u64,
    #[cfg(feature = "file-io")]
    sha: sha2::Sha256,
}

impl VerifySink {
    fn new() -> Self {
        Self {
            len: 0,
            #[cfg(feature = "file-io")]
            sha: sha2::Sha256::new(),
        }
    }
}

impl Write for VerifySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        #[cfg(feature = "file-io")]
        self.sha.update(buf);
        self.len += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// diff_file
// ---------------------------------------------------------------------------

/// Diff two files with default options, writing the delta to
/// `diff_path`.
pub fn diff_file(old_path: &Path, new_path: &Path, diff_path: &Path) -> Result<DiffStats> {
    diff_file_with_options(old_path, new_path, diff_path, &StreamOptions::default())
}

/// Diff two files, writing the delta to `diff_path`.
pub fn diff_file_with_options(
    old_path: &Path,
    new_path: &Path,
    diff_path: &Path,
    opts: &StreamOptions,
) -> Result<DiffStats> {
    let old_scan = scan_file(old_path)?;
    let new_scan = scan_file(new_path)?;
    debug!(
        "diff {} ({} bytes) -> {} ({} bytes)",
        old_path.display(),
        old_scan.len,
        new_path.display(),
        new_scan.len
    );

    let header = Header {
        flags: header_flags(&opts.diff),
        codec_id: opts.diff.codec_id,
        old_size: old_scan.len,
        new_size: new_scan.len,
        old_adler32: opts.diff.checksum.then_some(old_scan.adler32),
        new_adler32: opts.diff.checksum.then_some(new_scan.adler32),
    };

    let mut old = BlockCachedFile::open(old_path).map_err(DeltaError::InputRead)?;
    if old.len() != old_scan.len {
        return Err(DeltaError::InputRead(io::Error::other(
            "old file changed size during diff",
        )));
    }

    let new_file = File::open(new_path).map_err(DeltaError::InputRead)?;
    let mut new_reader = BufReader::with_capacity(BUF_SIZE, new_file);

    let diff_file = File::create(diff_path).map_err(DeltaError::OutputWrite)?;
    let diff_writer = BufWriter::with_capacity(BUF_SIZE, diff_file);

    let mut enc = encoder_for(diff_writer, &header, &opts.diff)?;
    let mut matcher = Matcher::build(config_for_level(opts.diff.level), &mut old)?;
    let mut builder = ScriptBuilder::new();

    let window_size = opts.diff.window_size.max(MIN_WINDOW_SIZE);
    let mut window = Vec::with_capacity(window_size);
    loop {
        let n = read_window(&mut new_reader, &mut window, window_size)
            .map_err(DeltaError::InputRead)?;
        if n == 0 {
            break;
        }
        let script = builder.build(&mut matcher, &mut old, &window)?;
        enc.write_chunk(&script)?;
    }

    let chunks = enc.chunk_count();
    let diff_size = enc.bytes_written();
    let writer = enc.finish()?;
    writer
        .into_inner()
        .map_err(|e| DeltaError::OutputWrite(e.into_error()))?
        .sync_all()
        .map_err(DeltaError::OutputWrite)?;

    if opts.verify {
        verify_diff(old_path, diff_path, &new_scan)?;
        debug!("verified {} against {}", diff_path.display(), new_path.display());
    }

    info!(
        "diff {}: {} -> {} bytes in {} chunks",
        diff_path.display(),
        new_scan.len,
        diff_size,
        chunks
    );
    Ok(DiffStats {
        old_size: old_scan.len,
        new_size: new_scan.len,
        diff_size,
        chunks,
        old_sha256: old_scan.sha256,
        new_sha256: new_scan.sha256,
    })
}

/// Decode the freshly written diff against old and compare the output
/// digest (and length) with the scanned new file.
fn verify_diff(old_path: &Path, diff_path: &Path, new_scan: &ScanResult) -> Result<()> {
    let diff = File::open(diff_path).map_err(DeltaError::InputRead)?;
    let mut dec = DiffDecoder::new(BufReader::with_capacity(BUF_SIZE, diff))?;
    let mut old = BlockCachedFile::open(old_path).map_err(DeltaError::InputRead)?;

    let mut sink = VerifySink::new();
    dec.decode_to(&mut old, &mut sink)?;

    if sink.len != new_scan.len {
        return Err(DeltaError::corrupt(format!(
            "self-check length mismatch: rebuilt {} bytes, new file has {}",
            sink.len, new_scan.len
        )));
    }
    #[cfg(feature = "file-io")]
    if let Some(expected) = new_scan.sha256 {
        let actual: [u8; 32] = sink.sha.finalize().into();
        if actual != expected {
            return Err(DeltaError::corrupt(
                "self-check digest mismatch: rebuilt output differs from new file",
            ));
        }
    }
    Ok(())
}

/// Fill `window` with up to `size` bytes from the reader.
fn read_window<R: Read>(reader: &mut R, window: &mut Vec<u8>, size: usize) -> io::Result<usize> {
    window.clear();
    window.resize(size, 0);
    let mut filled = 0usize;
    while filled < size {
        let n = reader.read(&mut window[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    window.truncate(filled);
    Ok(filled)
}

// ---------------------------------------------------------------------------
// patch_file
// ---------------------------------------------------------------------------

/// Apply a diff file to an old file, writing the new file.
pub fn patch_file(old_path: &Path, diff_path: &Path, out_path: &Path) -> Result<PatchStats> {
    patch_file_with_checksum(old_path, diff_path, out_path, true)
}

/// Like `patch_file`, with stored-checksum verification toggled.
pub fn patch_file_with_checksum(
    old_path: &Path,
    diff_path: &Path,
    out_path: &Path,
    verify_checksum: bool,
) -> Result<PatchStats> {
    let mut old = BlockCachedFile::open(old_path).map_err(DeltaError::InputRead)?;
    let old_size = old.len();

    let diff = File::open(diff_path).map_err(DeltaError::InputRead)?;
    let diff_size = diff.metadata().map_err(DeltaError::InputRead)?.len();
    let mut dec =
        DiffDecoder::with_checksum(BufReader::with_capacity(BUF_SIZE, diff), verify_checksum)?;

    let out = File::create(out_path).map_err(DeltaError::OutputWrite)?;
    let mut writer = BufWriter::with_capacity(BUF_SIZE, out);

    #[cfg(feature = "file-io")]
    let mut hasher = sha2::Sha256::new();

    #[cfg(feature = "file-io")]
    let output_size = {
        let mut hashing = HashingWriter {
            inner: &mut writer,
            hasher: &mut hasher,
        };
        dec.decode_to(&mut old, &mut hashing)?
    };
    #[cfg(not(feature = "file-io"))]
    let output_size = dec.decode_to(&mut old, &mut writer)?;

    let chunks = dec.chunk_count();
    writer
        .into_inner()
        .map_err(|e| DeltaError::OutputWrite(e.into_error()))?
        .sync_all()
        .map_err(DeltaError::OutputWrite)?;

    #[cfg(feature = "file-io")]
    let output_sha256 = Some(hasher.finalize().into());
    #[cfg(not(feature = "file-io"))]
    let output_sha256 = None;

    info!(
        "patch {}: {} bytes from {} chunks",
        out_path.display(),
        output_size,
        chunks
    );
    Ok(PatchStats {
        old_size,
        diff_size,
        output_size,
        chunks,
        output_sha256,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine;
    use std::fs;

    fn write_temp(dir: &tempfile::TempDir, name: &str, data: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, data).unwrap();
        path
    }

    fn sample_pair() -> (Vec<u8>, Vec<u8>) {
        let mut state = 7u64;
        let old: Vec<u8> = (0..150_000)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                (state >> 56) as u8
            })
            .collect();
        let mut new = old.clone();
        new.drain(40_000..45_000);
        new.extend(b"trailing additions beyond the original data");
        (old, new)
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let (old, new) = sample_pair();
        let old_path = write_temp(&dir, "a.bin", &old);
        let new_path = write_temp(&dir, "b.bin", &new);
        let diff_path = dir.path().join("a-b.hdp");
        let out_path = dir.path().join("b.rebuilt");

        let stats = diff_file(&old_path, &new_path, &diff_path).unwrap();
        assert_eq!(stats.old_size, old.len() as u64);
        assert_eq!(stats.new_size, new.len() as u64);
        assert!(stats.diff_size < new.len() as u64 / 2);

        let pstats = patch_file(&old_path, &diff_path, &out_path).unwrap();
        assert_eq!(pstats.output_size, new.len() as u64);
        assert_eq!(fs::read(&out_path).unwrap(), new);

        #[cfg(feature = "file-io")]
        assert_eq!(pstats.output_sha256, stats.new_sha256);
    }

    #[test]
    fn stream_diff_matches_buffer_diff() {
        let dir = tempfile::tempdir().unwrap();
        let (old, new) = sample_pair();
        let old_path = write_temp(&dir, "a.bin", &old);
        let new_path = write_temp(&dir, "b.bin", &new);
        let diff_path = dir.path().join("a-b.hdp");

        diff_file(&old_path, &new_path, &diff_path).unwrap();
        let streamed = fs::read(&diff_path).unwrap();
        let buffered = engine::diff(&old, &new).unwrap();
        assert_eq!(streamed, buffered);
    }

    #[test]
    fn small_windows_stay_equivalent() {
        let dir = tempfile::tempdir().unwrap();
        let (old, new) = sample_pair();
        let old_path = write_temp(&dir, "a.bin", &old);
        let new_path = write_temp(&dir, "b.bin", &new);
        let diff_path = dir.path().join("a-b.hdp");

        let opts = StreamOptions {
            diff: DiffOptions {
                window_size: 8192,
                ..Default::default()
            },
            verify: false,
        };
        diff_file_with_options(&old_path, &new_path, &diff_path, &opts).unwrap();
        let streamed = fs::read(&diff_path).unwrap();
        let buffered = engine::diff_with_options(&old, &new, &opts.diff).unwrap();
        assert_eq!(streamed, buffered);
    }

    #[test]
    fn verify_option_accepts_good_diff() {
        let dir = tempfile::tempdir().unwrap();
        let (old, new) = sample_pair();
        let old_path = write_temp(&dir, "a.bin", &old);
        let new_path = write_temp(&dir, "b.bin", &new);
        let diff_path = dir.path().join("a-b.hdp");

        let opts = StreamOptions {
            verify: true,
            ..Default::default()
        };
        diff_file_with_options(&old_path, &new_path, &diff_path, &opts).unwrap();
    }

    #[test]
    fn patching_with_wrong_old_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (old, new) = sample_pair();
        let old_path = write_temp(&dir, "a.bin", &old);
        let new_path = write_temp(&dir, "b.bin", &new);
        let diff_path = dir.path().join("a-b.hdp");
        diff_file(&old_path, &new_path, &diff_path).unwrap();

        let short_path = write_temp(&dir, "short.bin", &old[..old.len() - 1]);
        match patch_file(&short_path, &diff_path, &dir.path().join("x")) {
            Err(DeltaError::SizeMismatch { .. }) => {}
            other => panic!("expected SizeMismatch, got {other:?}"),
        }

        let mut tampered = old.clone();
        tampered[123] ^= 0x01;
        let tampered_path = write_temp(&dir, "tampered.bin", &tampered);
        match patch_file(&tampered_path, &diff_path, &dir.path().join("y")) {
            Err(DeltaError::CorruptDiff(_)) => {}
            other => panic!("expected CorruptDiff, got {other:?}"),
        }
    }

    #[test]
    fn missing_input_is_input_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.bin");
        let other = write_temp(&dir, "b.bin", b"data");
        match diff_file(&missing, &other, &dir.path().join("out")) {
            Err(DeltaError::InputRead(_)) => {}
            other => panic!("expected InputRead, got {other:?}"),
        }
    }
}
