// Command-line interface.
//
// Subcommands mirror the library surface: `diff` and `patch` drive the
// streaming path, `info` inspects a delta without applying it.  Stats
// go to stderr (text or JSON) so stdout stays clean for piped output.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};

use crate::engine::DiffOptions;
use crate::error::DeltaError;
use crate::format::header::{ChunkHeader, Header, CODEC_LZMA_ID, CODEC_ZLIB_ID};
use crate::matcher::config::DEFAULT_WINDOW_SIZE;
use crate::stream::{self, StreamOptions};

const BUF_SIZE: usize = 64 * 1024;

// Exit codes: 1 for I/O trouble, 2 for a diff that failed validation.
const EXIT_IO: i32 = 1;
const EXIT_BAD_DIFF: i32 = 2;

// ---------------------------------------------------------------------------
// Byte size parsing (supports K, M, G suffixes)
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1u64),
    };
    let num: u64 = num_part
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Binary delta encoder/decoder.
#[derive(Parser, Debug)]
#[command(
    name = "hdelta",
    version,
    about = "Compact binary deltas between old and new files",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Create a delta that turns OLD into NEW.
    Diff(DiffArgs),
    /// Apply a delta to OLD, reconstructing NEW.
    Patch(PatchArgs),
    /// Print a delta's header and chunk summary.
    Info(InfoArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum CodecArg {
    /// Pick by build features (zlib when available).
    Auto,
    #[cfg(feature = "zlib-literals")]
    Zlib,
    #[cfg(feature = "lzma-literals")]
    Lzma,
    /// Store sections uncompressed.
    None,
}

#[derive(Args, Debug)]
struct DiffArgs {
    /// Old file the delta will be applied against.
    #[arg(value_hint = ValueHint::FilePath)]
    old: PathBuf,

    /// New file the delta reconstructs.
    #[arg(value_hint = ValueHint::FilePath)]
    new: PathBuf,

    /// Delta output file.
    #[arg(value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Effort level, 1 (fastest) to 9 (smallest delta).
    #[arg(short = 'l', long, default_value_t = 6, value_parser = clap::value_parser!(u32).range(1..=9))]
    level: u32,

    /// Window size for chunking new (supports K/M/G suffix).
    #[arg(short = 'W', long = "window-size", value_parser = parse_byte_size, default_value_t = DEFAULT_WINDOW_SIZE as u64)]
    window_size: u64,

    /// Section compression codec.
    #[arg(long, value_enum, default_value_t = CodecArg::Auto)]
    codec: CodecArg,

    /// Skip storing adler32 checksums in the delta.
    #[arg(long = "no-checksum")]
    no_checksum: bool,

    /// Skip the post-write self-check (re-applying the delta and
    /// comparing the result against NEW).
    #[arg(long = "no-verify")]
    no_verify: bool,
}

#[derive(Args, Debug)]
struct PatchArgs {
    /// Old file the delta was built against.
    #[arg(value_hint = ValueHint::FilePath)]
    old: PathBuf,

    /// Delta file to apply.
    #[arg(value_hint = ValueHint::FilePath)]
    delta: PathBuf,

    /// Reconstructed output file.
    #[arg(value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Disable stored-checksum verification.
    #[arg(long = "no-checksum")]
    no_checksum: bool,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// Delta file to inspect.
    #[arg(value_hint = ValueHint::FilePath)]
    delta: PathBuf,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn exit_code_for(e: &DeltaError) -> i32 {
    match e {
        DeltaError::InputRead(_) | DeltaError::OutputWrite(_) => EXIT_IO,
        DeltaError::UnsupportedFormat(_)
        | DeltaError::CorruptDiff(_)
        | DeltaError::SizeMismatch { .. } => EXIT_BAD_DIFF,
    }
}

fn refuse_overwrite(path: &Path, force: bool) -> bool {
    if path.exists() && !force {
        eprintln!(
            "hdelta: output file exists, use -f to overwrite: {}",
            path.display()
        );
        return true;
    }
    false
}

fn codec_id_for(arg: CodecArg) -> Option<u8> {
    match arg {
        CodecArg::Auto => crate::engine::default_codec_id(),
        #[cfg(feature = "zlib-literals")]
        CodecArg::Zlib => Some(CODEC_ZLIB_ID),
        #[cfg(feature = "lzma-literals")]
        CodecArg::Lzma => Some(CODEC_LZMA_ID),
        CodecArg::None => None,
    }
}

fn cmd_diff(args: &DiffArgs, quiet: bool, force: bool, json: bool) -> i32 {
    if refuse_overwrite(&args.output, force) {
        return EXIT_IO;
    }

    let opts = StreamOptions {
        diff: DiffOptions {
            level: args.level,
            window_size: args.window_size as usize,
            checksum: !args.no_checksum,
            codec_id: codec_id_for(args.codec),
        },
        verify: !args.no_verify,
    };

    let stats = match stream::diff_file_with_options(&args.old, &args.new, &args.output, &opts) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("hdelta: diff: {e}");
            return exit_code_for(&e);
        }
    };

    if json {
        let json = serde_json::json!({
            "old_size": stats.old_size,
            "new_size": stats.new_size,
            "diff_size": stats.diff_size,
            "chunks": stats.chunks,
            "old_sha256": stats.old_sha256.map(hex),
            "new_sha256": stats.new_sha256.map(hex),
        });
        eprintln!("{}", serde_json::to_string_pretty(&json).unwrap());
    } else if !quiet {
        let ratio = if stats.new_size > 0 {
            100.0 * stats.diff_size as f64 / stats.new_size as f64
        } else {
            0.0
        };
        eprintln!(
            "hdelta: {}: {} -> {} bytes ({ratio:.1}% of new), {} chunk(s)",
            args.output.display(),
            stats.new_size,
            stats.diff_size,
            stats.chunks
        );
    }
    0
}

fn cmd_patch(args: &PatchArgs, quiet: bool, force: bool, json: bool) -> i32 {
    if refuse_overwrite(&args.output, force) {
        return EXIT_IO;
    }

    let stats = match stream::patch_file_with_checksum(
        &args.old,
        &args.delta,
        &args.output,
        !args.no_checksum,
    ) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("hdelta: patch: {e}");
            return exit_code_for(&e);
        }
    };

    if json {
        let json = serde_json::json!({
            "old_size": stats.old_size,
            "diff_size": stats.diff_size,
            "output_size": stats.output_size,
            "chunks": stats.chunks,
            "output_sha256": stats.output_sha256.map(hex),
        });
        eprintln!("{}", serde_json::to_string_pretty(&json).unwrap());
    } else if !quiet {
        eprintln!(
            "hdelta: {}: reconstructed {} bytes from {} chunk(s)",
            args.output.display(),
            stats.output_size,
            stats.chunks
        );
    }
    0
}

fn cmd_info(args: &InfoArgs, json: bool) -> i32 {
    let file = match File::open(&args.delta) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("hdelta: {}: {e}", args.delta.display());
            return EXIT_IO;
        }
    };
    let mut reader = BufReader::with_capacity(BUF_SIZE, file);

    let header = match Header::decode(&mut reader) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("hdelta: info: {e}");
            return exit_code_for(&e);
        }
    };

    let summary = match walk_chunks(&mut reader, &header) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("hdelta: info: {e}");
            return exit_code_for(&e);
        }
    };

    let codec_name = match header.codec_id {
        Some(CODEC_ZLIB_ID) => "zlib",
        Some(CODEC_LZMA_ID) => "lzma",
        Some(_) => "unknown",
        None => "stored",
    };

    if json {
        let json = serde_json::json!({
            "old_size": header.old_size,
            "new_size": header.new_size,
            "checksums": header.old_adler32.is_some(),
            "codec": codec_name,
            "chunks": summary.chunks,
            "ops_bytes": summary.ops_bytes,
            "literal_bytes": summary.lit_bytes,
        });
        println!("{}", serde_json::to_string_pretty(&json).unwrap());
    } else {
        println!("old size:      {}", header.old_size);
        println!("new size:      {}", header.new_size);
        println!(
            "checksums:     {}",
            if header.old_adler32.is_some() { "adler32" } else { "none" }
        );
        println!("codec:         {codec_name}");
        println!("chunks:        {}", summary.chunks);
        println!("op bytes:      {}", summary.ops_bytes);
        println!("literal bytes: {}", summary.lit_bytes);
    }
    0
}

struct ChunkSummary {
    chunks: u64,
    ops_bytes: u64,
    lit_bytes: u64,
}

/// Walk the chunk headers, skipping section payloads.
fn walk_chunks<R: Read>(reader: &mut R, header: &Header) -> crate::error::Result<ChunkSummary> {
    let mut summary = ChunkSummary {
        chunks: 0,
        ops_bytes: 0,
        lit_bytes: 0,
    };
    let mut covered = 0u64;

    while covered < header.new_size {
        let chunk = match ChunkHeader::decode(reader)? {
            Some(c) => c,
            None => {
                return Err(DeltaError::corrupt(format!(
                    "delta ends after {covered} of {} bytes",
                    header.new_size
                )));
            }
        };
        if chunk.out_len > header.new_size - covered {
            return Err(DeltaError::corrupt(format!(
                "chunk output overruns new_size ({covered} + {} > {})",
                chunk.out_len, header.new_size
            )));
        }
        let payload = chunk
            .ops_len
            .checked_add(chunk.lit_len)
            .ok_or_else(|| DeltaError::corrupt("chunk section lengths overflow"))?;
        let skipped = io::copy(&mut reader.by_ref().take(payload), &mut io::sink())
            .map_err(DeltaError::InputRead)?;
        if skipped != payload {
            return Err(DeltaError::corrupt("truncated chunk payload"));
        }
        summary.chunks += 1;
        summary.ops_bytes += chunk.ops_len;
        summary.lit_bytes += chunk.lit_len;
        covered += chunk.out_len;
    }
    Ok(summary)
}

fn hex(digest: [u8; 32]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run() -> ! {
    let cli = Cli::parse();

    let filter = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let exit_code = match &cli.command {
        Cmd::Diff(args) => cmd_diff(args, cli.quiet, cli.force, cli.json_output),
        Cmd::Patch(args) => cmd_patch(args, cli.quiet, cli.force, cli.json_output),
        Cmd::Info(args) => cmd_info(args, cli.json_output),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
