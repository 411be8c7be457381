// File-based diff and patch with bounded memory.
//
// Usage:
//   cargo run --example file_patching -- diff <old> <new> <delta>
//   cargo run --example file_patching -- patch <old> <delta> <out>

use std::path::Path;
use std::process::exit;

use hdelta::{diff_file, patch_file};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 5 {
        eprintln!("usage: {} diff|patch <a> <b> <out>", args[0]);
        exit(2);
    }

    let (a, b, out) = (Path::new(&args[2]), Path::new(&args[3]), Path::new(&args[4]));
    let result = match args[1].as_str() {
        "diff" => diff_file(a, b, out).map(|stats| {
            println!(
                "{} -> {} bytes of delta across {} chunks",
                stats.new_size, stats.diff_size, stats.chunks
            );
        }),
        "patch" => patch_file(a, b, out).map(|stats| {
            println!(
                "reconstructed {} bytes across {} chunks",
                stats.output_size, stats.chunks
            );
        }),
        other => {
            eprintln!("unknown mode {other:?}");
            exit(2);
        }
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        exit(1);
    }
}
