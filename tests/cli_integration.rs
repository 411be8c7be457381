#![cfg(feature = "cli")]

use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn bin() -> String {
    env!("CARGO_BIN_EXE_hdelta").to_string()
}

fn write(path: &Path, data: &[u8]) {
    std::fs::write(path, data).unwrap();
}

#[test]
fn cli_diff_patch_roundtrip() {
    let dir = tempdir().unwrap();
    let old = dir.path().join("old.bin");
    let new = dir.path().join("new.bin");
    let delta = dir.path().join("delta.hdp");
    let out = dir.path().join("out.bin");

    write(&old, b"abcde12345abcde12345");
    write(&new, b"abcdeXXXXXabcde12345!");

    let st = Command::new(bin())
        .arg("diff")
        .args([&old, &new, &delta])
        .status()
        .unwrap();
    assert!(st.success());

    let st = Command::new(bin())
        .arg("patch")
        .args([&old, &delta, &out])
        .status()
        .unwrap();
    assert!(st.success());
    assert_eq!(std::fs::read(&out).unwrap(), std::fs::read(&new).unwrap());
}

#[test]
fn cli_refuses_to_overwrite_without_force() {
    let dir = tempdir().unwrap();
    let old = dir.path().join("old.bin");
    let new = dir.path().join("new.bin");
    let delta = dir.path().join("delta.hdp");

    write(&old, b"old data old data old data");
    write(&new, b"new data new data new data");
    write(&delta, b"pre-existing");

    let st = Command::new(bin())
        .arg("diff")
        .args([&old, &new, &delta])
        .status()
        .unwrap();
    assert!(!st.success());
    assert_eq!(std::fs::read(&delta).unwrap(), b"pre-existing");

    let st = Command::new(bin())
        .args(["diff", "--force"])
        .args([&old, &new, &delta])
        .status()
        .unwrap();
    assert!(st.success());
}

#[test]
fn cli_missing_input_exits_with_io_code() {
    let dir = tempdir().unwrap();
    let st = Command::new(bin())
        .arg("diff")
        .arg(dir.path().join("nope.bin"))
        .arg(dir.path().join("also-nope.bin"))
        .arg(dir.path().join("delta.hdp"))
        .status()
        .unwrap();
    assert_eq!(st.code(), Some(1));
}

#[test]
fn cli_corrupt_delta_exits_with_validation_code() {
    let dir = tempdir().unwrap();
    let old = dir.path().join("old.bin");
    let new = dir.path().join("new.bin");
    let delta = dir.path().join("delta.hdp");
    let out = dir.path().join("out.bin");

    write(&old, &b"0123456789".repeat(100));
    write(&new, &b"0123456789".repeat(101));

    let st = Command::new(bin())
        .arg("diff")
        .args([&old, &new, &delta])
        .status()
        .unwrap();
    assert!(st.success());

    let mut mangled = std::fs::read(&delta).unwrap();
    let mid = mangled.len() / 2;
    mangled[mid] ^= 0xff;
    write(&delta, &mangled);

    let st = Command::new(bin())
        .args(["--quiet", "patch"])
        .args([&old, &delta, &out])
        .status()
        .unwrap();
    assert_eq!(st.code(), Some(2));
}

#[test]
fn cli_wrong_old_file_exits_with_validation_code() {
    let dir = tempdir().unwrap();
    let old = dir.path().join("old.bin");
    let new = dir.path().join("new.bin");
    let delta = dir.path().join("delta.hdp");
    let out = dir.path().join("out.bin");

    write(&old, &b"abcdefgh".repeat(64));
    write(&new, &b"hgfedcba".repeat(64));

    let st = Command::new(bin())
        .arg("diff")
        .args([&old, &new, &delta])
        .status()
        .unwrap();
    assert!(st.success());

    // Truncated old no longer matches the recorded size.
    write(&old, &b"abcdefgh".repeat(63));
    let st = Command::new(bin())
        .arg("patch")
        .args([&old, &delta, &out])
        .status()
        .unwrap();
    assert_eq!(st.code(), Some(2));
}

#[test]
fn cli_json_stats_are_parseable() {
    let dir = tempdir().unwrap();
    let old = dir.path().join("old.bin");
    let new = dir.path().join("new.bin");
    let delta = dir.path().join("delta.hdp");

    write(&old, &b"json stats test ".repeat(32));
    write(&new, &b"json stats test!".repeat(32));

    let output = Command::new(bin())
        .args(["--json", "diff"])
        .args([&old, &new, &delta])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stats: serde_json::Value =
        serde_json::from_slice(&output.stderr).expect("stats should be JSON on stderr");
    assert_eq!(stats["old_size"], 512);
    assert_eq!(stats["new_size"], 512);
}

#[test]
fn cli_info_describes_a_delta() {
    let dir = tempdir().unwrap();
    let old = dir.path().join("old.bin");
    let new = dir.path().join("new.bin");
    let delta = dir.path().join("delta.hdp");

    write(&old, &b"info test data ".repeat(20));
    write(&new, &b"info test data!".repeat(20));

    let st = Command::new(bin())
        .arg("diff")
        .args([&old, &new, &delta])
        .status()
        .unwrap();
    assert!(st.success());

    let output = Command::new(bin())
        .args(["--json", "info"])
        .arg(&delta)
        .output()
        .unwrap();
    assert!(output.status.success());
    let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(info["old_size"], 300);
    assert_eq!(info["new_size"], 300);
    assert!(info["chunks"].as_u64().unwrap() >= 1);
}

#[test]
fn cli_level_and_window_flags_are_accepted() {
    let dir = tempdir().unwrap();
    let old = dir.path().join("old.bin");
    let new = dir.path().join("new.bin");
    let delta = dir.path().join("delta.hdp");
    let out = dir.path().join("out.bin");

    write(&old, &b"windowed ".repeat(4096));
    write(&new, &b"windowed!".repeat(4096));

    let st = Command::new(bin())
        .arg("diff")
        .args(["--level", "9", "--window-size", "16K", "--no-checksum"])
        .args([&old, &new, &delta])
        .status()
        .unwrap();
    assert!(st.success());

    let st = Command::new(bin())
        .args(["patch", "--no-checksum"])
        .args([&old, &delta, &out])
        .status()
        .unwrap();
    assert!(st.success());
    assert_eq!(std::fs::read(&out).unwrap(), std::fs::read(&new).unwrap());
}
