use hdelta::{diff, diff_with_options, patch, DeltaError, DiffOptions};

// Deterministic pseudo-random bytes, independent of the rand crate version.
fn random_bytes(n: usize, mut state: u64) -> Vec<u8> {
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 56) as u8
        })
        .collect()
}

#[test]
fn rearranged_random_old_produces_compact_delta() {
    let old = random_bytes(40960, 0x5eed);
    let mut new = Vec::new();
    new.extend_from_slice(b"prefix_");
    new.extend_from_slice(&old[..4096]);
    new.extend_from_slice(b"_middle_");
    new.extend_from_slice(&old[4096..]);
    new.extend_from_slice(b"_suffix");

    let delta = diff(&old, &new).unwrap();
    assert!(
        delta.len() < new.len() / 4,
        "delta={} new={}",
        delta.len(),
        new.len()
    );
    assert_eq!(patch(&old, &delta).unwrap(), new);
}

#[test]
fn repeated_text_diffed_against_itself_shrinks() {
    let old = b"Hello World".repeat(100);
    let delta = diff(&old, &old).unwrap();
    assert!(delta.len() < old.len(), "delta={} old={}", delta.len(), old.len());
    assert_eq!(patch(&old, &delta).unwrap(), old);
}

#[test]
fn header_footer_edit_costs_roughly_the_edit() {
    let old = random_bytes(100 * 1024, 0xf007);
    let mut new = Vec::new();
    new.extend_from_slice(b"header");
    new.extend_from_slice(&old);
    new.extend_from_slice(b"footer");

    let delta = diff(&old, &new).unwrap();
    // Two literal runs plus container framing; the old body is one copy.
    assert!(delta.len() < 256, "delta={}", delta.len());
    assert_eq!(patch(&old, &delta).unwrap(), new);
}

#[test]
fn diff_is_deterministic_across_invocations() {
    let old = random_bytes(30000, 1);
    let mut new = old.clone();
    new[12345] ^= 0xff;
    new.extend_from_slice(&random_bytes(500, 2));

    let a = diff(&old, &new).unwrap();
    let b = diff(&old, &new).unwrap();
    assert_eq!(a, b);
}

#[test]
fn every_level_round_trips_the_same_output() {
    let old = random_bytes(20000, 3);
    let mut new = old.clone();
    new.drain(5000..7000);
    new.extend_from_slice(&random_bytes(1000, 4));

    for level in 1..=9 {
        let delta = diff_with_options(
            &old,
            &new,
            &DiffOptions {
                level,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(patch(&old, &delta).unwrap(), new, "level {level}");
    }
}

#[test]
fn corruption_anywhere_is_detected_or_harmless() {
    let old = random_bytes(8192, 5);
    let mut new = old.clone();
    new[100] ^= 0x55;
    new.extend_from_slice(b"tail bytes");

    let delta = diff(&old, &new).unwrap();
    for pos in 0..delta.len() {
        let mut mangled = delta.clone();
        mangled[pos] ^= 0x01;
        match patch(&old, &mangled) {
            // A flip the checksum cannot see must still decode exactly.
            Ok(restored) => assert_eq!(restored, new, "silent corruption at byte {pos}"),
            Err(
                DeltaError::CorruptDiff(_)
                | DeltaError::SizeMismatch { .. }
                | DeltaError::UnsupportedFormat(_),
            ) => {}
            Err(other) => panic!("unexpected error at byte {pos}: {other}"),
        }
    }
}

#[test]
fn wrong_old_buffer_is_size_mismatch() {
    let old = random_bytes(4096, 6);
    let new = random_bytes(4096, 7);
    let delta = diff(&old, &new).unwrap();

    let err = patch(&old[..4095], &delta).unwrap_err();
    assert!(matches!(err, DeltaError::SizeMismatch { .. }), "{err}");
}

#[test]
fn foreign_bytes_are_unsupported_format() {
    let err = patch(b"old", b"not a delta at all").unwrap_err();
    assert!(matches!(err, DeltaError::UnsupportedFormat(_)), "{err}");
}

#[test]
fn empty_edges_round_trip() {
    for (old, new) in [
        (Vec::new(), Vec::new()),
        (Vec::new(), random_bytes(1000, 8)),
        (random_bytes(1000, 9), Vec::new()),
    ] {
        let delta = diff(&old, &new).unwrap();
        assert_eq!(patch(&old, &delta).unwrap(), new);
    }
}

#[test]
fn tiny_inputs_round_trip() {
    for n in 0..32 {
        let old = random_bytes(n, 10 + n as u64);
        let new = random_bytes(n + 1, 50 + n as u64);
        let delta = diff(&old, &new).unwrap();
        assert_eq!(patch(&old, &delta).unwrap(), new, "n={n}");
    }
}
