#![no_main]
use hdelta::{diff_with_options, patch, DiffOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    // First byte picks the effort level, checksum toggle, and split point.
    let flags = data[0];
    let payload = &data[1..];
    let level = (flags as u32 % 9) + 1;
    let split = payload.len() * (flags as usize % 4) / 4;
    let (old, new) = payload.split_at(split);

    let opts = DiffOptions {
        level,
        checksum: flags & 0x10 != 0,
        ..Default::default()
    };
    let delta = diff_with_options(old, new, &opts).unwrap();
    let restored = patch(old, &delta).unwrap();
    assert_eq!(restored, new);
});
