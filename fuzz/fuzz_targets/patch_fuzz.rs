#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes as a delta against an empty old buffer.
    // patch must never panic, only return errors.
    let _ = hdelta::patch(&[], data);

    // Also split the input into an old buffer and a delta.
    if data.len() >= 2 {
        let split = data.len() / 2;
        let (old, delta) = data.split_at(split);
        let _ = hdelta::patch(old, delta);
    }
});
