#![no_main]
use hdelta::format::{ChunkHeader, Header};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut cursor = std::io::Cursor::new(data);
    // Header and chunk parsing must reject garbage without panicking.
    if let Ok(header) = Header::decode(&mut cursor) {
        let _ = header.encode(&mut Vec::new());
        while let Ok(Some(_chunk)) = ChunkHeader::decode(&mut cursor) {}
    }
});
