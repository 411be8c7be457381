//! Container format: header layout, chunk framing, varint primitives,
//! and the streaming encoder/decoder pair.

pub mod decoder;
pub mod encoder;
pub mod header;
pub mod varint;

pub use decoder::DiffDecoder;
pub use encoder::DiffEncoder;
pub use header::{adler32, ChunkFlags, ChunkHeader, Header, HeaderFlags};
