// Crate-wide error type.
//
// Every failure mode the engine can surface is a distinct variant; no
// condition is downgraded to a default result.  Internal invariant
// violations in the script builder are assertions, not variants: a
// coverage gap is a bug, and aborting beats writing a corrupt diff.

use std::io;

use thiserror::Error;

/// Errors surfaced by diff/patch operations.
#[derive(Debug, Error)]
pub enum DeltaError {
    /// The old or new input could not be read.
    #[error("failed to read input: {0}")]
    InputRead(#[source] io::Error),

    /// The diff or reconstructed output could not be written.
    #[error("failed to write output: {0}")]
    OutputWrite(#[source] io::Error),

    /// The diff is not a format this build can decode: wrong magic,
    /// unknown version byte, or a literal codec compiled out.
    #[error("unsupported delta format: {0}")]
    UnsupportedFormat(String),

    /// The diff stream is damaged: bad flag bits, truncated data, an
    /// operation sequence that does not reconstruct `new_size` bytes,
    /// or a stored checksum that does not match.
    #[error("corrupt diff: {0}")]
    CorruptDiff(String),

    /// The supplied old sequence's length disagrees with the header.
    #[error("old size mismatch: diff was built against {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
}

impl DeltaError {
    /// Shorthand for `CorruptDiff` with a formatted message.
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptDiff(msg.into())
    }

    /// Shorthand for `UnsupportedFormat` with a formatted message.
    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DeltaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_are_distinguishable() {
        let e = DeltaError::SizeMismatch {
            expected: 10,
            actual: 7,
        };
        assert!(matches!(e, DeltaError::SizeMismatch { .. }));
        assert!(e.to_string().contains("10"));

        let e = DeltaError::UnsupportedFormat("version byte 0x42".into());
        assert!(e.to_string().contains("0x42"));
    }

    #[test]
    fn input_read_preserves_source() {
        use std::error::Error;
        let e = DeltaError::InputRead(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(e.source().is_some());
    }
}
