//! hdelta: compact binary deltas between an old and a new byte
//! sequence.
//!
//! The crate provides:
//! - Buffer diff/patch (`engine`)
//! - Path-based streaming diff/patch with bounded memory (`stream`)
//! - The container format and its encoder/decoder (`format`)
//! - The old-sequence matcher (`matcher`) and edit-script builder
//!   (`script`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! let old = b"hello old world";
//! let new = b"hello new world";
//!
//! let delta = hdelta::diff(old, new).unwrap();
//! let rebuilt = hdelta::patch(old, &delta).unwrap();
//! assert_eq!(rebuilt, new);
//! ```

pub mod codec;
pub mod engine;
pub mod error;
pub mod format;
pub mod matcher;
pub mod script;
pub mod source;
pub mod stream;

#[cfg(feature = "cli")]
pub mod cli;

pub use engine::{diff, diff_with_options, patch, DiffOptions};
pub use error::{DeltaError, Result};
pub use stream::{diff_file, patch_file, DiffStats, PatchStats, StreamOptions};
