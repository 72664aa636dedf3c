//! Shared types for hpsync.
//!
//! Everything in this crate is pure data: versions, architecture keys,
//! content digests, and the Scoop manifest document. No I/O happens here,
//! so the pipeline crate and the CLI agree on one wire format.

pub mod arch;
pub mod hash;
pub mod manifest;
pub mod version;

// Re-exports
pub use arch::*;
pub use hash::*;
pub use manifest::{ArchEntry, ManifestDocument, ManifestFormatError};
pub use version::{Version, VersionParseError};
