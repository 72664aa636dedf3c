//! Core library for hpsync.
//!
//! The release pipeline, leaves first:
//!
//! - [`version`]: resolve the current version from `Cargo.toml` and derive
//!   the previous one.
//! - [`io::source`] / [`io::download`]: bytes of a built artifact, local or
//!   downloaded to a scoped scratch file.
//! - [`hashing`]: streaming SHA-256 per architecture, in parallel.
//! - [`checkpoint`]: durable arch -> digest record for crash recovery.
//! - [`store`]: apply a checkpoint to every manifest mirror.
//! - [`sync`]: the orchestrator tying the stages together.
//!
//! [`forges`], [`credentials`], [`changelog`] and [`release`] cover GitHub
//! release publishing.

pub mod changelog;
pub mod checkpoint;
pub mod config;
pub mod credentials;
pub mod forges;
pub mod hashing;
pub mod io;
pub mod paths;
pub mod release;
pub mod reporter;
pub mod store;
pub mod sync;
pub mod version;

pub use hpsync_schema as schema;
pub use hpsync_schema::{Arch, ArtifactDigest, ManifestDocument, Version};

pub use reporter::{NullReporter, Reporter};

/// User Agent string for core operations
pub const USER_AGENT: &str = concat!("hpsync/", env!("CARGO_PKG_VERSION"));
