//! Adapters for code hosting release APIs.

/// GitHub REST release/asset client.
pub mod github;
/// Shared traits and types for release adapters.
pub mod traits;

pub use github::GithubClient;
pub use traits::{ApiError, AssetInfo, NewRelease, ReleaseApi, ReleaseInfo};
