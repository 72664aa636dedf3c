use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{method} {url} returned HTTP {status}: {message}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
        message: String,
    },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid API token")]
    InvalidToken,

    #[error("release {tag} has no upload URL")]
    MissingUploadUrl { tag: String },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A release as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseInfo {
    pub id: u64,
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub upload_url: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub assets: Vec<AssetInfo>,
}

impl ReleaseInfo {
    pub fn asset(&self, name: &str) -> Option<&AssetInfo> {
        self.assets.iter().find(|a| a.name == name)
    }
}

/// An asset attached to a release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetInfo {
    pub id: u64,
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

/// Payload for creating a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRelease {
    pub tag_name: String,
    pub name: String,
    pub body: String,
    pub draft: bool,
    pub prerelease: bool,
    pub target_commitish: String,
}

/// A release API scoped to one repository.
#[async_trait]
pub trait ReleaseApi: Send + Sync {
    /// The release for `tag`, or `None` if there is none.
    async fn fetch_release(&self, tag: &str) -> Result<Option<ReleaseInfo>, ApiError>;

    async fn create_release(&self, release: &NewRelease) -> Result<ReleaseInfo, ApiError>;

    /// Upload `path` as asset `name` of `release`.
    async fn upload_asset(
        &self,
        release: &ReleaseInfo,
        path: &Path,
        name: &str,
    ) -> Result<AssetInfo, ApiError>;

    async fn delete_asset(&self, asset_id: u64) -> Result<(), ApiError>;
}
