//! Where the bytes of a built artifact come from.

use std::fs::File;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::io::download::Fetcher;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("download of {url} failed: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bytes of one built artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSource {
    /// A file produced by the local build.
    LocalFile(PathBuf),
    /// A release asset fetched over HTTP (its `browser_download_url`).
    RemoteAsset(String),
}

impl ArtifactSource {
    /// Make the artifact readable from disk.
    ///
    /// Local files are checked for existence at this point, not earlier.
    /// Remote assets are streamed into a scratch file owned by the returned
    /// [`OpenedArtifact`].
    ///
    /// # Errors
    ///
    /// `NotFound` for a missing local file, `DownloadFailed` for a failed
    /// fetch.
    pub async fn open<F>(&self, fetcher: &Fetcher, progress: F) -> Result<OpenedArtifact, SourceError>
    where
        F: Fn(u64, Option<u64>),
    {
        match self {
            Self::LocalFile(path) => {
                if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                    return Err(SourceError::NotFound(path.display().to_string()));
                }
                Ok(OpenedArtifact {
                    path: path.clone(),
                    _scratch: None,
                })
            }
            Self::RemoteAsset(url) => {
                let scratch = fetcher.download(url, progress).await?;
                Ok(OpenedArtifact {
                    path: scratch.path().to_path_buf(),
                    _scratch: Some(scratch),
                })
            }
        }
    }

    /// Short description for logs and reports.
    pub fn describe(&self) -> String {
        match self {
            Self::LocalFile(path) => path.display().to_string(),
            Self::RemoteAsset(url) => url.clone(),
        }
    }
}

/// An artifact available on local disk for the duration of this value.
///
/// For remote assets the backing scratch file is deleted on drop.
#[derive(Debug)]
pub struct OpenedArtifact {
    path: PathBuf,
    _scratch: Option<NamedTempFile>,
}

impl OpenedArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the artifact for streaming reads.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file vanished since [`ArtifactSource::open`].
    pub fn reader(&self) -> Result<File, SourceError> {
        File::open(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SourceError::NotFound(self.path.display().to_string())
            } else {
                SourceError::Io(e)
            }
        })
    }
}
