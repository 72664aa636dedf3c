//! Streaming download of release assets into scoped scratch files.
//!
//! The body is streamed in bounded windows straight to disk; nothing holds
//! the whole artifact in memory. The scratch file is a [`NamedTempFile`], so
//! it is removed when dropped: after the digest is computed, and on every
//! error path in between.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::Client;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::io::source::SourceError;

/// Largest slice written to disk per call.
pub const DOWNLOAD_WINDOW: usize = 8 * 1024;

/// HTTP client plus the directory scratch files are created in.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    scratch_dir: PathBuf,
}

impl Fetcher {
    pub fn new(client: Client, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Download `url` into a fresh scratch file.
    ///
    /// `progress` is called with `(bytes_so_far, content_length)` after each
    /// window is written.
    ///
    /// # Errors
    ///
    /// `DownloadFailed` on transport errors and non-2xx responses; `Io` if
    /// the scratch file cannot be written.
    pub async fn download<F>(&self, url: &str, progress: F) -> Result<NamedTempFile, SourceError>
    where
        F: Fn(u64, Option<u64>),
    {
        let failed = |reason: String| SourceError::DownloadFailed {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "asset download rejected");
            return Err(failed(format!("HTTP {status}")));
        }
        let total = response.content_length();

        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix("hpsync-")
            .suffix(".part")
            .tempfile_in(&self.scratch_dir)?;
        let mut file = tokio::fs::File::from_std(scratch.reopen()?);

        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| failed(e.to_string()))?;
            for window in chunk.chunks(DOWNLOAD_WINDOW) {
                file.write_all(window).await?;
                downloaded += window.len() as u64;
                progress(downloaded, total);
            }
        }
        file.flush().await?;
        file.sync_all().await?;

        if let Some(expected) = total {
            if expected != downloaded {
                return Err(failed(format!(
                    "truncated body: got {downloaded} of {expected} bytes"
                )));
            }
        }

        debug!(%url, bytes = downloaded, path = %scratch.path().display(), "downloaded to scratch");
        Ok(scratch)
    }
}
