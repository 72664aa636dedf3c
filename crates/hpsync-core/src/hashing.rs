//! Streaming SHA-256 of release artifacts.
//!
//! Both source variants end up as a file on disk and go through the same
//! [`digest_reader`] fold, so a local build and a downloaded copy of the same
//! bytes always produce the same digest.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use hpsync_schema::{Arch, ArtifactDigest};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::Reporter;
use crate::io::download::Fetcher;
use crate::io::source::{ArtifactSource, SourceError};

/// Read buffer for hashing.
const READ_BUFFER: usize = 64 * 1024;

/// Fold a byte stream into a SHA-256 digest.
///
/// # Errors
///
/// Propagates read errors.
pub fn digest_reader<R: Read>(mut reader: R) -> std::io::Result<ArtifactDigest> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_BUFFER];
    loop {
        let count = reader.read(&mut buffer)?;
        if count == 0 {
            break;
        }
        hasher.update(&buffer[..count]);
    }
    Ok(ArtifactDigest::from_bytes(hasher.finalize()))
}

/// Digest of a local file (blocking).
///
/// # Errors
///
/// `NotFound` if `path` does not exist.
pub fn digest_file(path: &Path) -> Result<ArtifactDigest, SourceError> {
    let file = std::fs::File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SourceError::NotFound(path.display().to_string())
        } else {
            SourceError::Io(e)
        }
    })?;
    Ok(digest_reader(file)?)
}

/// Per-architecture digests; each entry is independently `Ok`/`Err`.
pub type DigestResults = BTreeMap<Arch, Result<ArtifactDigest, SourceError>>;

/// Computes artifact digests, fetching remote assets through a [`Fetcher`].
#[derive(Debug, Clone)]
pub struct HashEngine {
    fetcher: Fetcher,
}

impl HashEngine {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Digest one artifact.
    ///
    /// # Errors
    ///
    /// `NotFound` / `DownloadFailed` from the source, or read errors.
    pub async fn digest(&self, source: &ArtifactSource) -> Result<ArtifactDigest, SourceError> {
        self.digest_with_progress(source, |_, _| {}).await
    }

    /// Digest one artifact, reporting download progress for remote assets.
    ///
    /// # Errors
    ///
    /// See [`HashEngine::digest`].
    pub async fn digest_with_progress<F>(
        &self,
        source: &ArtifactSource,
        progress: F,
    ) -> Result<ArtifactDigest, SourceError>
    where
        F: Fn(u64, Option<u64>),
    {
        let artifact = source.open(&self.fetcher, progress).await?;

        // The scratch file (if any) lives exactly as long as `artifact`.
        tokio::task::spawn_blocking(move || {
            let reader = artifact.reader()?;
            let digest = digest_reader(reader)?;
            drop(artifact);
            Ok::<ArtifactDigest, SourceError>(digest)
        })
        .await
        .map_err(std::io::Error::other)?
    }

    /// Digest every architecture's artifact concurrently.
    ///
    /// One architecture failing never stops the others; the result carries an
    /// entry for every requested architecture.
    pub async fn digest_all(
        &self,
        sources: Vec<(Arch, ArtifactSource)>,
        reporter: Arc<dyn Reporter>,
    ) -> DigestResults {
        let mut handles = Vec::with_capacity(sources.len());

        for (arch, source) in sources {
            let engine = self.clone();
            let reporter = reporter.clone();
            handles.push((
                arch,
                tokio::spawn(async move {
                    reporter.hashing(arch, &source);
                    debug!(%arch, source = %source.describe(), "hashing");
                    let progress = {
                        let reporter = reporter.clone();
                        move |current, total| reporter.downloading(arch, current, total)
                    };
                    engine.digest_with_progress(&source, progress).await
                }),
            ));
        }

        let mut results = DigestResults::new();
        for (arch, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(SourceError::Io(std::io::Error::other(e))),
            };
            match &result {
                Ok(digest) => info!(%arch, %digest, "hashed"),
                Err(e) => warn!(%arch, error = %e, "hashing failed"),
            }
            results.insert(arch, result);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullReporter;
    use mockito::Server;

    const HELLO: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    fn engine(dir: &Path) -> HashEngine {
        HashEngine::new(Fetcher::new(reqwest::Client::new(), dir.join("scratch")))
    }

    #[test]
    fn digest_reader_matches_known_vector() {
        let d = digest_reader(&b"hello world"[..]).unwrap();
        assert_eq!(d.as_str(), HELLO);
    }

    #[tokio::test]
    async fn local_file_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hp.exe");
        std::fs::write(&path, b"hello world").unwrap();

        let d = engine(dir.path())
            .digest(&ArtifactSource::LocalFile(path))
            .await
            .unwrap();
        assert_eq!(d.as_str(), HELLO);
    }

    #[tokio::test]
    async fn missing_local_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = engine(dir.path())
            .digest(&ArtifactSource::LocalFile(dir.path().join("nope.exe")))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[tokio::test]
    async fn remote_digest_removes_scratch_file() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/hp.exe")
            .with_status(200)
            .with_body("hello world")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let d = engine
            .digest(&ArtifactSource::RemoteAsset(format!("{}/hp.exe", server.url())))
            .await
            .unwrap();
        assert_eq!(d.as_str(), HELLO);

        let leftovers = std::fs::read_dir(engine.fetcher().scratch_dir())
            .unwrap()
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn digest_all_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let ok = dir.path().join("hp.exe");
        std::fs::write(&ok, b"hello world").unwrap();

        let results = engine(dir.path())
            .digest_all(
                vec![
                    (Arch::X64, ArtifactSource::LocalFile(ok)),
                    (
                        Arch::Arm64,
                        ArtifactSource::LocalFile(dir.path().join("hp-arm64.exe")),
                    ),
                ],
                Arc::new(NullReporter),
            )
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[&Arch::X64].as_ref().unwrap().as_str(), HELLO);
        assert!(matches!(results[&Arch::Arm64], Err(SourceError::NotFound(_))));
    }
}
