//! Manifest mirrors.
//!
//! A release updates the same manifest in several places (the bucket repo's
//! source copy, the locally installed bucket, ...). Mirrors are independent:
//! each one is read, updated and atomically replaced on its own, and one
//! mirror failing never stops the others.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use hpsync_schema::{Arch, ArtifactDigest, ManifestDocument, ManifestFormatError, Version};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::io::atomic::write_atomic;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("manifest not found: {}", path.display())]
    ManifestNotFound { path: PathBuf },

    #[error("manifest {} is malformed: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: ManifestFormatError,
    },

    #[error("failed to read manifest {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write manifest {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ManifestError {
    pub fn path(&self) -> &Path {
        match self {
            Self::ManifestNotFound { path }
            | Self::Malformed { path, .. }
            | Self::Io { path, .. }
            | Self::WriteFailed { path, .. } => path,
        }
    }
}

/// What one release changes in a manifest.
#[derive(Debug, Clone)]
pub struct ReleaseUpdate {
    pub version: Version,
    pub previous: Version,
    pub digests: BTreeMap<Arch, ArtifactDigest>,
}

/// Architectures with a digest but no entry in the document's
/// `architecture` table. A manifest without a table takes the default
/// digest at the top level, so nothing is unmatched there.
pub fn unmatched_architectures(doc: &ManifestDocument, update: &ReleaseUpdate) -> Vec<Arch> {
    if doc.architecture.is_empty() {
        return Vec::new();
    }
    update
        .digests
        .keys()
        .filter(|arch| !doc.architecture.contains_key(*arch))
        .copied()
        .collect()
}

/// Apply `update` to one in-memory document. Returns whether anything changed.
///
/// For every architecture with a digest, the entry's hash is replaced and the
/// previous version text in its URL is replaced by the new version text. A URL
/// that no longer contains the previous version is left alone, so applying the
/// same update twice is a no-op. The top-level `url`/`hash` then mirror the
/// default architecture's entry.
pub fn update_document(doc: &mut ManifestDocument, update: &ReleaseUpdate) -> bool {
    let before = doc.clone();
    let previous = update.previous.to_string();
    let current = update.version.to_string();

    doc.version = update.version;

    for (arch, digest) in &update.digests {
        let Some(entry) = doc.architecture.get_mut(arch) else {
            continue;
        };
        entry.hash = digest.to_string();
        entry.url = substitute_version(&entry.url, &previous, &current);
    }

    if let Some(default) = doc.default_arch() {
        let entry = &doc.architecture[&default];
        doc.url = entry.url.clone();
        doc.hash = entry.hash.clone();
    } else {
        // Single-artifact manifest without an architecture table.
        doc.url = substitute_version(&doc.url, &previous, &current);
        if let Some(digest) = Arch::default_of(update.digests.keys().copied())
            .and_then(|arch| update.digests.get(&arch))
        {
            doc.hash = digest.to_string();
        }
    }

    *doc != before
}

fn substitute_version(url: &str, previous: &str, current: &str) -> String {
    if previous == current || !url.contains(previous) {
        return url.to_string();
    }
    url.replace(previous, current)
}

/// Outcome of applying to one mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// Whether the file was rewritten.
    pub changed: bool,
    /// Digests the manifest had no architecture entry for.
    pub unmatched: Vec<Arch>,
}

/// Read, update and atomically rewrite one mirror.
pub async fn apply_to_mirror(path: &Path, update: &ReleaseUpdate) -> Result<Applied, ManifestError> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ManifestError::ManifestNotFound {
                path: path.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(ManifestError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut doc = ManifestDocument::from_json(&text).map_err(|source| ManifestError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;

    let unmatched = unmatched_architectures(&doc, update);
    for arch in &unmatched {
        warn!(path = %path.display(), %arch, "manifest has no entry for architecture; digest not written");
    }

    let changed = update_document(&mut doc, update);
    let rendered = doc
        .to_json_pretty()
        .map_err(|e| ManifestError::WriteFailed {
            path: path.to_path_buf(),
            source: std::io::Error::other(e),
        })?;
    if !changed && rendered == text {
        debug!(path = %path.display(), "manifest already up to date");
        return Ok(Applied {
            changed: false,
            unmatched,
        });
    }

    write_atomic(path, rendered.into_bytes())
        .await
        .map_err(|source| ManifestError::WriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
    info!(path = %path.display(), version = %update.version, "manifest updated");
    Ok(Applied {
        changed: true,
        unmatched,
    })
}

/// The ordered set of manifest mirrors.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    mirrors: Vec<PathBuf>,
}

impl ManifestStore {
    /// Build a store; duplicate locations are collapsed so that two applies
    /// never target the same file at once.
    pub fn new<I, P>(mirrors: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut seen = Vec::new();
        let mut unique = Vec::new();
        for mirror in mirrors {
            let mirror = mirror.into();
            let key = normalize(&mirror);
            if seen.contains(&key) {
                warn!(path = %mirror.display(), "duplicate mirror ignored");
                continue;
            }
            seen.push(key);
            unique.push(mirror);
        }
        Self { mirrors: unique }
    }

    pub fn mirrors(&self) -> &[PathBuf] {
        &self.mirrors
    }

    /// Apply `update` to every mirror concurrently.
    ///
    /// Results are returned in mirror order; each is independent.
    pub async fn apply(&self, update: &ReleaseUpdate) -> Vec<(PathBuf, Result<Applied, ManifestError>)> {
        let mut handles = Vec::with_capacity(self.mirrors.len());
        for mirror in &self.mirrors {
            let path = mirror.clone();
            let update = update.clone();
            handles.push((
                mirror.clone(),
                tokio::spawn(async move { apply_to_mirror(&path, &update).await }),
            ));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (path, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(ManifestError::WriteFailed {
                    path: path.clone(),
                    source: std::io::Error::other(e),
                }),
            };
            if let Err(e) = &result {
                warn!(path = %path.display(), error = %e, "mirror apply failed");
            }
            results.push((path, result));
        }
        results
    }
}

/// Lexical normalisation (no filesystem access; mirrors may not exist yet).
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(c: char) -> ArtifactDigest {
        ArtifactDigest::new(c.to_string().repeat(64)).unwrap()
    }

    fn manifest(version: &str) -> String {
        format!(
            r#"{{
    "version": "{version}",
    "url": "https://example.com/download/{version}/hp.exe",
    "hash": "old",
    "architecture": {{
        "64bit": {{
            "url": "https://example.com/download/{version}/hp.exe",
            "hash": "old"
        }},
        "arm64": {{
            "url": "https://example.com/download/{version}/hp-arm64.exe",
            "hash": "old"
        }}
    }}
}}
"#
        )
    }

    fn update() -> ReleaseUpdate {
        ReleaseUpdate {
            version: Version::new(3, 3, 5),
            previous: Version::new(3, 3, 4),
            digests: BTreeMap::from([(Arch::X64, digest('a')), (Arch::Arm64, digest('b'))]),
        }
    }

    #[test]
    fn updates_hashes_urls_and_default() {
        let mut doc = ManifestDocument::from_json(&manifest("3.3.4")).unwrap();
        assert!(update_document(&mut doc, &update()));

        assert_eq!(doc.version, Version::new(3, 3, 5));
        let x64 = &doc.architecture[&Arch::X64];
        assert_eq!(x64.hash, "a".repeat(64));
        assert_eq!(x64.url, "https://example.com/download/3.3.5/hp.exe");
        assert_eq!(
            doc.architecture[&Arch::Arm64].url,
            "https://example.com/download/3.3.5/hp-arm64.exe"
        );
        assert_eq!(doc.url, x64.url);
        assert_eq!(doc.hash, x64.hash);
    }

    #[test]
    fn url_without_previous_version_is_untouched() {
        let mut doc = ManifestDocument::from_json(&manifest("1.0.0")).unwrap();
        update_document(&mut doc, &update());
        assert_eq!(
            doc.architecture[&Arch::X64].url,
            "https://example.com/download/1.0.0/hp.exe"
        );
    }

    #[test]
    fn only_architectures_with_digests_change() {
        let mut doc = ManifestDocument::from_json(&manifest("3.3.4")).unwrap();
        let mut partial = update();
        partial.digests.remove(&Arch::Arm64);
        update_document(&mut doc, &partial);
        let arm = &doc.architecture[&Arch::Arm64];
        assert_eq!(arm.hash, "old");
        assert!(arm.url.contains("/3.3.4/"));
    }

    #[test]
    fn flat_manifest_without_architectures() {
        let text = r#"{"version": "3.3.4", "url": "https://e.com/3.3.4/hp.exe", "hash": "old", "architecture": {}}"#;
        let mut doc = ManifestDocument::from_json(text).unwrap();
        update_document(&mut doc, &update());
        assert_eq!(doc.url, "https://e.com/3.3.5/hp.exe");
        assert_eq!(doc.hash, "a".repeat(64));
    }

    #[tokio::test]
    async fn apply_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hp.json");
        std::fs::write(&path, manifest("3.3.4")).unwrap();

        assert!(apply_to_mirror(&path, &update()).await.unwrap().changed);
        let once = std::fs::read_to_string(&path).unwrap();
        assert!(!apply_to_mirror(&path, &update()).await.unwrap().changed);
        let twice = std::fs::read_to_string(&path).unwrap();
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn missing_mirror_does_not_block_others() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.json");
        std::fs::write(&good, manifest("3.3.4")).unwrap();
        let missing = dir.path().join("missing.json");

        let store = ManifestStore::new([missing.clone(), good.clone()]);
        let results = store.apply(&update()).await;

        assert_eq!(results.len(), 2);
        assert!(matches!(
            &results[0].1,
            Err(ManifestError::ManifestNotFound { path }) if *path == missing
        ));
        assert!(results[1].1.as_ref().unwrap().changed);
        assert!(std::fs::read_to_string(&good).unwrap().contains("3.3.5"));
    }

    #[tokio::test]
    async fn digest_without_manifest_entry_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hp.json");
        std::fs::write(&path, manifest("3.3.4")).unwrap();

        let mut with_x86 = update();
        with_x86.digests.insert(Arch::X86, digest('c'));
        let applied = apply_to_mirror(&path, &with_x86).await.unwrap();

        assert!(applied.changed);
        assert_eq!(applied.unmatched, vec![Arch::X86]);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("32bit"));
        assert!(!text.contains(&"c".repeat(64)));
    }

    #[test]
    fn flat_manifest_has_nothing_unmatched() {
        let text = r#"{"version": "3.3.4", "url": "https://e.com/3.3.4/hp.exe", "hash": "old", "architecture": {}}"#;
        let doc = ManifestDocument::from_json(text).unwrap();
        assert!(unmatched_architectures(&doc, &update()).is_empty());
    }

    #[test]
    fn duplicate_mirrors_are_collapsed() {
        let store = ManifestStore::new(["bucket/hp.json", "./bucket/hp.json", "x/../bucket/hp.json"]);
        assert_eq!(store.mirrors().len(), 1);
    }
}
