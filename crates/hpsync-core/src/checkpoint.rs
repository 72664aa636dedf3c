//! Durable record of the digests computed by one pipeline run.
//!
//! The checkpoint sits between hashing and applying: once it is saved, a
//! crash before the manifests are written costs nothing but a re-run of
//! `apply`, which loads the checkpoint instead of downloading again.
//!
//! On disk it is a flat JSON object, one key per architecture plus the
//! reserved `version` tag:
//!
//! ```json
//! {
//!   "version": "3.3.5",
//!   "64bit": "aaaa...",
//!   "arm64": "bbbb..."
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use hpsync_schema::{Arch, ArtifactDigest, Version};
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::io::atomic::write_atomic;

const VERSION_KEY: &str = "version";

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("no checkpoint at {}", path.display())]
    CheckpointMissing { path: PathBuf },

    #[error("checkpoint at {} is for {found}, expected {expected}", path.display())]
    CheckpointStale {
        path: PathBuf,
        found: Version,
        expected: Version,
    },

    #[error("checkpoint at {} is malformed: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("failed to write checkpoint {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read checkpoint {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The digests computed for one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointData {
    pub version: Version,
    pub digests: BTreeMap<Arch, ArtifactDigest>,
}

impl Serialize for CheckpointData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.digests.len() + 1))?;
        map.serialize_entry(VERSION_KEY, &self.version)?;
        for (arch, digest) in &self.digests {
            map.serialize_entry(arch, digest)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CheckpointData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
        let mut version = None;
        let mut digests = BTreeMap::new();
        for (key, value) in raw {
            if key == VERSION_KEY {
                version = Some(Version::parse(&value).map_err(D::Error::custom)?);
                continue;
            }
            let arch = key.parse::<Arch>().map_err(D::Error::custom)?;
            let digest = ArtifactDigest::new(value).map_err(D::Error::custom)?;
            digests.insert(arch, digest);
        }
        let version = version.ok_or_else(|| D::Error::missing_field(VERSION_KEY))?;
        Ok(Self { version, digests })
    }
}

/// The checkpoint location.
///
/// Saves, loads and consumes are serialised through one lock, so no reader
/// of this handle ever races a writer. Each save is an atomic replace, so a
/// reader in another process sees the previous checkpoint or the new one.
#[derive(Debug)]
pub struct Checkpoint {
    path: PathBuf,
    lock: Mutex<()>,
}

impl Checkpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist `data`, superseding any previous checkpoint.
    pub async fn save(&self, data: &CheckpointData) -> Result<(), CheckpointError> {
        let _guard = self.lock.lock().await;
        let mut text = serde_json::to_string_pretty(data).map_err(|e| CheckpointError::WriteFailed {
            path: self.path.clone(),
            source: std::io::Error::other(e),
        })?;
        text.push('\n');

        write_atomic(&self.path, text.into_bytes())
            .await
            .map_err(|source| CheckpointError::WriteFailed {
                path: self.path.clone(),
                source,
            })?;
        info!(path = %self.path.display(), version = %data.version, archs = data.digests.len(), "checkpoint saved");
        Ok(())
    }

    /// Read the last saved checkpoint.
    pub async fn load(&self) -> Result<CheckpointData, CheckpointError> {
        let _guard = self.lock.lock().await;
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CheckpointError::CheckpointMissing {
                    path: self.path.clone(),
                });
            }
            Err(source) => {
                return Err(CheckpointError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        let data: CheckpointData =
            serde_json::from_str(&text).map_err(|e| CheckpointError::Malformed {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        debug!(path = %self.path.display(), version = %data.version, "checkpoint loaded");
        Ok(data)
    }

    /// Load, requiring the checkpoint to be for `expected`.
    pub async fn load_for(&self, expected: Version) -> Result<CheckpointData, CheckpointError> {
        let data = self.load().await?;
        if data.version != expected {
            return Err(CheckpointError::CheckpointStale {
                path: self.path.clone(),
                found: data.version,
                expected,
            });
        }
        Ok(data)
    }

    /// Remove the checkpoint once it has been fully applied.
    ///
    /// A later `load` then reports `CheckpointMissing` until the next save.
    pub async fn consume(&self) -> Result<(), CheckpointError> {
        let _guard = self.lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "checkpoint consumed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CheckpointError::WriteFailed {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
