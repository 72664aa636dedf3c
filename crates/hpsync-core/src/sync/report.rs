//! The outcome of one pipeline run, per architecture and per mirror.

use std::collections::BTreeMap;
use std::path::PathBuf;

use hpsync_schema::{Arch, ArtifactDigest, Version};
use serde::Serialize;

/// Orchestrator states, in order. `Aborted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ResolvingVersion,
    Hashing,
    Checkpointed,
    Applying,
    Done,
    Aborted,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ResolvingVersion => "resolving version",
            Self::Hashing => "hashing",
            Self::Checkpointed => "checkpointed",
            Self::Applying => "applying",
            Self::Done => "done",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// How the orchestrator obtains digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Always hash, overwriting any checkpoint.
    Fresh,
    /// Recovery path: apply the saved checkpoint; a missing or stale one is fatal.
    Resume,
    /// Resume when a checkpoint for the current version exists, hash otherwise.
    #[default]
    Auto,
}

/// Where the applied digests came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestOrigin {
    Hashed,
    Checkpoint,
    /// A partial checkpoint completed by hashing the architectures it lacked.
    Merged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ArchOutcome {
    Ok { digest: ArtifactDigest },
    Failed { reason: String },
    Skipped,
}

impl ArchOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum MirrorStatus {
    /// Written with new content.
    Updated,
    /// Already carried this release; left as is.
    Unchanged,
    Failed { reason: String },
    /// Not attempted because the run aborted earlier.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirrorOutcome {
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: MirrorStatus,
    /// Digests not written because the manifest has no entry for them.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unmatched: Vec<Arch>,
}

impl MirrorOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, MirrorStatus::Failed { .. })
    }
}

/// Final report: always names every architecture and every mirror.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub stage: Stage,
    pub mode: RunMode,
    pub version: Option<Version>,
    pub previous: Option<Version>,
    pub origin: Option<DigestOrigin>,
    pub architectures: BTreeMap<Arch, ArchOutcome>,
    pub mirrors: Vec<MirrorOutcome>,
}

impl SyncReport {
    /// A report where nothing has been attempted yet.
    pub fn pending<A, M>(mode: RunMode, archs: A, mirrors: M) -> Self
    where
        A: IntoIterator<Item = Arch>,
        M: IntoIterator<Item = PathBuf>,
    {
        Self {
            stage: Stage::ResolvingVersion,
            mode,
            version: None,
            previous: None,
            origin: None,
            architectures: archs.into_iter().map(|a| (a, ArchOutcome::Skipped)).collect(),
            mirrors: mirrors
                .into_iter()
                .map(|path| MirrorOutcome {
                    path,
                    status: MirrorStatus::Skipped,
                    unmatched: Vec::new(),
                })
                .collect(),
        }
    }

    pub fn digests(&self) -> BTreeMap<Arch, ArtifactDigest> {
        self.architectures
            .iter()
            .filter_map(|(arch, outcome)| match outcome {
                ArchOutcome::Ok { digest } => Some((*arch, digest.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn failed_architectures(&self) -> Vec<Arch> {
        self.architectures
            .iter()
            .filter(|(_, o)| o.is_failed())
            .map(|(a, _)| *a)
            .collect()
    }

    pub fn failed_mirrors(&self) -> Vec<&MirrorOutcome> {
        self.mirrors.iter().filter(|m| m.is_failed()).collect()
    }

    /// Architectures that ended without a digest (failed or never attempted).
    pub fn missing_architectures(&self) -> Vec<Arch> {
        self.architectures
            .iter()
            .filter(|(_, o)| !matches!(o, ArchOutcome::Ok { .. }))
            .map(|(a, _)| *a)
            .collect()
    }

    /// `Done` with every architecture hashed and every mirror ok.
    pub fn is_complete(&self) -> bool {
        self.stage == Stage::Done
            && self.missing_architectures().is_empty()
            && self.failed_mirrors().is_empty()
    }

    /// Process exit code: 0 complete, 1 aborted, 2 done with partial failures.
    pub fn exit_code(&self) -> i32 {
        match self.stage {
            Stage::Aborted => 1,
            _ if self.is_complete() => 0,
            Stage::Done => 2,
            // A stage-limited run (e.g. hash only) that stopped cleanly.
            _ if self.failed_architectures().is_empty() => 0,
            _ => 2,
        }
    }
}
