//! The release pipeline state machine.
//!
//! ```text
//! ResolvingVersion -> Hashing -> Checkpointed -> Applying -> Done
//!        \               \           \              \
//!         `---------------`-----------`--------------`--> Aborted
//! ```
//!
//! Per-architecture and per-mirror failures are recorded in the
//! [`SyncReport`] and never abort sibling work. Version resolution,
//! credentials and the checkpoint itself are structural: a failure there
//! aborts the run with the report attached.

pub mod report;

use std::collections::BTreeMap;
use std::sync::Arc;

use hpsync_schema::{Arch, ArtifactDigest, Version};
use thiserror::Error;
use tracing::{info, warn};

use crate::Reporter;
use crate::checkpoint::{Checkpoint, CheckpointData, CheckpointError};
use crate::config::{ArtifactLocation, ConfigError, ReleaseConfig};
use crate::credentials::{CredentialError, read_token};
use crate::forges::{ApiError, GithubClient, ReleaseApi};
use crate::hashing::{DigestResults, HashEngine};
use crate::io::download::Fetcher;
use crate::io::source::{ArtifactSource, SourceError};
use crate::store::{ManifestStore, ReleaseUpdate};
use crate::version::{VersionError, VersionPair, VersionResolver};

pub use report::{
    ArchOutcome, DigestOrigin, MirrorOutcome, MirrorStatus, RunMode, Stage, SyncReport,
};

/// Why a run stopped early.
#[derive(Error, Debug)]
pub enum AbortCause {
    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no architecture produced a digest")]
    NoDigests,
}

/// A run that reached `Aborted`, with everything known at that point.
#[derive(Error, Debug)]
#[error("aborted while {stage}: {cause}")]
pub struct SyncError {
    pub stage: Stage,
    #[source]
    pub cause: AbortCause,
    pub report: Box<SyncReport>,
}

/// Drives one release through the pipeline.
///
/// Owns the checkpoint and all manifest writes for the duration of a run.
pub struct SyncOrchestrator {
    config: ReleaseConfig,
    engine: HashEngine,
    checkpoint: Checkpoint,
    store: ManifestStore,
    reporter: Arc<dyn Reporter>,
    api: Option<Arc<dyn ReleaseApi>>,
}

impl SyncOrchestrator {
    pub fn new(config: ReleaseConfig, reporter: Arc<dyn Reporter>) -> Self {
        let fetcher = Fetcher::new(reqwest::Client::new(), config.scratch_dir.clone());
        Self {
            engine: HashEngine::new(fetcher),
            checkpoint: Checkpoint::new(config.checkpoint.clone()),
            store: ManifestStore::new(config.mirrors.clone()),
            config,
            reporter,
            api: None,
        }
    }

    /// Use `api` for release asset lookups instead of building a GitHub
    /// client from the token file.
    #[must_use]
    pub fn with_release_api(mut self, api: Arc<dyn ReleaseApi>) -> Self {
        self.api = Some(api);
        self
    }

    pub fn config(&self) -> &ReleaseConfig {
        &self.config
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Run the whole pipeline.
    ///
    /// # Errors
    ///
    /// `SyncError` when the run reaches `Aborted`. A run that reaches `Done`
    /// with some architectures or mirrors failed is `Ok`; inspect the report.
    pub async fn run(&self, mode: RunMode) -> Result<SyncReport, SyncError> {
        let mut report = self.pending(mode);
        let pair = self.resolve(&mut report)?;

        let digests = match mode {
            RunMode::Fresh => {
                self.hash_and_checkpoint(&mut report, pair, BTreeMap::new())
                    .await?
            }
            RunMode::Resume => match self.checkpoint.load_for(pair.current).await {
                Ok(data) => self.resume_from(&mut report, data),
                Err(e) => return Err(self.abort(report, Stage::Checkpointed, e.into())),
            },
            RunMode::Auto => match self.checkpoint.load_for(pair.current).await {
                Ok(data) if self.uncovered(&data).is_empty() => {
                    info!(version = %data.version, "resuming from checkpoint");
                    self.resume_from(&mut report, data)
                }
                Ok(data) => {
                    info!(
                        version = %data.version,
                        missing = ?self.uncovered(&data),
                        "checkpoint is partial; hashing the missing architectures"
                    );
                    self.hash_and_checkpoint(&mut report, pair, data.digests)
                        .await?
                }
                Err(
                    e @ (CheckpointError::CheckpointMissing { .. }
                    | CheckpointError::CheckpointStale { .. }
                    | CheckpointError::Malformed { .. }),
                ) => {
                    if !matches!(e, CheckpointError::CheckpointMissing { .. }) {
                        warn!(error = %e, "ignoring unusable checkpoint");
                        self.reporter.warning(&e.to_string());
                    }
                    self.hash_and_checkpoint(&mut report, pair, BTreeMap::new())
                        .await?
                }
                Err(e) => return Err(self.abort(report, Stage::Checkpointed, e.into())),
            },
        };

        self.apply(&mut report, pair, digests).await;
        Ok(report)
    }

    /// Resolve, hash and checkpoint without touching any mirror.
    ///
    /// # Errors
    ///
    /// As for [`SyncOrchestrator::run`].
    pub async fn hash_only(&self) -> Result<SyncReport, SyncError> {
        let mut report = self.pending(RunMode::Fresh);
        report.mirrors.clear();
        let pair = self.resolve(&mut report)?;
        self.hash_and_checkpoint(&mut report, pair, BTreeMap::new())
            .await?;
        Ok(report)
    }

    fn pending(&self, mode: RunMode) -> SyncReport {
        let report = SyncReport::pending(
            mode,
            self.config.artifacts.keys().copied(),
            self.store.mirrors().iter().cloned(),
        );
        self.reporter.stage(Stage::ResolvingVersion);
        report
    }

    fn enter(&self, report: &mut SyncReport, stage: Stage) {
        info!(%stage, "stage");
        report.stage = stage;
        self.reporter.stage(stage);
    }

    fn abort(&self, mut report: SyncReport, stage: Stage, cause: AbortCause) -> SyncError {
        warn!(%stage, error = %cause, "sync aborted");
        report.stage = Stage::Aborted;
        self.reporter.stage(Stage::Aborted);
        SyncError {
            stage,
            cause,
            report: Box::new(report),
        }
    }

    fn resolve(&self, report: &mut SyncReport) -> Result<VersionPair, SyncError> {
        let pair = match VersionResolver::from_file(&self.config.build_config)
            .and_then(|resolver| resolver.resolve())
        {
            Ok(pair) => pair,
            Err(e) => return Err(self.abort(report.clone(), Stage::ResolvingVersion, e.into())),
        };
        info!(current = %pair.current, previous = %pair.previous, "version resolved");
        report.version = Some(pair.current);
        report.previous = Some(pair.previous);
        Ok(pair)
    }

    /// Configured architectures the checkpoint has no digest for.
    fn uncovered(&self, data: &CheckpointData) -> Vec<Arch> {
        self.config
            .artifacts
            .keys()
            .filter(|arch| !data.digests.contains_key(*arch))
            .copied()
            .collect()
    }

    /// Hash every configured architecture not already in `known`, then
    /// checkpoint the union.
    async fn hash_and_checkpoint(
        &self,
        report: &mut SyncReport,
        pair: VersionPair,
        known: BTreeMap<Arch, ArtifactDigest>,
    ) -> Result<BTreeMap<Arch, ArtifactDigest>, SyncError> {
        self.enter(report, Stage::Hashing);

        let (sources, unresolved) = match self.sources(pair.current, &known).await {
            Ok(split) => split,
            Err(cause) => return Err(self.abort(report.clone(), Stage::Hashing, cause)),
        };
        let mut results = self.engine.digest_all(sources, self.reporter.clone()).await;
        results.extend(unresolved);

        let merged = !known.is_empty();
        for (arch, digest) in known {
            report.architectures.insert(arch, ArchOutcome::Ok { digest });
        }
        for (arch, result) in results {
            let outcome = match result {
                Ok(digest) => ArchOutcome::Ok { digest },
                Err(e) => ArchOutcome::Failed {
                    reason: e.to_string(),
                },
            };
            self.reporter.hashed(arch, &outcome);
            report.architectures.insert(arch, outcome);
        }

        let digests = report.digests();
        if digests.is_empty() {
            return Err(self.abort(report.clone(), Stage::Hashing, AbortCause::NoDigests));
        }

        let data = CheckpointData {
            version: pair.current,
            digests,
        };
        if let Err(e) = self.checkpoint.save(&data).await {
            return Err(self.abort(report.clone(), Stage::Hashing, e.into()));
        }
        report.origin = Some(if merged {
            DigestOrigin::Merged
        } else {
            DigestOrigin::Hashed
        });
        self.enter(report, Stage::Checkpointed);
        Ok(data.digests)
    }

    fn resume_from(&self, report: &mut SyncReport, data: CheckpointData) -> BTreeMap<Arch, ArtifactDigest> {
        for arch in self.uncovered(&data) {
            warn!(%arch, "checkpoint has no digest for architecture");
            report.architectures.insert(
                arch,
                ArchOutcome::Failed {
                    reason: "no digest in checkpoint; run `sync` to hash it".to_string(),
                },
            );
        }
        for (arch, digest) in &data.digests {
            report.architectures.insert(
                *arch,
                ArchOutcome::Ok {
                    digest: digest.clone(),
                },
            );
        }
        report.origin = Some(DigestOrigin::Checkpoint);
        self.enter(report, Stage::Checkpointed);
        data.digests
    }

    /// Sources per architecture not in `known`. Release assets are looked up
    /// by name in the release for the current tag; lookups that fail come back
    /// as per-architecture errors.
    async fn sources(
        &self,
        version: Version,
        known: &BTreeMap<Arch, ArtifactDigest>,
    ) -> Result<(Vec<(Arch, ArtifactSource)>, DigestResults), AbortCause> {
        let tag = version.tag();
        let pending: Vec<(&Arch, &ArtifactLocation)> = self
            .config
            .artifacts
            .iter()
            .filter(|(arch, _)| !known.contains_key(*arch))
            .collect();
        let needs_release = pending.iter().any(|(_, location)| location.needs_release());
        let release = if needs_release {
            let api = self.release_api().await?;
            Some(api.fetch_release(&tag).await)
        } else {
            None
        };

        let mut sources = Vec::new();
        let mut unresolved = DigestResults::new();
        for (arch, location) in pending {
            if let Some(source) = location.direct_source() {
                sources.push((*arch, source));
                continue;
            }
            let ArtifactLocation::Asset(name) = location else {
                continue;
            };

            let lookup = match &release {
                Some(Ok(Some(info))) => info
                    .asset(name)
                    .map(|asset| ArtifactSource::RemoteAsset(asset.browser_download_url.clone()))
                    .ok_or_else(|| SourceError::NotFound(format!("asset {name} in release {tag}"))),
                Some(Ok(None)) => Err(SourceError::NotFound(format!("release {tag} (asset {name})"))),
                Some(Err(e)) => Err(SourceError::DownloadFailed {
                    url: format!("release {tag}"),
                    reason: e.to_string(),
                }),
                None => Err(SourceError::NotFound(name.clone())),
            };
            match lookup {
                Ok(source) => sources.push((*arch, source)),
                Err(e) => {
                    warn!(%arch, error = %e, "release asset unavailable");
                    unresolved.insert(*arch, Err(e));
                }
            }
        }
        Ok((sources, unresolved))
    }

    async fn release_api(&self) -> Result<Arc<dyn ReleaseApi>, AbortCause> {
        if let Some(api) = &self.api {
            return Ok(api.clone());
        }
        let (owner, repo) = self.config.repository()?;
        let token = read_token(&self.config.token_file).await?;
        let client = GithubClient::new(&self.config.api_url, owner, repo, &token)?;
        Ok(Arc::new(client))
    }

    async fn apply(
        &self,
        report: &mut SyncReport,
        pair: VersionPair,
        digests: BTreeMap<Arch, ArtifactDigest>,
    ) {
        self.enter(report, Stage::Applying);
        let update = ReleaseUpdate {
            version: pair.current,
            previous: pair.previous,
            digests,
        };

        report.mirrors = self
            .store
            .apply(&update)
            .await
            .into_iter()
            .map(|(path, result)| {
                let (status, unmatched) = match result {
                    Ok(applied) if applied.changed => (MirrorStatus::Updated, applied.unmatched),
                    Ok(applied) => (MirrorStatus::Unchanged, applied.unmatched),
                    Err(e) => (
                        MirrorStatus::Failed {
                            reason: e.to_string(),
                        },
                        Vec::new(),
                    ),
                };
                let outcome = MirrorOutcome {
                    path,
                    status,
                    unmatched,
                };
                self.reporter.applied(&outcome);
                outcome
            })
            .collect();

        self.enter(report, Stage::Done);

        if report.is_complete() {
            if let Err(e) = self.checkpoint.consume().await {
                warn!(error = %e, "checkpoint could not be removed");
                self.reporter.warning(&e.to_string());
            }
        } else if !report.missing_architectures().is_empty() {
            self.reporter.warning(&format!(
                "checkpoint kept at {}; re-run `sync` to hash the missing architectures",
                self.checkpoint.path().display()
            ));
        } else {
            self.reporter.warning(&format!(
                "checkpoint kept at {}; re-run `apply` once the failed mirrors are fixed",
                self.checkpoint.path().display()
            ));
        }
    }
}
