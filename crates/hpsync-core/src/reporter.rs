//! Reporter trait for dependency injection
//!
//! This trait allows the pipeline to report progress and per-target outcomes
//! without being coupled to a terminal. The CLI renders these events; tests
//! use [`NullReporter`].

use hpsync_schema::Arch;

use crate::io::source::ArtifactSource;
use crate::sync::report::{ArchOutcome, MirrorOutcome, Stage};

pub trait Reporter: Send + Sync {
    /// The orchestrator entered a new stage.
    fn stage(&self, stage: Stage);

    /// Hashing of one architecture started.
    fn hashing(&self, arch: Arch, source: &ArtifactSource);

    /// Download progress for one architecture's remote asset.
    fn downloading(&self, arch: Arch, current: u64, total: Option<u64>);

    /// One architecture finished hashing (successfully or not).
    fn hashed(&self, arch: Arch, outcome: &ArchOutcome);

    /// One mirror finished applying (successfully or not).
    fn applied(&self, outcome: &MirrorOutcome);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn stage(&self, stage: Stage) {
        (**self).stage(stage);
    }
    fn hashing(&self, arch: Arch, source: &ArtifactSource) {
        (**self).hashing(arch, source);
    }
    fn downloading(&self, arch: Arch, current: u64, total: Option<u64>) {
        (**self).downloading(arch, current, total);
    }
    fn hashed(&self, arch: Arch, outcome: &ArchOutcome) {
        (**self).hashed(arch, outcome);
    }
    fn applied(&self, outcome: &MirrorOutcome) {
        (**self).applied(outcome);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
}

/// A no-op reporter for silent operations (e.g., testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn stage(&self, _: Stage) {}
    fn hashing(&self, _: Arch, _: &ArtifactSource) {}
    fn downloading(&self, _: Arch, _: u64, _: Option<u64>) {}
    fn hashed(&self, _: Arch, _: &ArchOutcome) {}
    fn applied(&self, _: &MirrorOutcome) {}
    fn info(&self, _: &str) {}
    fn warning(&self, _: &str) {}
}
