//! Console implementation of the pipeline's progress seam.
//!
//! Progress goes to stderr so stdout stays clean for the final report.

use crossterm::style::Stylize;
use hpsync_core::io::source::ArtifactSource;
use hpsync_core::sync::{ArchOutcome, MirrorOutcome, MirrorStatus, Stage};
use hpsync_core::{Arch, Reporter};

use super::theme::{Theme, format_size};

#[derive(Debug, Clone, Default)]
pub struct ConsoleReporter {
    theme: Theme,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn arch(&self, arch: Arch) -> String {
        format!("{:<width$}", arch.label(), width = self.theme.arch_width)
    }
}

impl Reporter for ConsoleReporter {
    fn stage(&self, stage: Stage) {
        let title = match stage {
            Stage::Hashing => "Hashing artifacts",
            Stage::Applying => "Applying to mirrors",
            Stage::Aborted => {
                eprintln!("{}", "Aborted".with(self.theme.colors.error).bold());
                return;
            }
            Stage::ResolvingVersion | Stage::Checkpointed | Stage::Done => return,
        };
        eprintln!();
        eprintln!("{}", title.with(self.theme.colors.header).bold());
    }

    fn hashing(&self, arch: Arch, source: &ArtifactSource) {
        eprintln!(
            "  {} {} {}",
            self.theme.icons.active.with(self.theme.colors.active),
            self.arch(arch),
            source.describe().with(self.theme.colors.secondary)
        );
    }

    fn downloading(&self, arch: Arch, current: u64, total: Option<u64>) {
        if total == Some(current) {
            eprintln!(
                "    {} downloaded {}",
                arch.label().with(self.theme.colors.secondary),
                format_size(current)
            );
        }
    }

    fn hashed(&self, arch: Arch, outcome: &ArchOutcome) {
        let icons = &self.theme.icons;
        let colors = &self.theme.colors;
        match outcome {
            ArchOutcome::Ok { digest } => eprintln!(
                "  {} {} {}",
                icons.success.with(colors.success),
                self.arch(arch),
                digest.as_str().with(colors.secondary)
            ),
            ArchOutcome::Failed { reason } => eprintln!(
                "  {} {} {}",
                icons.error.with(colors.error),
                self.arch(arch),
                reason.as_str().with(colors.error)
            ),
            ArchOutcome::Skipped => eprintln!(
                "  {} {} skipped",
                icons.pending.with(colors.secondary),
                self.arch(arch)
            ),
        }
    }

    fn applied(&self, outcome: &MirrorOutcome) {
        let icons = &self.theme.icons;
        let colors = &self.theme.colors;
        let path = outcome.path.display().to_string();
        match &outcome.status {
            MirrorStatus::Updated => {
                eprintln!("  {} {path}", icons.success.with(colors.success));
            }
            MirrorStatus::Unchanged => eprintln!(
                "  {} {path} {}",
                icons.success.with(colors.success),
                "(unchanged)".with(colors.secondary)
            ),
            MirrorStatus::Failed { reason } => eprintln!(
                "  {} {path} {}",
                icons.error.with(colors.error),
                reason.as_str().with(colors.error)
            ),
            MirrorStatus::Skipped => {
                eprintln!("  {} {path} skipped", icons.pending.with(colors.secondary));
            }
        }
        for arch in &outcome.unmatched {
            eprintln!(
                "    {} no `{}` entry; {} digest not written",
                icons.warning.with(colors.warning),
                arch.as_str(),
                arch.label()
            );
        }
    }

    fn info(&self, msg: &str) {
        eprintln!("{msg}");
    }

    fn warning(&self, msg: &str) {
        eprintln!(
            "{} {}",
            self.theme.icons.warning.with(self.theme.colors.warning),
            msg.with(self.theme.colors.warning)
        );
    }
}
