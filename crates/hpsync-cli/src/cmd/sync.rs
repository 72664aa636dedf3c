//! Sync, hash and apply commands

use std::sync::Arc;

use anyhow::{Result, bail};
use crossterm::style::Stylize;
use hpsync_core::config::ReleaseConfig;
use hpsync_core::sync::{RunMode, SyncError, SyncOrchestrator, SyncReport};
use hpsync_core::{NullReporter, Reporter};

use crate::ui::{ConsoleReporter, Theme, print_report};

/// Run the whole pipeline and return the process exit code.
pub async fn sync(config: ReleaseConfig, mode: RunMode, json: bool) -> Result<i32> {
    ensure_artifacts(&config)?;
    let orchestrator = orchestrator(config, json);
    finish(orchestrator.run(mode).await, json)
}

/// Hash and checkpoint only.
pub async fn hash(config: ReleaseConfig, json: bool) -> Result<i32> {
    ensure_artifacts(&config)?;
    let orchestrator = orchestrator(config, json);
    let result = orchestrator.hash_only().await;
    if result.is_ok() && !json {
        eprintln!(
            "Checkpoint written to {}",
            orchestrator.checkpoint().path().display()
        );
    }
    finish(result, json)
}

/// Apply the saved checkpoint to every mirror.
pub async fn apply(config: ReleaseConfig, json: bool) -> Result<i32> {
    let orchestrator = orchestrator(config, json);
    finish(orchestrator.run(RunMode::Resume).await, json)
}

fn ensure_artifacts(config: &ReleaseConfig) -> Result<()> {
    if config.artifacts.is_empty() {
        bail!("no [artifacts] configured; nothing to hash");
    }
    Ok(())
}

fn orchestrator(config: ReleaseConfig, json: bool) -> SyncOrchestrator {
    let reporter: Arc<dyn Reporter> = if json {
        Arc::new(NullReporter)
    } else {
        Arc::new(ConsoleReporter::new())
    };
    SyncOrchestrator::new(config, reporter)
}

fn finish(result: Result<SyncReport, SyncError>, json: bool) -> Result<i32> {
    match result {
        Ok(report) => {
            print_report(&report, json)?;
            Ok(report.exit_code())
        }
        Err(err) => {
            print_report(&err.report, json)?;
            let theme = Theme::default();
            eprintln!(
                "{} {}",
                theme.icons.error.with(theme.colors.error),
                format!("aborted while {}: {}", err.stage, err.cause).with(theme.colors.error)
            );
            Ok(err.report.exit_code())
        }
    }
}
