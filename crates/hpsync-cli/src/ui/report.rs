//! Final report rendering, as text or JSON.

use std::fmt::Write as _;

use anyhow::Result;
use crossterm::style::Stylize;
use hpsync_core::Arch;
use hpsync_core::sync::{ArchOutcome, MirrorStatus, Stage, SyncReport};

use super::theme::Theme;

/// Plain-text summary naming every architecture and mirror.
pub fn render_report(report: &SyncReport) -> String {
    let mut out = String::new();
    match (report.previous, report.version) {
        (Some(previous), Some(current)) => {
            let _ = writeln!(out, "hp {previous} -> {current}");
        }
        _ => out.push_str("hp (version unresolved)\n"),
    }
    let _ = writeln!(out, "stage: {}", report.stage);

    if !report.architectures.is_empty() {
        out.push_str("architectures:\n");
        for (arch, outcome) in &report.architectures {
            let line = match outcome {
                ArchOutcome::Ok { digest } => format!("ok {digest}"),
                ArchOutcome::Failed { reason } => format!("failed {reason}"),
                ArchOutcome::Skipped => "skipped".to_string(),
            };
            let _ = writeln!(out, "  {:<6} {line}", arch.label());
        }
    }

    if !report.mirrors.is_empty() {
        out.push_str("mirrors:\n");
        for mirror in &report.mirrors {
            let mut line = match &mirror.status {
                MirrorStatus::Updated => "updated".to_string(),
                MirrorStatus::Unchanged => "unchanged".to_string(),
                MirrorStatus::Failed { reason } => format!("failed {reason}"),
                MirrorStatus::Skipped => "skipped".to_string(),
            };
            if !mirror.unmatched.is_empty() {
                let _ = write!(line, " (no entry for {})", labels(&mirror.unmatched));
            }
            let _ = writeln!(out, "  {} {line}", mirror.path.display());
        }
    }
    out
}

fn labels(archs: &[Arch]) -> String {
    archs.iter().map(Arch::label).collect::<Vec<_>>().join(", ")
}

/// Print `report` to stdout, plus a one-line verdict on stderr.
pub fn print_report(report: &SyncReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    print!("{}", render_report(report));

    let theme = Theme::default();
    let failed_archs = report.missing_architectures();
    let failed_mirrors = report.failed_mirrors();
    if report.stage == Stage::Aborted {
        return Ok(());
    }
    if failed_archs.is_empty() && failed_mirrors.is_empty() {
        eprintln!("{}", "All targets ok".with(theme.colors.success));
    } else {
        let mirrors: Vec<String> = failed_mirrors
            .iter()
            .map(|m| m.path.display().to_string())
            .collect();
        eprintln!(
            "{} failed architectures: [{}]; failed mirrors: [{}]",
            theme.icons.warning.with(theme.colors.warning),
            labels(&failed_archs),
            mirrors.join(", ")
        );
    }
    Ok(())
}
