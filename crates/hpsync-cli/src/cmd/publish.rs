//! Publish command

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use hpsync_core::config::ReleaseConfig;
use hpsync_core::credentials::read_token;
use hpsync_core::forges::GithubClient;
use hpsync_core::release::{PublishRequest, publish as publish_release, release_body};
use hpsync_core::version::VersionResolver;

use crate::PublishArgs;
use crate::ui::{ConsoleReporter, Theme};

/// Create (or reuse) the GitHub release for the current version and upload
/// the attachments.
pub async fn publish(config: &ReleaseConfig, args: PublishArgs, json: bool) -> Result<()> {
    let version = VersionResolver::from_file(&config.build_config)?.resolve_current()?;
    let tag = args.tag.unwrap_or_else(|| version.tag());
    let changelog = args.notes_file.unwrap_or_else(|| config.changelog.clone());
    let body = release_body(args.notes, &changelog, &tag, version)
        .await
        .with_context(|| format!("failed to read {}", changelog.display()))?;

    let mut request = PublishRequest::for_version(version, body);
    request.tag = tag;
    if let Some(name) = args.name {
        request.name = name;
    }
    request.draft = args.draft;
    request.prerelease = args.prerelease;
    request.target = args.target;
    request.allow_existing = args.allow_existing;
    request.attach = args.attach;

    if args.dry_run {
        println!("{}", serde_json::to_string_pretty(&request.payload())?);
        for path in &request.attach {
            eprintln!("would upload {}", path.display());
        }
        return Ok(());
    }

    let (owner, repo) = config.repository()?;
    let token = read_token(&config.token_file).await?;
    let api = GithubClient::new(&config.api_url, owner, repo, &token)?;
    let outcome = publish_release(&api, &request, &ConsoleReporter::new()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.release)?);
    } else {
        let theme = Theme::default();
        let verb = if outcome.created { "Created" } else { "Updated" };
        eprintln!(
            "{} {verb} release {} ({} assets uploaded)",
            theme.icons.success.with(theme.colors.success),
            outcome.release.tag_name,
            outcome.uploaded.len()
        );
        println!("{}", outcome.release.html_url);
    }
    Ok(())
}
