//! Notes command

use anyhow::Result;
use hpsync_core::changelog::{default_body, load_notes};
use hpsync_core::config::ReleaseConfig;
use hpsync_core::version::VersionResolver;

/// Print the changelog section for `tag` (default: the current version's tag).
pub async fn notes(config: &ReleaseConfig, tag: Option<String>) -> Result<()> {
    let version = VersionResolver::from_file(&config.build_config)?.resolve_current()?;
    let tag = tag.unwrap_or_else(|| version.tag());
    let notes = load_notes(&config.changelog, &tag).await?;
    if notes.is_empty() {
        println!("{}", default_body(version));
    } else {
        println!("{notes}");
    }
    Ok(())
}
