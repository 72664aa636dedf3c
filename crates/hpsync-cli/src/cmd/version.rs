//! Version command

use anyhow::Result;
use hpsync_core::config::ReleaseConfig;
use hpsync_core::version::VersionResolver;

/// Print the current version and the previous one derived from it.
pub fn version(config: &ReleaseConfig, json: bool) -> Result<()> {
    let pair = VersionResolver::from_file(&config.build_config)?.resolve()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&pair)?);
    } else {
        println!("current:  {}", pair.current);
        println!("previous: {}", pair.previous);
    }
    Ok(())
}
