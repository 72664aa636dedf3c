//! Subcommand implementations.

pub mod digest;
pub mod notes;
pub mod publish;
pub mod sync;
pub mod version;

use std::path::Path;

use anyhow::{Context, Result};
use hpsync_core::config::{ConfigError, DEFAULT_CONFIG_FILE, EnvOverrides, ReleaseConfig};
use tracing::debug;

/// Load the release configuration.
///
/// A missing `hpsync.toml` at the default location is not an error: the
/// defaults apply, rooted at the working directory. An explicitly named file
/// must exist.
pub fn load_config(path: &Path) -> Result<ReleaseConfig> {
    match ReleaseConfig::load(path) {
        Ok(config) => Ok(config),
        Err(ConfigError::NotFound { .. }) if path == Path::new(DEFAULT_CONFIG_FILE) => {
            let cwd = std::env::current_dir().context("failed to read working directory")?;
            debug!(root = %cwd.display(), "no config file, using defaults");
            let mut config = ReleaseConfig::defaults(cwd);
            config.apply_overrides(EnvOverrides::from_env());
            Ok(config)
        }
        Err(e) => Err(e.into()),
    }
}
