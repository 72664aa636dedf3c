//! Digest command

use anyhow::{Context, Result};
use hpsync_core::hashing::digest_file;
use std::path::PathBuf;

/// Compute SHA256 of files, one `<hash> <path>` line each.
pub fn digest(files: &[PathBuf]) -> Result<()> {
    for file in files {
        let hash = digest_file(file).with_context(|| format!("failed to hash {}", file.display()))?;
        println!("{hash} {}", file.display());
    }
    Ok(())
}
