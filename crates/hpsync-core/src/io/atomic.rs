//! Atomic whole-file replacement.
//!
//! Writes go to a uniquely named temporary file in the target's directory,
//! are fsynced, and are then renamed over the target. Readers observe either
//! the old document or the new one, never a torn write.

use std::io::Write;
use std::path::{Path, PathBuf};

/// Replace `path` with `contents` atomically.
///
/// Creates the parent directory if needed. Runs on the blocking pool.
///
/// # Errors
///
/// Returns the underlying I/O error; the temporary file is removed on every
/// failure path.
pub async fn write_atomic(path: &Path, contents: Vec<u8>) -> std::io::Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic_blocking(&path, &contents))
        .await
        .map_err(std::io::Error::other)?
}

/// Blocking variant of [`write_atomic`].
///
/// # Errors
///
/// See [`write_atomic`].
pub fn write_atomic_blocking(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = parent_dir(path);
    std::fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".hpsync-")
        .suffix(".tmp")
        .tempfile_in(&dir)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
