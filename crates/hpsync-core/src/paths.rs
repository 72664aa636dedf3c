use std::path::PathBuf;

/// Returns the hpsync working directory, or None if no cache directory can be resolved.
pub fn try_hpsync_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("HPSYNC_HOME") {
        return Some(PathBuf::from(val));
    }
    dirs::cache_dir().map(|c| c.join("hpsync"))
}

/// Returns the hpsync working directory, falling back to the system temp dir.
pub fn hpsync_home() -> PathBuf {
    try_hpsync_home().unwrap_or_else(|| std::env::temp_dir().join("hpsync"))
}

/// Scratch path for in-flight downloads: <home>/scratch
pub fn scratch_path() -> PathBuf {
    hpsync_home().join("scratch")
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve_against(base: &std::path::Path, path: &std::path::Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
