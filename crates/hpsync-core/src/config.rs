//! Release configuration (`hpsync.toml`).
//!
//! Constructed once by the caller and passed by reference into every
//! component. Relative paths are resolved against the directory holding the
//! config file, so the tool behaves the same from any working directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use hpsync_schema::Arch;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::io::source::ArtifactSource;
use crate::paths::{resolve_against, scratch_path};

pub const DEFAULT_CONFIG_FILE: &str = "hpsync.toml";
pub const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Raw `hpsync.toml` as written by the user.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    owner: Option<String>,
    repo: Option<String>,
    build_config: Option<PathBuf>,
    checkpoint: Option<PathBuf>,
    token_file: Option<PathBuf>,
    changelog: Option<PathBuf>,
    api_url: Option<String>,
    #[serde(default)]
    mirrors: Vec<PathBuf>,
    #[serde(default)]
    artifacts: BTreeMap<String, ArtifactSpec>,
}

/// One `[artifacts.<arch>]` table. Exactly one field must be set.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ArtifactSpec {
    path: Option<PathBuf>,
    asset: Option<String>,
    url: Option<String>,
}

/// Where an architecture's artifact is taken from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLocation {
    /// Local build output.
    Path(PathBuf),
    /// A named asset of the release for the current tag.
    Asset(String),
    /// A fixed download URL.
    Url(String),
}

impl ArtifactLocation {
    /// The source for this location, if it needs no release lookup.
    pub fn direct_source(&self) -> Option<ArtifactSource> {
        match self {
            Self::Path(p) => Some(ArtifactSource::LocalFile(p.clone())),
            Self::Url(u) => Some(ArtifactSource::RemoteAsset(u.clone())),
            Self::Asset(_) => None,
        }
    }

    /// Whether this location must be looked up in the release.
    pub fn needs_release(&self) -> bool {
        matches!(self, Self::Asset(_))
    }
}

/// Process-level overrides, read once at startup.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub token_file: Option<PathBuf>,
    pub api_url: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            token_file: std::env::var_os("HPSYNC_TOKEN_FILE").map(PathBuf::from),
            api_url: std::env::var("HPSYNC_API_URL").ok(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReleaseConfig {
    /// Directory relative paths were resolved against.
    pub root: PathBuf,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub build_config: PathBuf,
    pub checkpoint: PathBuf,
    pub token_file: PathBuf,
    pub changelog: PathBuf,
    pub api_url: String,
    pub scratch_dir: PathBuf,
    pub mirrors: Vec<PathBuf>,
    pub artifacts: BTreeMap<Arch, ArtifactLocation>,
}

impl ReleaseConfig {
    /// Configuration with every default and no artifacts or mirrors.
    pub fn defaults(root: impl Into<PathBuf>) -> Self {
        Self::assemble(RawConfig::default(), BTreeMap::new(), root.into())
    }

    /// Load `path`, applying the process environment overrides.
    ///
    /// # Errors
    ///
    /// `NotFound` if the file is missing, `Parse` / `Invalid` for bad content.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        let mut config = Self::parse(&text, &root).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        config.apply_overrides(EnvOverrides::from_env());
        debug!(path = %path.display(), archs = config.artifacts.len(), mirrors = config.mirrors.len(), "config loaded");
        Ok(config)
    }

    /// Parse config text; relative paths are resolved against `root`.
    ///
    /// # Errors
    ///
    /// `Parse` for invalid TOML, `Invalid` for semantic errors.
    pub fn parse(text: &str, root: &Path) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: root.join(DEFAULT_CONFIG_FILE),
            source,
        })?;
        Self::from_raw(raw, root.to_path_buf())
    }

    fn from_raw(mut raw: RawConfig, root: PathBuf) -> Result<Self, ConfigError> {
        let artifacts = parse_artifacts(std::mem::take(&mut raw.artifacts), &root)?;
        Ok(Self::assemble(raw, artifacts, root))
    }

    fn assemble(raw: RawConfig, artifacts: BTreeMap<Arch, ArtifactLocation>, root: PathBuf) -> Self {
        let path_or = |p: Option<PathBuf>, default: &str| {
            resolve_against(&root, &p.unwrap_or_else(|| PathBuf::from(default)))
        };

        Self {
            owner: raw.owner,
            repo: raw.repo,
            build_config: path_or(raw.build_config, "Cargo.toml"),
            checkpoint: path_or(raw.checkpoint, "target/hpsync/checkpoint.json"),
            token_file: path_or(raw.token_file, ".github_token"),
            changelog: path_or(raw.changelog, "CHANGELOG.md"),
            api_url: raw.api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            scratch_dir: scratch_path(),
            mirrors: raw
                .mirrors
                .iter()
                .map(|m| resolve_against(&root, m))
                .collect(),
            artifacts,
            root,
        }
    }

    pub fn apply_overrides(&mut self, overrides: EnvOverrides) {
        if let Some(token_file) = overrides.token_file {
            self.token_file = resolve_against(&self.root, &token_file);
        }
        if let Some(api_url) = overrides.api_url {
            self.api_url = api_url;
        }
    }

    /// `owner/repo`, required for anything that talks to the release API.
    ///
    /// # Errors
    ///
    /// `Invalid` if either is unset.
    pub fn repository(&self) -> Result<(&str, &str), ConfigError> {
        match (self.owner.as_deref(), self.repo.as_deref()) {
            (Some(owner), Some(repo)) => Ok((owner, repo)),
            _ => Err(ConfigError::Invalid(
                "`owner` and `repo` are required for release operations".into(),
            )),
        }
    }
}

fn parse_artifacts(
    specs: BTreeMap<String, ArtifactSpec>,
    root: &Path,
) -> Result<BTreeMap<Arch, ArtifactLocation>, ConfigError> {
    let mut artifacts = BTreeMap::new();
    for (key, spec) in specs {
        let arch: Arch = key
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("artifacts.{key}: {e}")))?;
        let location = match (spec.path, spec.asset, spec.url) {
            (Some(p), None, None) => ArtifactLocation::Path(resolve_against(root, &p)),
            (None, Some(a), None) => ArtifactLocation::Asset(a),
            (None, None, Some(u)) => ArtifactLocation::Url(u),
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "artifacts.{key} must set exactly one of `path`, `asset`, `url`"
                )));
            }
        };
        if artifacts.insert(arch, location).is_some() {
            return Err(ConfigError::Invalid(format!(
                "architecture {arch} is configured twice"
            )));
        }
    }
    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
owner = "Super1Windcloud"
repo = "hp"
checkpoint = "state/checkpoint.json"
mirrors = ["bucket/hp.json", "./bucket/hp.json", "/srv/scoop/hp.json"]

[artifacts.x64]
path = "target/release/hp.exe"

[artifacts.arm64]
asset = "hp-arm64.exe"

[artifacts.32bit]
url = "https://example.com/hp-x86.exe"
"#;

    #[test]
    fn parses_and_resolves_paths() {
        let root = Path::new("/work/hp");
        let config = ReleaseConfig::parse(SAMPLE, root).unwrap();

        assert_eq!(config.repository().unwrap(), ("Super1Windcloud", "hp"));
        assert_eq!(config.build_config, root.join("Cargo.toml"));
        assert_eq!(config.checkpoint, root.join("state/checkpoint.json"));
        assert_eq!(config.token_file, root.join(".github_token"));
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.mirrors.len(), 3);
        assert_eq!(config.mirrors[2], PathBuf::from("/srv/scoop/hp.json"));

        assert_eq!(
            config.artifacts[&Arch::X64],
            ArtifactLocation::Path(root.join("target/release/hp.exe"))
        );
        assert_eq!(
            config.artifacts[&Arch::Arm64],
            ArtifactLocation::Asset("hp-arm64.exe".into())
        );
        assert!(matches!(config.artifacts[&Arch::X86], ArtifactLocation::Url(_)));
        assert!(config.artifacts[&Arch::Arm64].needs_release());
        assert!(!config.artifacts[&Arch::X64].needs_release());
    }

    #[test]
    fn artifact_needs_exactly_one_location() {
        let text = "[artifacts.x64]\npath = \"a.exe\"\nurl = \"https://e.com/a.exe\"\n";
        let err = ReleaseConfig::parse(text, Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let text = "[artifacts.x64]\n";
        assert!(ReleaseConfig::parse(text, Path::new(".")).is_err());
    }

    #[test]
    fn duplicate_arch_aliases_are_rejected() {
        let text = "[artifacts.x64]\npath = \"a.exe\"\n[artifacts.64bit]\npath = \"b.exe\"\n";
        assert!(matches!(
            ReleaseConfig::parse(text, Path::new(".")),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ReleaseConfig::parse("owner = \"a\"\nmirors = []\n", Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn overrides_take_precedence() {
        let mut config = ReleaseConfig::defaults("/work");
        config.apply_overrides(EnvOverrides {
            token_file: Some("secrets/token".into()),
            api_url: Some("http://127.0.0.1:9".into()),
        });
        assert_eq!(config.token_file, PathBuf::from("/work/secrets/token"));
        assert_eq!(config.api_url, "http://127.0.0.1:9");
    }

    #[test]
    fn repository_is_required_for_release_operations() {
        assert!(ReleaseConfig::defaults(".").repository().is_err());
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = ReleaseConfig::load(&dir.path().join("hpsync.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }
}
