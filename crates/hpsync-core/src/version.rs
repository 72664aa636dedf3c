//! Current/previous version resolution from build configuration.
//!
//! The authoritative version is the `[package]` `version` field of the
//! build's `Cargo.toml`. A `[workspace.package]` table usually declares its
//! own `version` first in the file; that one is the workspace default and is
//! skipped unless the package explicitly inherits it
//! (`version.workspace = true`).

use std::path::{Path, PathBuf};

use hpsync_schema::Version;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum VersionError {
    #[error("no [package] version field in {source_name}")]
    ConfigMissing { source_name: String },

    #[error("malformed version '{value}' in {source_name}: expected major.minor.patch")]
    ConfigMalformed { source_name: String, value: String },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Current version plus the heuristic previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct VersionPair {
    pub current: Version,
    pub previous: Version,
}

/// Reads the version declaration out of the textual lines of a `Cargo.toml`.
#[derive(Debug, Clone)]
pub struct VersionResolver {
    source_name: String,
    lines: Vec<String>,
}

/// What a `[package]` version line turned out to be.
enum PackageVersion {
    Literal(String),
    Inherited,
}

impl VersionResolver {
    /// Resolver over in-memory lines; `source_name` is used in errors.
    pub fn from_lines<I, S>(source_name: impl Into<String>, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            source_name: source_name.into(),
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Resolver over a file on disk. A missing file is `ConfigMissing`.
    pub fn from_file(path: &Path) -> Result<Self, VersionError> {
        let source_name = path.display().to_string();
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Self::from_lines(source_name, text.lines())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(VersionError::ConfigMissing { source_name })
            }
            Err(source) => Err(VersionError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// The package version declared in the build configuration.
    pub fn resolve_current(&self) -> Result<Version, VersionError> {
        let mut section = String::new();
        let mut package: Option<PackageVersion> = None;
        let mut workspace: Option<String> = None;

        for line in &self.lines {
            let line = strip_comment(line).trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('[') {
                section = line.trim_matches(|c| c == '[' || c == ']').trim().to_string();
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim().replace(' ', "");
            let value = value.trim();

            // Fully-qualified dotted keys at the top level behave like the table form.
            let (table, key) = match (section.as_str(), key.as_str()) {
                ("", k) if k.starts_with("package.") => ("package", &k["package.".len()..]),
                ("", k) if k.starts_with("workspace.package.") => {
                    ("workspace.package", &k["workspace.package.".len()..])
                }
                (s, k) => (s, k),
            };

            match (table, key) {
                ("package", "version") if package.is_none() => {
                    package = Some(if value.starts_with('{') {
                        if value.replace(' ', "").contains("workspace=true") {
                            PackageVersion::Inherited
                        } else {
                            PackageVersion::Literal(value.to_string())
                        }
                    } else {
                        PackageVersion::Literal(unquote(value).to_string())
                    });
                }
                ("package", "version.workspace") if package.is_none() => {
                    package = Some(PackageVersion::Inherited);
                }
                ("workspace.package", "version") if workspace.is_none() => {
                    debug!("skipping workspace default version {value}");
                    workspace = Some(unquote(value).to_string());
                }
                _ => {}
            }
        }

        let raw = match package {
            Some(PackageVersion::Literal(v)) => v,
            Some(PackageVersion::Inherited) => {
                workspace.ok_or_else(|| VersionError::ConfigMissing {
                    source_name: self.source_name.clone(),
                })?
            }
            None => {
                return Err(VersionError::ConfigMissing {
                    source_name: self.source_name.clone(),
                });
            }
        };

        Version::parse(&raw).map_err(|_| VersionError::ConfigMalformed {
            source_name: self.source_name.clone(),
            value: raw,
        })
    }

    /// The release immediately before `v` under the 0-9 cycling assumption.
    pub fn derive_previous(v: Version) -> Version {
        v.previous()
    }

    /// Resolve current and previous in one step.
    pub fn resolve(&self) -> Result<VersionPair, VersionError> {
        let current = self.resolve_current()?;
        Ok(VersionPair {
            current,
            previous: Self::derive_previous(current),
        })
    }
}

fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' | '\'' => in_string = !in_string,
            '#' if !in_string => return &line[..i],
            _ => {}
        }
    }
    line
}

fn unquote(value: &str) -> &str {
    value.trim().trim_matches(|c| c == '"' || c == '\'')
}
