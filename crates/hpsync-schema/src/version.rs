//! Release versions.
//!
//! A release version is a plain `major.minor.patch` triple. Pre-release and
//! build suffixes are rejected; the version text is substituted inside
//! download URLs.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Version text that is not three dot-separated non-negative integers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid version '{input}': expected major.minor.patch")]
pub struct VersionParseError {
    /// The rejected input.
    pub input: String,
}

/// A `major.minor.patch` release version.
///
/// Ordering is lexicographic on the triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    /// Major component.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Patch component.
    pub patch: u64,
}

impl Version {
    /// Create a version from its components.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse `1.2.3` or the tag form `v1.2.3`.
    ///
    /// # Errors
    ///
    /// Returns [`VersionParseError`] unless the input is exactly three
    /// dot-separated non-negative integers.
    pub fn parse(s: &str) -> Result<Self, VersionParseError> {
        let err = || VersionParseError {
            input: s.to_string(),
        };
        let trimmed = s.trim();
        let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);

        let mut parts = bare.split('.');
        let mut next = || -> Result<u64, VersionParseError> {
            let part = parts.next().ok_or_else(err)?;
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(err());
            }
            part.parse().map_err(|_| err())
        };
        let version = Self::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(err());
        }
        Ok(version)
    }

    /// The version released immediately before this one, assuming every
    /// component cycles through `0..=9`.
    ///
    /// `2.3.5 -> 2.3.4`, `2.3.0 -> 2.2.9`, `1.0.0 -> 0.9.9`. This is a
    /// heuristic used only to find the old version text inside URLs; a
    /// release history that skipped numbers produces a value that simply
    /// never matches. `0.0.0` has no predecessor and maps to itself.
    pub fn previous(&self) -> Self {
        if self.patch > 0 {
            Self::new(self.major, self.minor, self.patch - 1)
        } else if self.minor > 0 {
            Self::new(self.major, self.minor - 1, 9)
        } else if self.major > 0 {
            Self::new(self.major - 1, 9, 9)
        } else {
            *self
        }
    }

    /// Release tag for this version (`v1.2.3`).
    pub fn tag(&self) -> String {
        format!("v{self}")
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl std::str::FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
