//! Content digests of release artifacts.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Rejected digest text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DigestError {
    /// Wrong number of hex characters.
    #[error("Invalid SHA256 digest: expected 64 hex characters, got {len} in '{input}'")]
    Length {
        /// Hex characters found.
        len: usize,
        /// The rejected input.
        input: String,
    },
    /// Something other than `[0-9a-fA-F]`.
    #[error("Invalid SHA256 digest: contains non-hex characters in '{0}'")]
    NonHex(String),
}

/// A validated SHA-256 digest of one artifact (64 lowercase hex characters).
///
/// Digests are validated at construction and at deserialization time, so an
/// `ArtifactDigest` read back from a checkpoint can be written into a
/// manifest without re-checking it. Upper-case input is normalised to lower
/// case because Scoop compares hashes case-insensitively but the bucket
/// convention is lower case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ArtifactDigest(String);

impl ArtifactDigest {
    /// Create a new `ArtifactDigest`, validating the input.
    ///
    /// Accepts strings with or without a `sha256:` prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the hex portion is not exactly 64 ASCII hex characters.
    pub fn new(s: impl Into<String>) -> Result<Self, DigestError> {
        let s = s.into();
        let hex = s.strip_prefix("sha256:").unwrap_or(&s);

        if hex.len() != 64 {
            return Err(DigestError::Length {
                len: hex.len(),
                input: s.clone(),
            });
        }

        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DigestError::NonHex(s.clone()));
        }

        Ok(Self(hex.to_lowercase()))
    }

    /// Build a digest from the raw 32-byte output of a SHA-256 hasher.
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Self {
        Self(hex::encode(bytes))
    }

    /// Get the digest as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ArtifactDigest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for ArtifactDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ArtifactDigest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for ArtifactDigest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn accepts_prefixed_and_uppercase() {
        let d = ArtifactDigest::new(format!("sha256:{}", EMPTY.to_uppercase())).unwrap();
        assert_eq!(d.as_str(), EMPTY);
    }

    #[test]
    fn rejects_short_and_non_hex() {
        assert!(matches!(
            ArtifactDigest::new("abcd"),
            Err(DigestError::Length { len: 4, .. })
        ));
        let bad = "z".repeat(64);
        assert!(matches!(ArtifactDigest::new(bad), Err(DigestError::NonHex(_))));
    }

    #[test]
    fn deserialize_validates() {
        let ok: Result<ArtifactDigest, _> = serde_json::from_str(&format!("\"{EMPTY}\""));
        assert!(ok.is_ok());
        let bad: Result<ArtifactDigest, _> = serde_json::from_str("\"PLACEHOLDER\"");
        assert!(bad.is_err());
    }

    #[test]
    fn from_bytes_is_lower_hex() {
        let d = ArtifactDigest::from_bytes([0xABu8; 32]);
        assert_eq!(d.as_str(), "ab".repeat(32));
    }
}
