//! Scoop manifest documents.
//!
//! hpsync owns exactly four things in a manifest: `version`, `url`, `hash`
//! and the `url`/`hash` pair of every `architecture.<key>` entry. Everything
//! else (`description`, `bin`, `checkver`, per-architecture `extract_dir`, ...)
//! is carried through untouched and in its original key order, so a sync
//! produces a minimal diff against the bucket.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::arch::Arch;
use crate::version::{Version, VersionParseError};

/// A manifest that does not satisfy the schema contract.
#[derive(Debug, Error)]
pub enum ManifestFormatError {
    /// Not JSON at all.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON, but the top level (or an architecture entry) is not an object.
    #[error("`{0}` must be a JSON object")]
    NotAnObject(String),

    /// A required field is absent.
    #[error("missing required field `{0}`")]
    MissingField(String),

    /// A required field has the wrong JSON type.
    #[error("field `{field}` must be a {expected}")]
    WrongType {
        /// Dotted path of the field.
        field: String,
        /// Expected JSON type.
        expected: &'static str,
    },

    /// `version` is present but not a `major.minor.patch` triple.
    #[error(transparent)]
    Version(#[from] VersionParseError),
}

/// The `url`/`hash` pair of one `architecture.<key>` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchEntry {
    /// Download URL; contains the release version as a substring.
    pub url: String,
    /// Hash as stored in the document.
    ///
    /// Not validated on read (buckets sometimes hold placeholders); every
    /// hash hpsync writes comes from an [`ArtifactDigest`](crate::ArtifactDigest).
    pub hash: String,
}

/// One manifest document, as read from a single mirror.
///
/// The typed fields are the source of truth for the values hpsync manages;
/// [`ManifestDocument::to_json_pretty`] folds them back into the original
/// document.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestDocument {
    /// Package version.
    pub version: Version,
    /// Default download URL (mirrors the default architecture).
    pub url: String,
    /// Default hash (mirrors the default architecture).
    pub hash: String,
    /// Per-architecture entries under the canonical keys of [`Arch`].
    pub architecture: BTreeMap<Arch, ArchEntry>,
    raw: Map<String, Value>,
}

impl ManifestDocument {
    /// Parse and validate a manifest.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestFormatError`] if the text is not JSON or any of
    /// `version`, `url`, `hash`, `architecture` is missing or mistyped.
    pub fn from_json(text: &str) -> Result<Self, ManifestFormatError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Validate an already-parsed JSON value.
    ///
    /// # Errors
    ///
    /// See [`ManifestDocument::from_json`].
    pub fn from_value(value: Value) -> Result<Self, ManifestFormatError> {
        let Value::Object(raw) = value else {
            return Err(ManifestFormatError::NotAnObject("<root>".to_string()));
        };

        let version = Version::parse(required_str(&raw, "version", "version")?)?;
        let url = required_str(&raw, "url", "url")?.to_string();
        let hash = required_str(&raw, "hash", "hash")?.to_string();

        let arch_table = match raw.get("architecture") {
            None => return Err(ManifestFormatError::MissingField("architecture".into())),
            Some(Value::Object(table)) => table,
            Some(_) => return Err(ManifestFormatError::NotAnObject("architecture".into())),
        };

        let mut architecture = BTreeMap::new();
        for (key, entry) in arch_table {
            // Keys we do not model, aliases included, are carried through verbatim.
            let Some(arch) = Arch::from_manifest_key(key) else {
                continue;
            };
            let path = format!("architecture.{key}");
            let Value::Object(entry) = entry else {
                return Err(ManifestFormatError::NotAnObject(path));
            };
            architecture.insert(
                arch,
                ArchEntry {
                    url: required_str(entry, "url", &format!("{path}.url"))?.to_string(),
                    hash: required_str(entry, "hash", &format!("{path}.hash"))?.to_string(),
                },
            );
        }

        Ok(Self {
            version,
            url,
            hash,
            architecture,
            raw,
        })
    }

    /// The full document with the managed fields folded back in.
    pub fn to_value(&self) -> Value {
        let mut raw = self.raw.clone();
        raw.insert("version".into(), Value::String(self.version.to_string()));
        raw.insert("url".into(), Value::String(self.url.clone()));
        raw.insert("hash".into(), Value::String(self.hash.clone()));

        let table = raw
            .entry("architecture")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(table) = table {
            for (arch, entry) in &self.architecture {
                let slot = table
                    .entry(arch.as_str())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(slot) = slot {
                    slot.insert("url".into(), Value::String(entry.url.clone()));
                    slot.insert("hash".into(), Value::String(entry.hash.clone()));
                }
            }
        }
        Value::Object(raw)
    }

    /// Serialise with 4-space indentation and a trailing newline, the
    /// formatting used by Scoop buckets.
    ///
    /// # Errors
    ///
    /// [`ManifestFormatError::Json`] if serialisation fails.
    pub fn to_json_pretty(&self) -> Result<String, ManifestFormatError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.to_value().serialize(&mut ser)?;
        let mut text = String::from_utf8_lossy(&buf).into_owned();
        text.push('\n');
        Ok(text)
    }

    /// The architecture whose entry the top-level `url`/`hash` mirror.
    pub fn default_arch(&self) -> Option<Arch> {
        Arch::default_of(self.architecture.keys().copied())
    }
}

fn required_str<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a str, ManifestFormatError> {
    match obj.get(key) {
        None => Err(ManifestFormatError::MissingField(path.to_string())),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ManifestFormatError::WrongType {
            field: path.to_string(),
            expected: "string",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
    "version": "3.3.4",
    "description": "hp, a faster scoop",
    "url": "https://github.com/o/hp/releases/download/3.3.4/hp.exe",
    "hash": "aaaa",
    "bin": "hp.exe",
    "architecture": {
        "64bit": {
            "url": "https://github.com/o/hp/releases/download/3.3.4/hp.exe",
            "hash": "aaaa",
            "bin": "hp.exe"
        },
        "arm64": {
            "url": "https://github.com/o/hp/releases/download/3.3.4/hp-arm64.exe",
            "hash": "bbbb"
        },
        "riscv": {
            "url": "kept"
        }
    },
    "checkver": "github"
}
"#;

    #[test]
    fn parses_managed_fields() {
        let doc = ManifestDocument::from_json(SAMPLE).unwrap();
        assert_eq!(doc.version, Version::new(3, 3, 4));
        assert_eq!(doc.architecture.len(), 2);
        assert_eq!(doc.architecture[&Arch::Arm64].hash, "bbbb");
        assert_eq!(doc.default_arch(), Some(Arch::X64));
    }

    #[test]
    fn unchanged_document_serialises_identically() {
        let doc = ManifestDocument::from_json(SAMPLE).unwrap();
        assert_eq!(doc.to_json_pretty().unwrap(), SAMPLE);
    }

    #[test]
    fn edits_keep_key_order_and_unknown_fields() {
        let mut doc = ManifestDocument::from_json(SAMPLE).unwrap();
        doc.version = Version::new(3, 3, 5);
        doc.architecture.get_mut(&Arch::X64).unwrap().hash = "cccc".into();

        let out = doc.to_json_pretty().unwrap();
        let desc = out.find("\"description\"").unwrap();
        let url = out.find("\"url\"").unwrap();
        assert!(desc < url, "original key order must survive");
        assert!(out.contains("\"version\": \"3.3.5\""));
        assert!(out.contains("\"hash\": \"cccc\""));
        assert!(out.contains("\"riscv\""));
        assert!(out.contains("\"checkver\": \"github\""));
    }

    #[test]
    fn alias_keys_are_carried_verbatim() {
        let text = r#"{
    "version": "3.3.4",
    "url": "u",
    "hash": "h",
    "architecture": {
        "x64": {
            "url": "https://e/3.3.4/hp.exe",
            "hash": "h"
        }
    }
}
"#;
        let doc = ManifestDocument::from_json(text).unwrap();
        assert!(doc.architecture.is_empty());

        let out = doc.to_json_pretty().unwrap();
        assert_eq!(out, text);
        assert!(!out.contains("64bit"));
    }

    #[test]
    fn missing_fields_are_rejected() {
        let err = ManifestDocument::from_json(r#"{"version": "1.0.0", "url": "u", "hash": "h"}"#)
            .unwrap_err();
        assert!(matches!(err, ManifestFormatError::MissingField(f) if f == "architecture"));

        let err = ManifestDocument::from_json(
            r#"{"version": "1.0.0", "url": "u", "hash": 5, "architecture": {}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ManifestFormatError::WrongType { .. }));

        let err = ManifestDocument::from_json(
            r#"{"version": "1.0.0", "url": "u", "hash": "h", "architecture": {"64bit": {"url": "u"}}}"#,
        )
        .unwrap_err();
        assert!(
            matches!(err, ManifestFormatError::MissingField(f) if f == "architecture.64bit.hash")
        );
    }

    #[test]
    fn bad_version_is_rejected() {
        let err = ManifestDocument::from_json(
            r#"{"version": "latest", "url": "u", "hash": "h", "architecture": {}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ManifestFormatError::Version(_)));
    }
}
