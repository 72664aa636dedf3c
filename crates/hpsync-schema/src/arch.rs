//! Architecture keys.

/// Target architecture of one release artifact.
///
/// Each release ships at most one artifact per architecture, and every
/// manifest carries one `architecture.<key>` entry per variant. The serde
/// form is the key Scoop uses inside manifests (`64bit`, `32bit`, `arm64`);
/// the short names used on the command line and in `hpsync.toml` are
/// accepted as aliases.
///
/// # Example
///
/// ```
/// use hpsync_schema::Arch;
///
/// let arch: Arch = "x64".parse().unwrap();
/// assert_eq!(arch.as_str(), "64bit");
/// assert_eq!(arch.label(), "x64");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum Arch {
    /// 64-bit Intel/AMD (`64bit` in manifests)
    #[serde(rename = "64bit", alias = "x64", alias = "amd64", alias = "x86_64")]
    X64,
    /// ARM64 (`arm64` in manifests)
    #[serde(rename = "arm64", alias = "aarch64")]
    Arm64,
    /// 32-bit Intel (`32bit` in manifests)
    #[serde(rename = "32bit", alias = "x86", alias = "i686", alias = "ia32")]
    X86,
}

impl Arch {
    /// Every supported architecture, in default-selection priority order.
    ///
    /// The first entry present in a manifest is the one mirrored into the
    /// top-level `url`/`hash` fields.
    pub const PRIORITY: [Arch; 3] = [Arch::X64, Arch::Arm64, Arch::X86];

    /// Manifest key (`64bit`, `arm64`, `32bit`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X64 => "64bit",
            Self::Arm64 => "arm64",
            Self::X86 => "32bit",
        }
    }

    /// The architecture whose manifest key is exactly `key`. Aliases such as
    /// `x64` are not manifest keys.
    pub fn from_manifest_key(key: &str) -> Option<Self> {
        Self::PRIORITY.into_iter().find(|a| a.as_str() == key)
    }

    /// Short human name (`x64`, `arm64`, `x86`).
    pub fn label(&self) -> &'static str {
        match self {
            Self::X64 => "x64",
            Self::Arm64 => "arm64",
            Self::X86 => "x86",
        }
    }

    /// Pick the default architecture out of `present`, by [`Arch::PRIORITY`].
    pub fn default_of<I>(present: I) -> Option<Arch>
    where
        I: IntoIterator<Item = Arch>,
    {
        let present: Vec<Arch> = present.into_iter().collect();
        Self::PRIORITY.into_iter().find(|a| present.contains(a))
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl std::str::FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "x64" | "64bit" | "amd64" | "x86_64" => Ok(Self::X64),
            "arm64" | "aarch64" => Ok(Self::Arm64),
            "x86" | "32bit" | "i686" | "ia32" => Ok(Self::X86),
            _ => Err(format!("Unknown architecture: {s}")),
        }
    }
}
