//! Bearer token for the release API, read from a local secret file.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("credentials missing: token file {} not found or empty", path.display())]
    CredentialsMissing { path: PathBuf },

    #[error("failed to read token file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An API token. `Debug` never prints the secret.
#[derive(Clone)]
pub struct Token(String);

impl Token {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Token(***)")
    }
}

/// Read and trim the token stored at `path`.
///
/// # Errors
///
/// `CredentialsMissing` when the file is absent or holds only whitespace.
pub async fn read_token(path: &Path) -> Result<Token, CredentialError> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CredentialError::CredentialsMissing {
                path: path.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(CredentialError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let token = text.trim();
    if token.is_empty() {
        return Err(CredentialError::CredentialsMissing {
            path: path.to_path_buf(),
        });
    }
    Ok(Token::new(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_and_trims() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".github_token");
        std::fs::write(&path, "  ghp_secret\n").unwrap();
        assert_eq!(read_token(&path).await.unwrap().as_str(), "ghp_secret");
    }

    #[tokio::test]
    async fn missing_or_blank_is_credentials_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".github_token");
        assert!(matches!(
            read_token(&path).await,
            Err(CredentialError::CredentialsMissing { .. })
        ));

        std::fs::write(&path, "\n  \n").unwrap();
        assert!(matches!(
            read_token(&path).await,
            Err(CredentialError::CredentialsMissing { .. })
        ));
    }

    #[test]
    fn debug_hides_secret() {
        assert_eq!(format!("{:?}", Token::new("ghp_secret")), "Token(***)");
    }
}
