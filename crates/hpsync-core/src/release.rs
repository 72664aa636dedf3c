//! Publishing a release: create it (or reuse it) and attach assets.

use std::path::{Path, PathBuf};

use hpsync_schema::Version;
use thiserror::Error;
use tracing::{info, warn};

use crate::Reporter;
use crate::changelog::{default_body, load_notes};
use crate::forges::{ApiError, AssetInfo, NewRelease, ReleaseApi, ReleaseInfo};

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("a release for tag {tag} already exists (id={id}); pass --allow-existing to reuse it")]
    AlreadyExists { tag: String, id: u64 },

    #[error("asset not found: {}", .0.display())]
    AssetNotFound(PathBuf),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Everything needed to publish one release.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub tag: String,
    pub name: String,
    pub body: String,
    pub draft: bool,
    pub prerelease: bool,
    pub target: String,
    pub attach: Vec<PathBuf>,
    pub allow_existing: bool,
}

impl PublishRequest {
    /// Defaults for `version`: tag `v<ver>`, title `hp <ver>`, target `main`.
    pub fn for_version(version: Version, body: String) -> Self {
        Self {
            tag: version.tag(),
            name: format!("hp {version}"),
            body,
            draft: false,
            prerelease: false,
            target: "main".to_string(),
            attach: Vec::new(),
            allow_existing: false,
        }
    }

    /// The API payload for creating this release.
    pub fn payload(&self) -> NewRelease {
        NewRelease {
            tag_name: self.tag.clone(),
            name: self.name.clone(),
            body: self.body.clone(),
            draft: self.draft,
            prerelease: self.prerelease,
            target_commitish: self.target.clone(),
        }
    }
}

/// Release body: explicit text, else the changelog section, else a default.
///
/// # Errors
///
/// Propagates changelog read errors other than a missing file.
pub async fn release_body(
    explicit: Option<String>,
    changelog: &Path,
    tag: &str,
    version: Version,
) -> std::io::Result<String> {
    if let Some(body) = explicit.filter(|b| !b.trim().is_empty()) {
        return Ok(body);
    }
    let notes = load_notes(changelog, tag).await?;
    if notes.is_empty() {
        return Ok(default_body(version));
    }
    Ok(notes)
}

#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub release: ReleaseInfo,
    /// False when an existing release was reused.
    pub created: bool,
    pub uploaded: Vec<AssetInfo>,
    /// Assets that replaced one with the same name.
    pub replaced: Vec<String>,
}

/// Create the release (or reuse it with `allow_existing`) and upload every
/// attachment, replacing same-named assets.
///
/// Attachments are checked before any API call, so a typo never leaves a
/// half-published release behind.
///
/// # Errors
///
/// `AssetNotFound` for a missing attachment, `AlreadyExists` when the tag is
/// taken and reuse was not allowed, `Api` for API failures.
pub async fn publish(
    api: &dyn ReleaseApi,
    request: &PublishRequest,
    reporter: &dyn Reporter,
) -> Result<PublishOutcome, PublishError> {
    for path in &request.attach {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(PublishError::AssetNotFound(path.clone()));
        }
    }

    let (release, created) = match api.fetch_release(&request.tag).await? {
        Some(existing) if !request.allow_existing => {
            return Err(PublishError::AlreadyExists {
                tag: request.tag.clone(),
                id: existing.id,
            });
        }
        Some(existing) => {
            reporter.info(&format!("Reusing existing release {}", existing.tag_name));
            (existing, false)
        }
        None => (api.create_release(&request.payload()).await?, true),
    };

    let mut uploaded = Vec::with_capacity(request.attach.len());
    let mut replaced = Vec::new();
    for path in &request.attach {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| PublishError::AssetNotFound(path.clone()))?;

        if let Some(old) = release.asset(&name) {
            warn!(%name, id = old.id, "replacing existing asset");
            api.delete_asset(old.id).await?;
            replaced.push(name.clone());
        }
        reporter.info(&format!("Uploading {name}"));
        uploaded.push(api.upload_asset(&release, path, &name).await?);
    }

    info!(tag = %release.tag_name, created, assets = uploaded.len(), "release published");
    Ok(PublishOutcome {
        release,
        created,
        uploaded,
        replaced,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullReporter;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// In-memory release API recording every call.
    #[derive(Default)]
    struct FakeApi {
        existing: Option<ReleaseInfo>,
        calls: Mutex<Vec<String>>,
    }

    fn release(tag: &str, assets: &[&str]) -> ReleaseInfo {
        ReleaseInfo {
            id: 1,
            tag_name: tag.to_string(),
            name: None,
            html_url: String::new(),
            upload_url: "https://uploads/1/assets{?name}".to_string(),
            draft: false,
            prerelease: false,
            assets: assets
                .iter()
                .enumerate()
                .map(|(i, n)| AssetInfo {
                    id: 100 + i as u64,
                    name: (*n).to_string(),
                    browser_download_url: format!("https://dl/{n}"),
                    size: 0,
                })
                .collect(),
        }
    }

    #[async_trait]
    impl ReleaseApi for FakeApi {
        async fn fetch_release(&self, tag: &str) -> Result<Option<ReleaseInfo>, ApiError> {
            self.calls.lock().unwrap().push(format!("fetch {tag}"));
            Ok(self.existing.clone())
        }
        async fn create_release(&self, r: &NewRelease) -> Result<ReleaseInfo, ApiError> {
            self.calls.lock().unwrap().push(format!("create {}", r.tag_name));
            Ok(release(&r.tag_name, &[]))
        }
        async fn upload_asset(
            &self,
            _: &ReleaseInfo,
            _: &Path,
            name: &str,
        ) -> Result<AssetInfo, ApiError> {
            self.calls.lock().unwrap().push(format!("upload {name}"));
            Ok(release("", &[name]).assets.remove(0))
        }
        async fn delete_asset(&self, id: u64) -> Result<(), ApiError> {
            self.calls.lock().unwrap().push(format!("delete {id}"));
            Ok(())
        }
    }

    fn request(attach: Vec<PathBuf>) -> PublishRequest {
        let mut r = PublishRequest::for_version(Version::new(3, 3, 5), "notes".into());
        r.attach = attach;
        r
    }

    #[tokio::test]
    async fn creates_and_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("hp.exe");
        std::fs::write(&exe, b"x").unwrap();

        let api = FakeApi::default();
        let out = publish(&api, &request(vec![exe]), &NullReporter).await.unwrap();

        assert!(out.created);
        assert_eq!(out.uploaded.len(), 1);
        assert_eq!(
            *api.calls.lock().unwrap(),
            vec!["fetch v3.3.5", "create v3.3.5", "upload hp.exe"]
        );
    }

    #[tokio::test]
    async fn existing_release_requires_opt_in() {
        let api = FakeApi {
            existing: Some(release("v3.3.5", &[])),
            ..FakeApi::default()
        };
        let err = publish(&api, &request(vec![]), &NullReporter).await.unwrap_err();
        assert!(matches!(err, PublishError::AlreadyExists { id: 1, .. }));
    }

    #[tokio::test]
    async fn allow_existing_replaces_same_named_asset() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("hp.exe");
        std::fs::write(&exe, b"x").unwrap();

        let api = FakeApi {
            existing: Some(release("v3.3.5", &["hp.exe"])),
            ..FakeApi::default()
        };
        let mut req = request(vec![exe]);
        req.allow_existing = true;
        let out = publish(&api, &req, &NullReporter).await.unwrap();

        assert!(!out.created);
        assert_eq!(out.replaced, vec!["hp.exe".to_string()]);
        assert_eq!(
            *api.calls.lock().unwrap(),
            vec!["fetch v3.3.5", "delete 100", "upload hp.exe"]
        );
    }

    #[tokio::test]
    async fn missing_attachment_fails_before_any_call() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi::default();
        let err = publish(&api, &request(vec![dir.path().join("nope.exe")]), &NullReporter)
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::AssetNotFound(_)));
        assert!(api.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn body_falls_back_to_changelog_then_default() {
        let dir = tempfile::tempdir().unwrap();
        let changelog = dir.path().join("CHANGELOG.md");
        let v = Version::new(3, 3, 5);

        assert_eq!(
            release_body(None, &changelog, "v3.3.5", v).await.unwrap(),
            "hp 3.3.5 release"
        );

        std::fs::write(&changelog, "## v3.3.5\n\n- fixed\n").unwrap();
        assert_eq!(
            release_body(None, &changelog, "v3.3.5", v).await.unwrap(),
            "## v3.3.5\n\n- fixed"
        );
        assert_eq!(
            release_body(Some("custom".into()), &changelog, "v3.3.5", v)
                .await
                .unwrap(),
            "custom"
        );
    }
}
