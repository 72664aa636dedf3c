use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, header};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use crate::credentials::Token;
use crate::forges::traits::{ApiError, AssetInfo, NewRelease, ReleaseApi, ReleaseInfo};

const API_VERSION: &str = "2022-11-28";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build an authenticated GitHub client.
///
/// # Errors
///
/// `InvalidToken` if the token cannot be sent as a header.
pub fn build_github_client(token: &Token) -> Result<Client, ApiError> {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::USER_AGENT,
        header::HeaderValue::from_static(crate::USER_AGENT),
    );
    headers.insert(
        header::ACCEPT,
        header::HeaderValue::from_static("application/vnd.github+json"),
    );
    headers.insert(
        "x-github-api-version",
        header::HeaderValue::from_static(API_VERSION),
    );
    let mut auth = header::HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
        .map_err(|_| ApiError::InvalidToken)?;
    auth.set_sensitive(true);
    headers.insert(header::AUTHORIZATION, auth);

    Ok(Client::builder().default_headers(headers).build()?)
}

/// GitHub releases for one `owner/repo`.
#[derive(Debug, Clone)]
pub struct GithubClient {
    client: Client,
    api_url: String,
    owner: String,
    repo: String,
}

impl GithubClient {
    /// # Errors
    ///
    /// See [`build_github_client`].
    pub fn new(api_url: &str, owner: &str, repo: &str, token: &Token) -> Result<Self, ApiError> {
        Ok(Self {
            client: build_github_client(token)?,
            api_url: api_url.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    fn repo_url(&self, rest: &str) -> String {
        format!("{}/repos/{}/{}/{rest}", self.api_url, self.owner, self.repo)
    }
}

async fn check(method: &'static str, url: &str, response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let mut message = response.text().await.unwrap_or_default();
    message.truncate(200);
    Err(ApiError::Status {
        method,
        url: url.to_string(),
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ReleaseApi for GithubClient {
    async fn fetch_release(&self, tag: &str) -> Result<Option<ReleaseInfo>, ApiError> {
        let url = self.repo_url(&format!("releases/tags/{tag}"));
        let response = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(%tag, "no release for tag");
            return Ok(None);
        }
        let release = check("GET", &url, response).await?.json().await?;
        Ok(Some(release))
    }

    async fn create_release(&self, release: &NewRelease) -> Result<ReleaseInfo, ApiError> {
        let url = self.repo_url("releases");
        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(release)
            .send()
            .await?;
        let created: ReleaseInfo = check("POST", &url, response).await?.json().await?;
        info!(tag = %created.tag_name, id = created.id, "release created");
        Ok(created)
    }

    async fn upload_asset(
        &self,
        release: &ReleaseInfo,
        path: &Path,
        name: &str,
    ) -> Result<AssetInfo, ApiError> {
        // `upload_url` is a URI template: ".../assets{?name,label}".
        let base = release
            .upload_url
            .split('{')
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::MissingUploadUrl {
                tag: release.tag_name.clone(),
            })?;

        let io_err = |source| ApiError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = tokio::fs::File::open(path).await.map_err(io_err)?;
        let len = file.metadata().await.map_err(io_err)?.len();

        let response = self
            .client
            .post(base)
            .query(&[("name", name)])
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header(header::CONTENT_LENGTH, len)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await?;
        let asset: AssetInfo = check("POST", base, response).await?.json().await?;
        info!(%name, bytes = len, "asset uploaded");
        Ok(asset)
    }

    async fn delete_asset(&self, asset_id: u64) -> Result<(), ApiError> {
        let url = self.repo_url(&format!("releases/assets/{asset_id}"));
        let response = self
            .client
            .delete(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        check("DELETE", &url, response).await?;
        debug!(asset_id, "asset deleted");
        Ok(())
    }
}
