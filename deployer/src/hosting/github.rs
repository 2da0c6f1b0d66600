//! GitHub REST API provider

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{header, StatusCode};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::errors::DeployerError;
use crate::hosting::HostingProvider;
use crate::http::client::{ApiResponse, HttpClient};
use crate::models::repository::{
    CreateRepository, FileLookup, PublishConfig, PublishState, RepositoryHandle, VersionToken,
};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";

#[derive(Debug, Deserialize)]
struct OwnerResponse {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RepoResponse {
    name: String,
    html_url: String,
    #[serde(default)]
    default_branch: Option<String>,
    owner: OwnerResponse,
}

impl From<RepoResponse> for RepositoryHandle {
    fn from(repo: RepoResponse) -> Self {
        Self {
            owner: repo.owner.login,
            name: repo.name,
            html_url: repo.html_url,
            default_branch: repo.default_branch.unwrap_or_else(|| "main".to_string()),
        }
    }
}

/// Contents API entry, and the git blob API which shares its shape
#[derive(Debug, Deserialize)]
struct ContentResponse {
    sha: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PagesResponse {
    #[serde(default)]
    status: Option<String>,
}

/// GitHub provider authenticated as a single account
pub struct GitHubProvider {
    http_client: HttpClient,
    owner: String,
}

impl GitHubProvider {
    /// Create a provider for `owner`, authenticated with `token`
    pub fn new(api_url: &str, owner: &str, token: SecretString) -> Result<Self, DeployerError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            header::HeaderValue::from_static(API_VERSION),
        );

        let http_client = HttpClient::new(api_url, Duration::from_secs(30), headers)?
            .with_bearer_token(token);

        Ok(Self {
            http_client,
            owner: owner.to_string(),
        })
    }

    fn repo_path(repo: &RepositoryHandle, suffix: &[&str]) -> String {
        let mut segments = vec!["repos", repo.owner.as_str(), repo.name.as_str()];
        segments.extend_from_slice(suffix);
        encode_path(&segments)
    }

    fn contents_path(repo: &RepositoryHandle, file_path: &str) -> String {
        let mut segments = vec!["contents"];
        segments.extend(file_path.split('/').filter(|s| !s.is_empty()));
        Self::repo_path(repo, &segments)
    }

    async fn read_blob(&self, repo: &RepositoryHandle, sha: &str) -> Result<Vec<u8>, DeployerError> {
        let path = Self::repo_path(repo, &["git", "blobs", sha]);
        let response = self.http_client.get(&path).await.map_err(transport)?;
        if !response.is_success() {
            return Err(upstream("read blob", &response));
        }
        let blob: ContentResponse = response.json().map_err(decode)?;
        decode_content(blob.content.as_deref().unwrap_or_default())
    }

    async fn put_file(
        &self,
        repo: &RepositoryHandle,
        path: &str,
        content: &[u8],
        message: &str,
        version: Option<&VersionToken>,
    ) -> Result<(), DeployerError> {
        let mut body = json!({
            "message": message,
            "content": STANDARD.encode(content),
        });
        if let Some(version) = version {
            body["sha"] = json!(version.0);
        }

        let response = self
            .http_client
            .put(&Self::contents_path(repo, path), &body)
            .await
            .map_err(transport)?;

        if !response.is_success() {
            return Err(upstream(&format!("write {}", path), &response));
        }
        Ok(())
    }
}

#[async_trait]
impl HostingProvider for GitHubProvider {
    fn owner(&self) -> &str {
        &self.owner
    }

    fn pages_url(&self, repo: &RepositoryHandle) -> String {
        pages_url(&repo.owner, &repo.name)
    }

    async fn create_repository(&self, name: &str) -> Result<CreateRepository, DeployerError> {
        let body = json!({
            "name": name,
            "private": false,
            "auto_init": false,
        });
        let response = self
            .http_client
            .post("/user/repos", &body)
            .await
            .map_err(transport)?;

        if response.is_success() {
            let repo: RepoResponse = response.json().map_err(decode)?;
            info!("Created repository {}/{}", repo.owner.login, repo.name);
            return Ok(CreateRepository::Created(repo.into()));
        }

        if response.status == StatusCode::UNPROCESSABLE_ENTITY
            && response.body.contains("already exists")
        {
            debug!("Repository {} already exists", name);
            return Ok(CreateRepository::AlreadyExists);
        }

        Err(upstream("create repository", &response))
    }

    async fn get_repository(&self, name: &str) -> Result<RepositoryHandle, DeployerError> {
        let path = encode_path(&["repos", &self.owner, name]);
        let response = self.http_client.get(&path).await.map_err(transport)?;
        if !response.is_success() {
            return Err(upstream("get repository", &response));
        }
        let repo: RepoResponse = response.json().map_err(decode)?;
        Ok(repo.into())
    }

    async fn read_file(
        &self,
        repo: &RepositoryHandle,
        path: &str,
    ) -> Result<FileLookup, DeployerError> {
        let response = self
            .http_client
            .get(&Self::contents_path(repo, path))
            .await
            .map_err(transport)?;

        // An empty repository also answers 404 here.
        if response.status == StatusCode::NOT_FOUND {
            return Ok(FileLookup::NotFound);
        }
        if !response.is_success() {
            return Err(upstream(&format!("read {}", path), &response));
        }

        let entry: ContentResponse = response.json().map_err(decode)?;
        let content = match (entry.encoding.as_deref(), entry.content.as_deref()) {
            (Some("base64"), Some(content)) => decode_content(content)?,
            // Files above the inline size limit come back with encoding "none".
            _ => self.read_blob(repo, &entry.sha).await?,
        };

        Ok(FileLookup::Found {
            content,
            version: VersionToken(entry.sha),
        })
    }

    async fn create_file(
        &self,
        repo: &RepositoryHandle,
        path: &str,
        content: &[u8],
        message: &str,
    ) -> Result<(), DeployerError> {
        self.put_file(repo, path, content, message, None).await
    }

    async fn update_file(
        &self,
        repo: &RepositoryHandle,
        path: &str,
        content: &[u8],
        message: &str,
        version: &VersionToken,
    ) -> Result<(), DeployerError> {
        self.put_file(repo, path, content, message, Some(version)).await
    }

    async fn latest_commit_sha(&self, repo: &RepositoryHandle) -> Result<String, DeployerError> {
        let branch: String = url::form_urlencoded::byte_serialize(repo.default_branch.as_bytes()).collect();
        let path = format!(
            "{}?sha={}&per_page=1",
            Self::repo_path(repo, &["commits"]),
            branch
        );
        let response = self.http_client.get(&path).await.map_err(transport)?;
        if !response.is_success() {
            return Err(upstream("list commits", &response));
        }

        let commits: Vec<CommitResponse> = response.json().map_err(decode)?;
        commits
            .into_iter()
            .next()
            .map(|c| c.sha)
            .ok_or_else(|| DeployerError::RepositoryError(format!("{} has no commits", repo.full_name())))
    }

    async fn publish_state(&self, repo: &RepositoryHandle) -> Result<PublishState, DeployerError> {
        let response = self
            .http_client
            .get(&Self::repo_path(repo, &["pages"]))
            .await
            .map_err(transport)?;

        if response.status == StatusCode::NOT_FOUND {
            return Ok(PublishState::default());
        }
        if !response.is_success() {
            return Err(upstream("read pages", &response));
        }

        let pages: PagesResponse = response.json().map_err(decode)?;
        Ok(PublishState {
            enabled: true,
            in_progress: matches!(pages.status.as_deref(), Some("queued" | "building")),
        })
    }

    async fn configure_publish(
        &self,
        repo: &RepositoryHandle,
        branch: &str,
        path: &str,
    ) -> Result<PublishConfig, DeployerError> {
        let body = json!({ "source": { "branch": branch, "path": path } });
        let response = self
            .http_client
            .post(&Self::repo_path(repo, &["pages"]), &body)
            .await
            .map_err(transport)?;
        publish_outcome("configure pages", &response)
    }

    async fn configure_publish_legacy(
        &self,
        repo: &RepositoryHandle,
        branch: &str,
    ) -> Result<PublishConfig, DeployerError> {
        let body = json!({
            "build_type": "legacy",
            "source": { "branch": branch, "path": "/" },
        });
        let response = self
            .http_client
            .put(&Self::repo_path(repo, &["pages"]), &body)
            .await
            .map_err(transport)?;
        publish_outcome("configure pages (legacy)", &response)
    }
}

fn publish_outcome(context: &str, response: &ApiResponse) -> Result<PublishConfig, DeployerError> {
    if response.is_success() {
        Ok(PublishConfig::Configured)
    } else if response.status == StatusCode::CONFLICT {
        Ok(PublishConfig::InProgress)
    } else {
        Err(upstream(context, response))
    }
}

/// Site URL GitHub Pages serves a repository at
pub fn pages_url(owner: &str, repo: &str) -> String {
    let host = format!("{}.github.io", owner.to_lowercase());
    if repo.eq_ignore_ascii_case(&host) {
        format!("https://{}/", host)
    } else {
        format!("https://{}/{}/", host, repo)
    }
}

/// Join percent-encoded path segments into an absolute path
fn encode_path(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|s| {
            url::form_urlencoded::byte_serialize(s.as_bytes())
                .collect::<String>()
                .replace('+', "%20")
        })
        .fold(String::new(), |mut path, segment| {
            path.push('/');
            path.push_str(&segment);
            path
        })
}

/// Decode base64 content as returned by the API, which wraps lines
fn decode_content(content: &str) -> Result<Vec<u8>, DeployerError> {
    let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| DeployerError::RepositoryError(format!("Invalid file content encoding: {}", e)))
}

fn transport(e: reqwest::Error) -> DeployerError {
    DeployerError::RepositoryError(format!("GitHub request failed: {}", e))
}

fn decode(e: serde_json::Error) -> DeployerError {
    DeployerError::RepositoryError(format!("Unexpected GitHub response: {}", e))
}

fn upstream(context: &str, response: &ApiResponse) -> DeployerError {
    DeployerError::RepositoryError(format!(
        "{} failed: {} - {}",
        context, response.status, response.body
    ))
}
