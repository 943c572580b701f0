//! Archive through the GitHub repository contents API.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize};

use super::{render, ArchiveOutcome, Archiver};
use crate::document::Document;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GithubConfig {
    pub api_base: String,
    /// `owner/name` of the docs repository.
    pub repo: String,
    pub token: Option<String>,
    pub branch: Option<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.into(),
            repo: String::new(),
            token: None,
            branch: None,
        }
    }
}

#[derive(Deserialize)]
struct ExistingFile {
    sha: String,
}

#[derive(Serialize)]
struct PutContents<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

#[derive(Deserialize)]
struct PutResponse {
    commit: CommitInfo,
    content: ContentInfo,
}

#[derive(Deserialize)]
struct CommitInfo {
    sha: String,
}

#[derive(Deserialize)]
struct ContentInfo {
    html_url: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

pub struct GithubArchiver {
    client: reqwest::Client,
    config: GithubConfig,
}

impl GithubArchiver {
    pub fn new(config: GithubConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Contents endpoint for `path`, with every segment percent-encoded.
    fn contents_url(&self, path: &str) -> Result<Url> {
        let mut url = Url::parse(&self.config.api_base)?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("invalid GitHub API base: {}", self.config.api_base))?
            .pop_if_empty()
            .push("repos")
            .extend(self.config.repo.split('/').filter(|s| !s.is_empty()))
            .push("contents")
            .extend(path.split('/'));
        Ok(url)
    }

    fn request(&self, method: Method, url: &Url, token: &str) -> RequestBuilder {
        self.client
            .request(method, url.clone())
            .bearer_auth(token)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header(USER_AGENT, "doc-viewer")
    }

    /// Blob sha of the file if it already exists, needed to overwrite it.
    async fn existing_sha(&self, url: &Url, token: &str) -> Result<Option<String>> {
        let mut req = self.request(Method::GET, url, token);
        if let Some(branch) = &self.config.branch {
            req = req.query(&[("ref", branch)]);
        }
        let resp = req.send().await?;
        if resp.status() != StatusCode::OK {
            return Ok(None);
        }
        Ok(Some(resp.json::<ExistingFile>().await?.sha))
    }

    async fn put_file(
        &self,
        token: &str,
        path: &str,
        body: &str,
        message: &str,
    ) -> Result<ArchiveOutcome> {
        let url = self.contents_url(path)?;
        let sha = self.existing_sha(&url, token).await?;
        let payload = PutContents {
            message,
            content: STANDARD.encode(body.as_bytes()),
            sha,
            branch: self.config.branch.as_deref(),
        };
        let resp = self
            .request(Method::PUT, &url, token)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::OK || status == StatusCode::CREATED {
            let data: PutResponse = resp.json().await?;
            let mut sha = data.commit.sha;
            sha.truncate(7);
            return Ok(ArchiveOutcome::committed(path, sha, data.content.html_url));
        }

        let message = resp
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        Ok(ArchiveOutcome::failed(message))
    }
}

#[async_trait]
impl Archiver for GithubArchiver {
    async fn archive(&self, doc: &Document, message: Option<&str>) -> ArchiveOutcome {
        let Some(token) = self.config.token.as_deref().filter(|t| !t.is_empty()) else {
            return ArchiveOutcome::failed("GITHUB_TOKEN not configured");
        };
        let path = render::relative_path(doc);
        let body = render::render_document(doc);
        let message = message
            .map(str::to_string)
            .unwrap_or_else(|| render::default_commit_message(doc));

        match self.put_file(token, &path, &body, &message).await {
            Ok(outcome) => {
                if outcome.committed {
                    tracing::info!(id = %doc.id, path = %path, "document archived to github");
                } else {
                    tracing::warn!(id = %doc.id, error = ?outcome.error, "github rejected archive");
                }
                outcome
            }
            Err(err) => {
                tracing::warn!(id = %doc.id, error = %err, "github archive failed");
                ArchiveOutcome::failed(err.to_string())
            }
        }
    }

    fn name(&self) -> &'static str {
        "github"
    }
}
