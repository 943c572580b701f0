//! Archival of completed documents to a version-controlled repository.
//!
//! Archiving never fails loudly: every backend reports its result as an
//! [`ArchiveOutcome`] and leaves the in-memory document untouched.

pub mod github;
pub mod local;
pub mod render;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::document::Document;

pub use github::{GithubArchiver, GithubConfig};
pub use local::{GitArchiver, GitAuthor};

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArchiveOutcome {
    pub committed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ArchiveOutcome {
    pub fn committed(path: impl Into<String>, sha: impl Into<String>, url: Option<String>) -> Self {
        Self {
            committed: true,
            path: Some(path.into()),
            sha: Some(sha.into()),
            url,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            committed: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Persist a document somewhere durable.
#[async_trait]
pub trait Archiver: Send + Sync {
    async fn archive(&self, doc: &Document, message: Option<&str>) -> ArchiveOutcome;

    fn name(&self) -> &'static str;
}

/// Used when archiving is switched off.
pub struct DisabledArchiver;

#[async_trait]
impl Archiver for DisabledArchiver {
    async fn archive(&self, _doc: &Document, _message: Option<&str>) -> ArchiveOutcome {
        ArchiveOutcome::failed("archiving is disabled")
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveBackend {
    Git,
    Github,
    None,
}

impl FromStr for ArchiveBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "git" | "local" => Ok(Self::Git),
            "github" | "remote" => Ok(Self::Github),
            "none" | "off" | "disabled" => Ok(Self::None),
            other => Err(format!(
                "unknown archive backend '{other}' (expected git, github or none)"
            )),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ArchiveConfig {
    pub backend: ArchiveBackend,
    pub git_dir: PathBuf,
    pub git_author: GitAuthor,
    pub github: GithubConfig,
}

/// Pick the archiver implementation for the configured backend.
pub fn build_archiver(config: &ArchiveConfig) -> Arc<dyn Archiver> {
    match config.backend {
        ArchiveBackend::Git => Arc::new(
            GitArchiver::new(&config.git_dir)
                .with_author(config.git_author.clone())
                .with_token(config.github.token.clone()),
        ),
        ArchiveBackend::Github => Arc::new(GithubArchiver::new(config.github.clone())),
        ArchiveBackend::None => Arc::new(DisabledArchiver),
    }
}
