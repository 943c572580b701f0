//! Runtime settings, loaded from the environment and overridable on the
//! command line.

use anyhow::{Context, Result};
use clap::Parser;
use doc_viewer_core::archive::{
    github::DEFAULT_API_BASE, ArchiveBackend, ArchiveConfig, GitAuthor, GithubConfig,
};
use std::path::PathBuf;

const DEFAULT_GITHUB_REPO: &str = "sakshamshil/another-set-of-eyes-docs";

#[derive(Clone, Debug)]
pub struct Settings {
    pub environment: String,
    pub host: String,
    pub port: u16,
    /// Base used for document links; derived from the request when unset.
    pub public_url: Option<String>,
    pub archive: ArchiveConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: "development".into(),
            host: "0.0.0.0".into(),
            port: 8000,
            public_url: None,
            archive: ArchiveConfig {
                backend: ArchiveBackend::Git,
                git_dir: PathBuf::from("documents"),
                git_author: GitAuthor::default(),
                github: GithubConfig {
                    api_base: DEFAULT_API_BASE.into(),
                    repo: DEFAULT_GITHUB_REPO.into(),
                    token: None,
                    branch: None,
                },
            },
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut settings = Settings::default();

        if let Some(environment) = var("ENVIRONMENT") {
            settings.environment = environment;
        }
        if let Some(host) = var("HOST") {
            settings.host = host;
        }
        if let Some(port) = var("PORT") {
            settings.port = port
                .parse()
                .with_context(|| format!("invalid PORT '{port}'"))?;
        }
        settings.public_url = var("PUBLIC_URL").map(|u| u.trim_end_matches('/').to_string());

        let archive = &mut settings.archive;
        archive.backend = match var("ARCHIVE_BACKEND") {
            Some(backend) => backend.parse().map_err(anyhow::Error::msg)?,
            None if settings.environment == "production" => ArchiveBackend::Github,
            None => ArchiveBackend::Git,
        };
        if let Some(dir) = var("ARCHIVE_DIR") {
            archive.git_dir = PathBuf::from(dir);
        }
        if let Some(name) = var("GIT_AUTHOR_NAME") {
            archive.git_author.name = name;
        }
        if let Some(email) = var("GIT_AUTHOR_EMAIL") {
            archive.git_author.email = email;
        }
        archive.github.token = var("GITHUB_TOKEN");
        archive.github.branch = var("GITHUB_BRANCH");
        if let Some(repo) = var("GITHUB_REPO") {
            archive.github.repo = repo;
        }
        if let Some(api) = var("GITHUB_API_URL") {
            archive.github.api_base = api;
        }
        Ok(settings)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Parser, Debug, Default)]
#[command(name = "doc-viewer")]
#[command(about = "Live markdown document viewer with git archival")]
pub struct Cli {
    /// Listen host
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Local repository that receives archived documents
    #[arg(long)]
    pub archive_dir: Option<PathBuf>,

    /// Archive backend: git, github or none
    #[arg(long)]
    pub archive_backend: Option<ArchiveBackend>,

    /// Do not read a `.env` file
    #[arg(long)]
    pub no_dotenv: bool,
}

impl Cli {
    /// Command line flags win over the environment.
    pub fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(host) = &self.host {
            settings.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(dir) = &self.archive_dir {
            settings.archive.git_dir = dir.clone();
        }
        if let Some(backend) = self.archive_backend {
            settings.archive.backend = backend;
        }
        settings
    }
}

/// The error worth reporting from a `.env` load. A missing file is not one.
pub fn dotenv_failure<T>(result: dotenvy::Result<T>) -> Option<dotenvy::Error> {
    match result {
        Err(err) if !err.not_found() => Some(err),
        _ => None,
    }
}
