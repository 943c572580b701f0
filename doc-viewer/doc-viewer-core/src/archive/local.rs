//! Archive into a local git repository and push it to `origin`.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use git2::{Cred, ErrorCode, PushOptions, RemoteCallbacks, Repository, Signature};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{render, ArchiveOutcome, Archiver};
use crate::document::Document;

const SHORT_SHA_LEN: usize = 7;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GitAuthor {
    pub name: String,
    pub email: String,
}

impl Default for GitAuthor {
    fn default() -> Self {
        Self {
            name: "doc-viewer".into(),
            email: "doc-viewer@localhost".into(),
        }
    }
}

pub struct GitArchiver {
    dir: PathBuf,
    author: GitAuthor,
    token: Option<String>,
    /// Held by the blocking task for the whole write, commit and push, so
    /// index and ref updates never interleave.
    repo_lock: Arc<Mutex<()>>,
}

impl GitArchiver {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            author: GitAuthor::default(),
            token: None,
            repo_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_author(mut self, author: GitAuthor) -> Self {
        self.author = author;
        self
    }

    /// Token used for HTTPS pushes.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl Archiver for GitArchiver {
    async fn archive(&self, doc: &Document, message: Option<&str>) -> ArchiveOutcome {
        let rel_path = render::relative_path(doc);
        let body = render::render_document(doc);
        let message = message
            .map(str::to_string)
            .unwrap_or_else(|| render::default_commit_message(doc));
        let dir = self.dir.clone();
        let author = self.author.clone();
        let token = self.token.clone();
        let repo_lock = Arc::clone(&self.repo_lock);

        let path = rel_path.clone();
        let result = tokio::task::spawn_blocking(move || {
            let _guard = repo_lock.lock();
            commit_file(&dir, &path, &body, &message, &author, token.as_deref())
        })
        .await;

        match result {
            Ok(Ok(sha)) => {
                tracing::info!(id = %doc.id, path = %rel_path, sha = %sha, "document archived");
                ArchiveOutcome::committed(rel_path, sha, None)
            }
            Ok(Err(err)) => {
                let error = format!("{err:#}");
                tracing::warn!(id = %doc.id, error = %error, "git archive failed");
                ArchiveOutcome::failed(error)
            }
            Err(err) => ArchiveOutcome::failed(format!("archive task aborted: {err}")),
        }
    }

    fn name(&self) -> &'static str {
        "git"
    }
}

fn open_or_init(dir: &Path) -> Result<Repository> {
    let repo = if dir.join(".git").exists() {
        Repository::open(dir)?
    } else {
        std::fs::create_dir_all(dir)?;
        Repository::init(dir)?
    };
    Ok(repo)
}

/// Write, stage, commit and push one file. Returns the short commit id.
/// Steps that already succeeded are left in place when a later one fails.
fn commit_file(
    dir: &Path,
    rel_path: &str,
    body: &str,
    message: &str,
    author: &GitAuthor,
    token: Option<&str>,
) -> Result<String> {
    let repo = open_or_init(dir)?;
    let workdir = repo
        .workdir()
        .ok_or_else(|| anyhow!("archive repository has no working directory"))?
        .to_path_buf();

    let target = workdir.join(rel_path);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&target, body)?;

    let mut index = repo.index()?;
    index.add_path(Path::new(rel_path))?;
    index.write()?;
    let tree_id = index.write_tree()?;
    let tree = repo.find_tree(tree_id)?;

    let sig = Signature::now(&author.name, &author.email)?;
    let commit_id = match repo.head() {
        Ok(head) => {
            let parent = head.peel_to_commit()?;
            repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])?
        }
        Err(_) => repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[])?,
    };

    if !push_to_origin(&repo, token)? {
        tracing::debug!(dir = %dir.display(), "no origin remote, skipping push");
    }

    let mut sha = commit_id.to_string();
    sha.truncate(SHORT_SHA_LEN);
    Ok(sha)
}

/// Push the current branch to `origin`. Returns false when there is no such
/// remote.
fn push_to_origin(repo: &Repository, token: Option<&str>) -> Result<bool> {
    let mut remote = match repo.find_remote("origin") {
        Ok(remote) => remote,
        Err(err) if err.code() == ErrorCode::NotFound => return Ok(false),
        Err(err) => return Err(err.into()),
    };
    let branch = repo
        .head()?
        .shorthand()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("HEAD does not point at a branch"))?;

    let mut callbacks = RemoteCallbacks::new();
    if let Some(token) = token {
        let token = token.to_string();
        callbacks.credentials(move |_url, username_from_url, _allowed| {
            Cred::userpass_plaintext(username_from_url.unwrap_or("x-access-token"), &token)
        });
    }
    let mut push_options = PushOptions::new();
    push_options.remote_callbacks(callbacks);

    let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
    remote.push(&[&refspec], Some(&mut push_options))?;
    Ok(true)
}
