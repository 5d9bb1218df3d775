//! Publishing the output directory to a git branch.

use crate::error::PipelineError;
use crate::fileset::SourceFile;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, info};

/// A publishing capability.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `files`, all located under `dir`.
    async fn publish(&self, dir: &Path, files: &[SourceFile]) -> Result<()>;
}

/// Publishes to a branch of the project's own git remote.
///
/// A checkout of the remote is kept in the user cache directory and reused
/// across runs. Each publish replaces the branch contents with the output
/// directory and pushes a single commit.
#[derive(Debug, Clone)]
pub struct GitPublisher {
    /// Project repository whose remote receives the branch.
    pub root: PathBuf,
    pub remote: String,
    pub branch: String,
    pub message: String,
    /// Directory holding cached checkouts.
    pub cache_root: PathBuf,
}

impl GitPublisher {
    pub fn new(root: &Path, remote: &str, branch: &str, message: &str) -> Self {
        Self {
            root: root.to_path_buf(),
            remote: remote.to_string(),
            branch: branch.to_string(),
            message: message.to_string(),
            cache_root: default_cache_root(),
        }
    }

    /// Checkout directory used for a remote URL.
    pub fn checkout_dir(&self, url: &str) -> PathBuf {
        self.cache_root.join(cache_key(url))
    }

    async fn remote_url(&self) -> Result<String> {
        let key = format!("remote.{}.url", self.remote);
        let url = git_ok(&self.root, &["config", "--get", &key])
            .await
            .with_context(|| format!("no git remote named '{}'", self.remote))?;
        Ok(url.trim().to_string())
    }

    /// Clone the remote into the cache, or refresh an existing checkout.
    async fn prepare_checkout(&self, url: &str) -> Result<PathBuf> {
        let dir = self.checkout_dir(url);
        if dir.join(".git").exists() {
            debug!(path = %dir.display(), "Reusing cached checkout");
            git_ok(&dir, &["remote", "set-url", "origin", url]).await?;
            git_ok(&dir, &["fetch", "origin"]).await?;
        } else {
            info!(remote = %url, path = %dir.display(), "Cloning publish checkout");
            tokio::fs::create_dir_all(&self.cache_root).await?;
            let target = dir.to_string_lossy().into_owned();
            git_ok(&self.cache_root, &["clone", url, &target]).await?;
        }
        Ok(dir)
    }

    /// Check out the publish branch, tracking the remote one when it exists.
    async fn checkout_branch(&self, dir: &Path) -> Result<()> {
        let exists = git(dir, &["ls-remote", "--exit-code", "--heads", "origin", &self.branch])
            .await?
            .status
            .success();
        if exists {
            let upstream = format!("origin/{}", self.branch);
            git_ok(dir, &["checkout", "-f", "-B", &self.branch, &upstream]).await?;
        } else {
            info!(branch = %self.branch, "Creating new branch");
            git_ok(dir, &["checkout", "-f", "--orphan", &self.branch]).await?;
        }
        // Leftovers of an interrupted publish must not be committed
        git_ok(dir, &["clean", "-fdq"]).await?;
        Ok(())
    }
}

#[async_trait]
impl Publisher for GitPublisher {
    async fn publish(&self, dir: &Path, files: &[SourceFile]) -> Result<()> {
        let url = self.remote_url().await?;
        let checkout = self.prepare_checkout(&url).await?;
        self.checkout_branch(&checkout).await?;

        git_ok(&checkout, &["rm", "-r", "-q", "-f", "--ignore-unmatch", "."]).await?;
        for file in files {
            let target = checkout.join(&file.relative);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(&file.path, &target)
                .await
                .with_context(|| format!("cannot copy {}", file.path.display()))?;
        }
        git_ok(&checkout, &["add", "--all", "."]).await?;

        let unchanged = git(&checkout, &["diff", "--cached", "--quiet"])
            .await?
            .status
            .success();
        if unchanged {
            info!(
                "{} is already up to date on '{}'",
                dir.display(),
                self.branch
            );
            return Ok(());
        }

        git_ok(&checkout, &["commit", "-q", "-m", &self.message]).await?;
        git_ok(&checkout, &["push", "origin", &self.branch]).await?;
        info!(
            files = files.len(),
            "Published {} to {} ({})",
            dir.display(),
            url,
            self.branch
        );
        Ok(())
    }
}

fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("pages-pipeline")
        .join("publish")
}

/// Directory name for a remote URL: every run of characters other than
/// ASCII letters, digits, `.` and `_` becomes a single `-`.
pub fn cache_key(url: &str) -> String {
    let mut key = String::with_capacity(url.len());
    for c in url.chars() {
        if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
            key.push(c);
        } else if !key.ends_with('-') {
            key.push('-');
        }
    }
    key.trim_matches('-').to_string()
}

async fn git(dir: &Path, args: &[&str]) -> Result<Output> {
    debug!(?args, dir = %dir.display(), "git");
    Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .await
        .with_context(|| format!("failed to execute git {}", args.first().unwrap_or(&"")))
}

async fn git_ok(dir: &Path, args: &[&str]) -> Result<String> {
    let output = git(dir, args).await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PipelineError::Publish(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        ))
        .into());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
