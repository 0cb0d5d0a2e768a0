//! Git clone collaborator

use std::path::Path;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::WorkerError;
use crate::utils::inject_token_in_url;

/// Source-control clone boundary
#[async_trait]
pub trait GitClient: Send + Sync {
    /// Clone `repo_url` at `branch` into `dest`. The token, when present,
    /// is injected into the URL as a basic-auth credential and must never
    /// appear in logs.
    async fn clone_repo(
        &self,
        repo_url: &str,
        branch: &str,
        token: Option<&SecretString>,
        dest: &Path,
    ) -> Result<(), WorkerError>;
}

/// `git` CLI implementation
pub struct CliGitClient;

#[async_trait]
impl GitClient for CliGitClient {
    async fn clone_repo(
        &self,
        repo_url: &str,
        branch: &str,
        token: Option<&SecretString>,
        dest: &Path,
    ) -> Result<(), WorkerError> {
        // Log the bare URL, clone with the credentialed one
        info!("Cloning {} (branch: {}) into {}", repo_url, branch, dest.display());

        let clone_url = match token {
            Some(token) => inject_token_in_url(repo_url, token),
            None => repo_url.to_string(),
        };

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let status = Command::new("git")
            .args(["clone", "--branch", branch])
            .arg(&clone_url)
            .arg(dest)
            .status()
            .await
            .map_err(|e| WorkerError::CloneError(format!("failed to run git clone: {}", e)))?;

        if !status.success() {
            return Err(WorkerError::CloneError(format!(
                "git clone failed for {}",
                repo_url
            )));
        }

        debug!("Clone finished: {}", dest.display());
        Ok(())
    }
}
