//! In-flight job tracker
//!
//! The crash-recoverable list of deployments that have been cloned but not
//! yet built. The whole entry set lives in one JSON file and every
//! save/delete is a load-mutate-rewrite of the full set under one mutex;
//! that file is what bridges "repo cloned" to "image building" across
//! process restarts.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use crate::errors::WorkerError;
use crate::filesys::file::{remove_dir_if_exists, JsonFile};
use crate::store::DeploymentStatus;

/// One cloned-but-not-built deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerEntry {
    pub deployment_id: String,

    /// Workspace directory name under the repos dir: `<repo>-<timestamp>`
    pub path: String,

    /// Short repository name
    pub repo: String,

    /// Local status mirror; `cloned` for the whole life of the entry
    pub status: DeploymentStatus,

    /// Unix timestamp, also the workspace name suffix
    pub created_at: i64,
}

/// Mutex-guarded tracker over a single JSON file
pub struct Tracker {
    file: JsonFile,
    repos_dir: PathBuf,
    lock: Mutex<()>,
}

impl Tracker {
    pub fn new(file: JsonFile, repos_dir: impl Into<PathBuf>) -> Self {
        Self {
            file,
            repos_dir: repos_dir.into(),
            lock: Mutex::new(()),
        }
    }

    /// The workspace directory for an entry
    pub fn workspace_dir(&self, entry: &TrackerEntry) -> PathBuf {
        self.repos_dir.join(&entry.path)
    }

    /// Append a new entry, rewriting the full set
    pub async fn save_entry(&self, entry: TrackerEntry) -> Result<(), WorkerError> {
        let _guard = self.lock.lock().await;

        let mut entries = self.load().await?;
        info!(repo = %entry.repo, path = %entry.path, "Saving tracker entry");
        entries.push(entry);
        self.file.write(&entries).await
    }

    /// Load every tracked entry; an absent file is an empty set
    pub async fn load_all(&self) -> Result<Vec<TrackerEntry>, WorkerError> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    /// Remove an entry by deployment id and delete its cloned workspace
    /// directory.
    pub async fn delete_entry(&self, deployment_id: &str) -> Result<(), WorkerError> {
        let _guard = self.lock.lock().await;

        let entries = self.load().await?;
        let (removed, kept): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|e| e.deployment_id == deployment_id);

        let Some(entry) = removed.into_iter().next() else {
            return Err(WorkerError::NotFound(format!(
                "no tracker entry for deployment {}",
                deployment_id
            )));
        };

        info!(repo = %entry.repo, path = %entry.path, "Deleting tracker entry");
        remove_dir_if_exists(&self.repos_dir.join(&entry.path)).await?;
        self.file.write(&kept).await
    }

    async fn load(&self) -> Result<Vec<TrackerEntry>, WorkerError> {
        if !self.file.exists().await {
            return Ok(Vec::new());
        }
        self.file.read().await
    }
}

/// Build the workspace directory name for a fresh clone:
/// `<repoShortName>-<unixTimestamp>`. The timestamp keeps repeated
/// deployments of the same repository apart.
pub fn workspace_name(repo_short_name: &str, timestamp: i64) -> String {
    format!("{}-{}", repo_short_name, timestamp)
}

/// Whether a path string stays inside the repos dir once joined.
/// Rejects absolute paths and any `..` component coming off the wire.
pub fn is_safe_relative(path: &str) -> bool {
    let p = Path::new(path);
    !p.is_absolute()
        && !p
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
}
