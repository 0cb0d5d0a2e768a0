//! Reconciliation loop
//!
//! A level-triggered poll that re-derives pending builds from the tracker
//! and the status store instead of trusting event delivery. The status
//! transition to `building` happens before submission and is the
//! mutual-exclusion gate: a concurrent cycle or a restart between cycles
//! sees `building` and skips the entry.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::app::state::WorkerContext;
use crate::store::DeploymentStatus;
use crate::tracker::is_safe_relative;
use crate::workers::builder::{BuildExecutor, BuildSpec};

/// Reconciler worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Polling interval
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

/// Run the reconciler worker until shutdown
pub async fn run<S, F>(
    options: &Options,
    ctx: Arc<WorkerContext>,
    executor: Arc<BuildExecutor>,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Reconciler worker starting...");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Reconciler worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {
                // Continue with cycle
            }
        }

        run_cycle(&ctx, &executor).await;
    }
}

/// One reconciliation pass over the tracker
pub async fn run_cycle(ctx: &Arc<WorkerContext>, executor: &Arc<BuildExecutor>) {
    let entries = match ctx.tracker.load_all().await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to load tracker entries: {}", e);
            return;
        }
    };

    for entry in entries {
        let record = match ctx.store.read(&entry.deployment_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!(deployment_id = %entry.deployment_id, "Tracker entry without record, skipping");
                continue;
            }
            Err(e) => {
                warn!(deployment_id = %entry.deployment_id, "Failed to read record: {}", e);
                continue;
            }
        };

        // Only `cloned` deployments are eligible; anything else was
        // already promoted, finished or failed
        if record.status != DeploymentStatus::Cloned {
            debug!(deployment_id = %entry.deployment_id, status = %record.status, "Skipping entry");
            continue;
        }

        let Some(image_name) = record.image_name.clone() else {
            warn!(deployment_id = %entry.deployment_id, "No image name recorded, skipping");
            continue;
        };

        let workspace = ctx.tracker.workspace_dir(&entry);
        let Some(context_dir) = resolve_in_workspace(&workspace, record.context_dir.as_deref(), ".")
        else {
            warn!(deployment_id = %entry.deployment_id, "Unsafe context dir, skipping");
            continue;
        };
        let Some(dockerfile_path) =
            resolve_in_workspace(&workspace, record.dockerfile_path.as_deref(), "Dockerfile")
        else {
            warn!(deployment_id = %entry.deployment_id, "Unsafe dockerfile path, skipping");
            continue;
        };

        // The gate: mark as building before submission so no concurrent
        // cycle can pick this entry up again
        if let Err(e) = ctx
            .store
            .update_status(&entry.deployment_id, DeploymentStatus::Building)
            .await
        {
            warn!(deployment_id = %entry.deployment_id, "Failed to mark as building: {}", e);
            continue;
        }

        info!(repo = %entry.repo, deployment_id = %entry.deployment_id, "Starting build");

        executor
            .submit(BuildSpec {
                deployment_id: entry.deployment_id.clone(),
                image_name,
                context_dir,
                dockerfile_path,
            })
            .await;
    }
}

/// Join a wire-supplied relative path onto the workspace directory.
///
/// Leading `./` is stripped; absolute paths and `..` components are
/// rejected because they would escape the workspace.
fn resolve_in_workspace(
    workspace: &Path,
    relative: Option<&str>,
    default: &str,
) -> Option<PathBuf> {
    let raw = relative.unwrap_or(default);
    let trimmed = raw.trim_start_matches("./").trim_start_matches('/');
    let cleaned = if trimmed.is_empty() { default } else { trimmed };

    if !is_safe_relative(cleaned) {
        return None;
    }
    Some(workspace.join(cleaned))
}
