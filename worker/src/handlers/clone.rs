//! Clone stage
//!
//! Clones the repository into a timestamped workspace, then writes the
//! tracker entry and the initial deployment record. A failed clone leaves
//! a `failed` record and no tracker entry, so the reconciler never picks
//! it up.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use crate::app::state::WorkerContext;
use crate::handlers::non_empty;
use crate::models::message::JobMessage;
use crate::store::{DeploymentRecord, DeploymentStatus};
use crate::tracker::{workspace_name, TrackerEntry};
use crate::utils::{derive_image_name, parse_port, repo_short_name};

pub async fn handle_clone(ctx: Arc<WorkerContext>, msg: JobMessage) {
    let repo_name = repo_short_name(&msg.repository);
    let timestamp = Utc::now().timestamp();
    let folder = workspace_name(&repo_name, timestamp);
    let dest = ctx.repos_dir.join(&folder);

    let branch = if msg.branch.is_empty() { "main" } else { &msg.branch };

    let cloned = ctx
        .git
        .clone_repo(&msg.repository, branch, msg.token.as_ref(), &dest)
        .await;

    let status = match &cloned {
        Ok(()) => {
            info!(deployment_id = %msg.deployment_id, "Repo cloned successfully");
            DeploymentStatus::Cloned
        }
        Err(e) => {
            error!(deployment_id = %msg.deployment_id, "Failed to clone repo: {}", e);
            DeploymentStatus::Failed
        }
    };

    // Tracker entry only for successful clones; failed deployments must
    // never reach the reconciler.
    if cloned.is_ok() {
        let entry = TrackerEntry {
            deployment_id: msg.deployment_id.clone(),
            path: folder,
            repo: repo_name,
            status: DeploymentStatus::Cloned,
            created_at: timestamp,
        };
        if let Err(e) = ctx.tracker.save_entry(entry).await {
            error!(deployment_id = %msg.deployment_id, "Failed to save tracker entry: {}", e);
        }
    }

    let mut record = DeploymentRecord::new(&msg.deployment_id, status);
    record.image_name = Some(derive_image_name(
        &ctx.image_namespace,
        &msg.repository,
        &msg.deployment_id,
    ));
    record.context_dir = non_empty(&msg.context_dir);
    record.dockerfile_path = non_empty(&msg.dockerfile_path);
    record.compose_path = non_empty(&msg.compose_file_path);
    record.port = parse_port(&msg.port_number);

    if let Err(e) = ctx.store.upsert(record).await {
        error!(deployment_id = %msg.deployment_id, "Failed to write record: {}", e);
    }
}
