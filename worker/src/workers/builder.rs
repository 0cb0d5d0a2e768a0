//! Bounded build executor
//!
//! Image builds are the one resource-heavy stage, so they run under a
//! counting semaphore. Submission blocks only until a slot is free; the
//! build itself runs in its own task with the owned permit, which is
//! released by drop on every exit path.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::app::state::WorkerContext;
use crate::models::message::{ResultEvent, ResultStatus};
use crate::store::DeploymentStatus;

/// One build to run
#[derive(Debug, Clone)]
pub struct BuildSpec {
    pub deployment_id: String,
    pub image_name: String,
    pub context_dir: PathBuf,
    pub dockerfile_path: PathBuf,
}

/// Semaphore-bounded executor for image builds
pub struct BuildExecutor {
    ctx: Arc<WorkerContext>,
    slots: Arc<Semaphore>,
}

impl BuildExecutor {
    pub fn new(ctx: Arc<WorkerContext>, max_concurrent_builds: usize) -> Self {
        Self {
            ctx,
            slots: Arc::new(Semaphore::new(max_concurrent_builds)),
        }
    }

    /// Submit a build. Waits for a free slot, then returns while the
    /// build runs in the background.
    pub async fn submit(&self, spec: BuildSpec) {
        let Ok(permit) = self.slots.clone().acquire_owned().await else {
            // The semaphore is never closed while the executor is alive
            error!("Build slots closed, dropping build for {}", spec.deployment_id);
            return;
        };

        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            let _slot = permit;
            run_build(ctx, spec).await;
        });
    }
}

async fn run_build(ctx: Arc<WorkerContext>, spec: BuildSpec) {
    info!(
        deployment_id = %spec.deployment_id,
        image = %spec.image_name,
        "Starting build"
    );

    let built = ctx
        .docker
        .build(&spec.image_name, &spec.context_dir, &spec.dockerfile_path)
        .await;

    match built {
        Ok(()) => {
            let event = ResultEvent {
                deployment_id: spec.deployment_id.clone(),
                status: ResultStatus::Built,
            };
            if let Err(e) = ctx.results.publish(event).await {
                error!(deployment_id = %spec.deployment_id, "Failed to publish result event: {}", e);
            }

            if let Err(e) = ctx
                .store
                .update_status(&spec.deployment_id, DeploymentStatus::Built)
                .await
            {
                error!(deployment_id = %spec.deployment_id, "Failed to mark as built: {}", e);
            }

            // Entry removal also deletes the cloned workspace
            if let Err(e) = ctx.tracker.delete_entry(&spec.deployment_id).await {
                error!(deployment_id = %spec.deployment_id, "Failed to delete tracker entry: {}", e);
            }

            info!(deployment_id = %spec.deployment_id, "Build successful");
        }
        Err(e) => {
            // The tracker entry is kept; the `failed` status is what stops
            // the reconciler from resubmitting it
            error!(deployment_id = %spec.deployment_id, "Build failed: {}", e);
            if let Err(e) = ctx
                .store
                .update_status(&spec.deployment_id, DeploymentStatus::Failed)
                .await
            {
                error!(deployment_id = %spec.deployment_id, "Failed to mark as failed: {}", e);
            }
        }
    }
}
