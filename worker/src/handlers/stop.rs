//! Stop controller
//!
//! Stops and removes every container for the deployment's stored image
//! name. Best-effort per container; one failure does not abort the rest.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::app::state::WorkerContext;
use crate::deploy::docker::teardown_containers;
use crate::models::message::JobMessage;
use crate::store::DeploymentStatus;

pub async fn handle_stop(ctx: Arc<WorkerContext>, msg: JobMessage) {
    info!(deployment_id = %msg.deployment_id, "Stop received");

    let record = match ctx.store.read(&msg.deployment_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            warn!(deployment_id = %msg.deployment_id, "No record for deployment, nothing to stop");
            return;
        }
        Err(e) => {
            error!(deployment_id = %msg.deployment_id, "Failed to read record: {}", e);
            return;
        }
    };

    let Some(image_name) = record.image_name else {
        warn!(deployment_id = %msg.deployment_id, "No image name recorded, nothing to stop");
        return;
    };

    match teardown_containers(ctx.docker.as_ref(), &image_name).await {
        Ok(removed) => {
            info!(
                deployment_id = %msg.deployment_id,
                "Stopped and removed {} container(s) for image {}",
                removed,
                image_name
            );

            if record.status == DeploymentStatus::Running {
                if let Err(e) = ctx
                    .store
                    .update_status(&msg.deployment_id, DeploymentStatus::Stopped)
                    .await
                {
                    error!(deployment_id = %msg.deployment_id, "Failed to mark as stopped: {}", e);
                }
            }
        }
        Err(e) => {
            error!(deployment_id = %msg.deployment_id, "Failed to stop containers for {}: {}", image_name, e);
        }
    }
}
