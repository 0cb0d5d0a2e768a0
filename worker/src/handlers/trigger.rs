//! Run controller
//!
//! Starts a container for a built deployment. Triggering a deployment
//! whose image already has a running container is a no-op.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::app::state::WorkerContext;
use crate::deploy::docker::PortMapping;
use crate::models::message::{JobMessage, ResultEvent, ResultStatus};
use crate::ports::PortError;
use crate::store::DeploymentStatus;
use crate::utils::{derive_container_name, parse_port};

pub async fn handle_trigger(ctx: Arc<WorkerContext>, msg: JobMessage) {
    info!(deployment_id = %msg.deployment_id, "Trigger received");

    let record = match ctx.store.read(&msg.deployment_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            error!(deployment_id = %msg.deployment_id, "No record for deployment");
            return;
        }
        Err(e) => {
            error!(deployment_id = %msg.deployment_id, "Failed to read record: {}", e);
            return;
        }
    };

    let Some(image_name) = record.image_name.clone() else {
        error!(deployment_id = %msg.deployment_id, "No image name recorded, cannot trigger");
        return;
    };

    // The persisted container port takes precedence over the one on the
    // message; host leases live in their own field
    let container_port = record.port.or_else(|| parse_port(&msg.port_number));

    // Idempotency guard: a second trigger is a no-op, not an error
    match ctx.docker.is_running(&image_name).await {
        Ok(true) => {
            warn!(deployment_id = %msg.deployment_id, "Container for {} is already running", image_name);
            return;
        }
        Ok(false) => {}
        Err(e) => {
            error!(deployment_id = %msg.deployment_id, "Failed to check container status: {}", e);
            return;
        }
    }

    // A lease from a previous run is stale once its container is gone;
    // return it before taking a new one so stop/start cycles cannot leak
    if let Some(stale) = record.host_port {
        match ctx.ports.release(stale) {
            Ok(()) | Err(PortError::NotInUse(_)) => {}
            Err(e) => warn!("Failed to release stale port {}: {}", stale, e),
        }
    }

    // Lease a host port when the container exposes one
    let mapping = match container_port {
        Some(container) => match ctx.ports.acquire() {
            Ok(host) => Some(PortMapping { host, container }),
            Err(e) => {
                error!(deployment_id = %msg.deployment_id, "Failed to lease host port: {}", e);
                if let Err(e) = ctx
                    .store
                    .update_status(&msg.deployment_id, DeploymentStatus::Failed)
                    .await
                {
                    error!(deployment_id = %msg.deployment_id, "Failed to mark as failed: {}", e);
                }
                return;
            }
        },
        None => None,
    };

    let container_name = derive_container_name(&ctx.image_namespace, &msg.deployment_id);

    match ctx.docker.run(&image_name, &container_name, mapping).await {
        Ok(()) => {
            // Last-run descriptor: the triggering repository name
            let leased = mapping.map(|m| m.host);
            if let Err(e) = ctx
                .store
                .record_run(&msg.deployment_id, &msg.repository, leased)
                .await
            {
                error!(deployment_id = %msg.deployment_id, "Failed to record run: {}", e);
            }
            info!(deployment_id = %msg.deployment_id, "Container started");

            let event = ResultEvent {
                deployment_id: msg.deployment_id.clone(),
                status: ResultStatus::Running,
            };
            if let Err(e) = ctx.results.publish(event).await {
                error!(deployment_id = %msg.deployment_id, "Failed to publish result event: {}", e);
            }
        }
        Err(e) => {
            error!(deployment_id = %msg.deployment_id, "Failed to start container: {}", e);

            // The lease was never persisted; return it to the pool
            if let Some(m) = mapping {
                if let Err(e) = ctx.ports.release(m.host) {
                    warn!("Failed to release port {}: {}", m.host, e);
                }
            }

            if let Err(e) = ctx
                .store
                .update_status(&msg.deployment_id, DeploymentStatus::Failed)
                .await
            {
                error!(deployment_id = %msg.deployment_id, "Failed to mark as failed: {}", e);
            }
        }
    }
}
