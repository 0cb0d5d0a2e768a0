//! Delete controller
//!
//! Tears down every container for the deployment's image, removes the
//! image, returns the port lease and deletes the record row. The tracker
//! is deliberately left alone; an in-flight clone or build for the same
//! id is not cancelled.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::app::state::WorkerContext;
use crate::deploy::docker::teardown_containers;
use crate::models::message::JobMessage;
use crate::ports::PortError;

pub async fn handle_delete(ctx: Arc<WorkerContext>, msg: JobMessage) {
    info!(deployment_id = %msg.deployment_id, "Delete received");

    let record = match ctx.store.read(&msg.deployment_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            warn!(deployment_id = %msg.deployment_id, "No record for deployment, nothing to delete");
            return;
        }
        Err(e) => {
            error!(deployment_id = %msg.deployment_id, "Failed to read record: {}", e);
            return;
        }
    };

    match &record.image_name {
        Some(image_name) => {
            if let Err(e) = teardown_containers(ctx.docker.as_ref(), image_name).await {
                warn!("Failed to stop containers for {}: {}", image_name, e);
            }
            if let Err(e) = ctx.docker.remove_image(image_name).await {
                warn!("Failed to remove image {}: {}", image_name, e);
            }
        }
        None => {
            warn!(deployment_id = %msg.deployment_id, "No image name recorded, skipping container teardown");
        }
    }

    // Return the host lease; `NotInUse` just means the container never
    // got as far as a run, which is fine to ignore.
    if let Some(port) = record.host_port {
        match ctx.ports.release(port) {
            Ok(()) | Err(PortError::NotInUse(_)) => {}
            Err(e) => debug!("Port release for {}: {}", port, e),
        }
    }

    if let Err(e) = ctx.store.delete(&msg.deployment_id).await {
        error!(deployment_id = %msg.deployment_id, "Failed to delete record: {}", e);
        return;
    }
    info!(deployment_id = %msg.deployment_id, "Deployment deleted");
}
