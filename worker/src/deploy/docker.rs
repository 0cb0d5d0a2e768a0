//! Container engine collaborator

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::WorkerError;

/// A `hostPort:containerPort` mapping for `docker run -p`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub host: u16,
    pub container: u16,
}

/// Container engine boundary: build, run and teardown
#[async_trait]
pub trait DockerClient: Send + Sync {
    /// Build `image_name` from `context_dir` with `dockerfile_path`
    async fn build(
        &self,
        image_name: &str,
        context_dir: &Path,
        dockerfile_path: &Path,
    ) -> Result<(), WorkerError>;

    /// Start a detached container from `image_name`
    async fn run(
        &self,
        image_name: &str,
        container_name: &str,
        port: Option<PortMapping>,
    ) -> Result<(), WorkerError>;

    /// Whether any container with this image as ancestor is running
    async fn is_running(&self, image_name: &str) -> Result<bool, WorkerError>;

    /// Ids of all containers (running or not) with this image as ancestor
    async fn list_containers(&self, image_name: &str) -> Result<Vec<String>, WorkerError>;

    async fn stop_container(&self, container_id: &str) -> Result<(), WorkerError>;

    async fn remove_container(&self, container_id: &str) -> Result<(), WorkerError>;

    async fn remove_image(&self, image_name: &str) -> Result<(), WorkerError>;
}

/// `docker` CLI implementation
pub struct CliDockerClient;

impl CliDockerClient {
    async fn run_checked(&self, args: &[&str], what: &str) -> Result<(), WorkerError> {
        let status = Command::new("docker")
            .args(args)
            .status()
            .await
            .map_err(|e| WorkerError::ContainerError(format!("failed to run docker: {}", e)))?;

        if !status.success() {
            return Err(WorkerError::ContainerError(format!("{} failed", what)));
        }
        Ok(())
    }
}

#[async_trait]
impl DockerClient for CliDockerClient {
    async fn build(
        &self,
        image_name: &str,
        context_dir: &Path,
        dockerfile_path: &Path,
    ) -> Result<(), WorkerError> {
        info!(
            "Building image {} (context: {}, dockerfile: {})",
            image_name,
            context_dir.display(),
            dockerfile_path.display()
        );

        let status = Command::new("docker")
            .args(["build", "-t", image_name, "-f"])
            .arg(dockerfile_path)
            .arg(context_dir)
            .status()
            .await
            .map_err(|e| WorkerError::BuildError(format!("failed to run docker build: {}", e)))?;

        if !status.success() {
            return Err(WorkerError::BuildError(format!(
                "docker build failed for {}",
                image_name
            )));
        }

        info!("Image built: {}", image_name);
        Ok(())
    }

    async fn run(
        &self,
        image_name: &str,
        container_name: &str,
        port: Option<PortMapping>,
    ) -> Result<(), WorkerError> {
        let mut cmd = Command::new("docker");
        cmd.args(["run", "-d", "--name", container_name]);

        if let Some(mapping) = port {
            debug!(
                "Mapping host port {} to container port {} for {}",
                mapping.host, mapping.container, image_name
            );
            cmd.arg("-p")
                .arg(format!("{}:{}", mapping.host, mapping.container));
        }

        cmd.arg(image_name);

        // Capture combined output for useful failure logs
        let output = cmd
            .output()
            .await
            .map_err(|e| WorkerError::ContainerError(format!("failed to run docker run: {}", e)))?;

        if !output.status.success() {
            warn!(
                "docker run output for {}:\n{}",
                image_name,
                String::from_utf8_lossy(&output.stderr)
            );
            return Err(WorkerError::ContainerError(format!(
                "docker run failed for {}",
                image_name
            )));
        }

        info!("Started container {} from {}", container_name, image_name);
        Ok(())
    }

    async fn is_running(&self, image_name: &str) -> Result<bool, WorkerError> {
        let output = Command::new("docker")
            .args([
                "ps",
                "--filter",
                &format!("ancestor={}", image_name),
                "--format",
                "{{.ID}}",
            ])
            .output()
            .await
            .map_err(|e| WorkerError::ContainerError(format!("failed to run docker ps: {}", e)))?;

        if !output.status.success() {
            return Err(WorkerError::ContainerError(
                "docker ps failed".to_string(),
            ));
        }

        Ok(!String::from_utf8_lossy(&output.stdout).trim().is_empty())
    }

    async fn list_containers(&self, image_name: &str) -> Result<Vec<String>, WorkerError> {
        let output = Command::new("docker")
            .args(["ps", "-a", "-q", "--filter", &format!("ancestor={}", image_name)])
            .output()
            .await
            .map_err(|e| WorkerError::ContainerError(format!("failed to run docker ps: {}", e)))?;

        if !output.status.success() {
            return Err(WorkerError::ContainerError(format!(
                "failed to list containers for {}",
                image_name
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .split_whitespace()
            .map(str::to_string)
            .collect())
    }

    async fn stop_container(&self, container_id: &str) -> Result<(), WorkerError> {
        self.run_checked(&["stop", container_id], "docker stop").await
    }

    async fn remove_container(&self, container_id: &str) -> Result<(), WorkerError> {
        self.run_checked(&["rm", container_id], "docker rm").await
    }

    async fn remove_image(&self, image_name: &str) -> Result<(), WorkerError> {
        self.run_checked(&["rmi", "-f", image_name], "docker rmi").await
    }
}

/// Stop and remove every container for an image, best-effort.
///
/// One container's failure is logged and does not abort the others.
/// Returns the number of containers successfully removed.
pub async fn teardown_containers(
    docker: &dyn DockerClient,
    image_name: &str,
) -> Result<usize, WorkerError> {
    let containers = docker.list_containers(image_name).await?;
    if containers.is_empty() {
        debug!("No containers found for image {}", image_name);
        return Ok(0);
    }

    info!(
        "Found {} container(s) for image {}, stopping...",
        containers.len(),
        image_name
    );

    let mut removed = 0;
    for id in &containers {
        if let Err(e) = docker.stop_container(id).await {
            warn!("Failed to stop container {}: {}", id, e);
            continue;
        }
        if let Err(e) = docker.remove_container(id).await {
            warn!("Failed to remove container {}: {}", id, e);
            continue;
        }
        removed += 1;
    }
    Ok(removed)
}
