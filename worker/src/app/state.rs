//! Shared worker context
//!
//! One context object built at startup and passed by `Arc` to every
//! worker and handler; there is no process-global mutable state.

use std::path::PathBuf;
use std::sync::Arc;

use crate::deploy::{DockerClient, GitClient};
use crate::ports::PortAllocator;
use crate::queue::ResultSink;
use crate::store::StatusStore;
use crate::tracker::Tracker;

/// Long-lived handles shared by every pipeline stage
pub struct WorkerContext {
    /// Image namespace for derived image and container names
    pub image_namespace: String,

    /// Directory that holds cloned repository workspaces
    pub repos_dir: PathBuf,

    /// Persistent per-deployment record store
    pub store: Arc<StatusStore>,

    /// Cloned-not-yet-built tracker
    pub tracker: Arc<Tracker>,

    /// Host port leases
    pub ports: Arc<PortAllocator>,

    /// Source-control collaborator
    pub git: Arc<dyn GitClient>,

    /// Container engine collaborator
    pub docker: Arc<dyn DockerClient>,

    /// Outbound result events
    pub results: Arc<dyn ResultSink>,
}
