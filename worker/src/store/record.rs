//! Deployment record and its status state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Deployment status
///
/// Transitions only move forward; once a deployment has advanced past
/// `Cloned` it never returns there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    /// Repository cloned, waiting for a build
    Cloned,

    /// Build in progress
    Building,

    /// Image built, ready to run
    Built,

    /// A stage failed
    Failed,

    /// Container running
    Running,

    /// Containers stopped
    Stopped,
}

impl DeploymentStatus {
    /// Whether a transition to `next` is allowed.
    ///
    /// `Failed` is reachable from every state; nothing ever goes back to
    /// `Cloned`.
    pub fn can_advance_to(self, next: DeploymentStatus) -> bool {
        use DeploymentStatus::*;

        match (self, next) {
            (_, Cloned) => false,
            (_, Failed) => true,
            (Cloned, Building) => true,
            (Building, Built) => true,
            (Built, Running) => true,
            (Running, Stopped) => true,
            (Stopped, Running) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeploymentStatus::Cloned => "cloned",
            DeploymentStatus::Building => "building",
            DeploymentStatus::Built => "built",
            DeploymentStatus::Failed => "failed",
            DeploymentStatus::Running => "running",
            DeploymentStatus::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// The durable record for one deployment, keyed by deployment id
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub deployment_id: String,

    pub status: DeploymentStatus,

    /// `<namespace>/<repo-slug>-<short id>`; set at clone time, immutable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,

    /// Build context directory relative to the cloned workspace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_dir: Option<String>,

    /// Dockerfile path relative to the cloned workspace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compose_path: Option<String>,

    /// Last-run descriptor: the repository name carried on the trigger
    /// message, not the docker container id. Kept for parity with the
    /// backend's expectations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,

    /// Container port from the deploy request; set at clone, immutable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Leased host port from the latest run; cleared semantics are owned
    /// by the allocator, this is only the persisted lease
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_port: Option<u16>,

    pub created_at: DateTime<Utc>,

    /// Refreshed on every status transition
    pub updated_at: DateTime<Utc>,
}

impl DeploymentRecord {
    /// Create a fresh record in the given status
    pub fn new(deployment_id: impl Into<String>, status: DeploymentStatus) -> Self {
        let now = Utc::now();
        Self {
            deployment_id: deployment_id.into(),
            status,
            image_name: None,
            context_dir: None,
            dockerfile_path: None,
            compose_path: None,
            container_name: None,
            port: None,
            host_port: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        use DeploymentStatus::*;

        assert!(Cloned.can_advance_to(Building));
        assert!(Building.can_advance_to(Built));
        assert!(Built.can_advance_to(Running));
        assert!(Running.can_advance_to(Stopped));
        assert!(Stopped.can_advance_to(Running));
    }

    #[test]
    fn test_failed_reachable_from_anywhere() {
        use DeploymentStatus::*;

        for status in [Cloned, Building, Built, Failed, Running, Stopped] {
            assert!(status.can_advance_to(Failed));
        }
    }

    #[test]
    fn test_never_back_to_cloned() {
        use DeploymentStatus::*;

        for status in [Cloned, Building, Built, Failed, Running, Stopped] {
            assert!(!status.can_advance_to(Cloned));
        }
    }

    #[test]
    fn test_no_skipping_build() {
        use DeploymentStatus::*;

        assert!(!Cloned.can_advance_to(Built));
        assert!(!Cloned.can_advance_to(Running));
        assert!(!Building.can_advance_to(Running));
    }

    #[test]
    fn test_status_wire_format() {
        let encoded = serde_json::to_string(&DeploymentStatus::Building).unwrap();
        assert_eq!(encoded, "\"building\"");
    }
}
