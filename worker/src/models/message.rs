//! Job and result messages exchanged with the backend

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Kind of an inbound job message.
///
/// Unrecognized values decode to `Unknown` so a bad message is logged and
/// dropped instead of failing the whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Build,
    Delete,
    Trigger,
    Stop,
    #[serde(other)]
    Unknown,
}

/// A job message received from the backend queue
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMessage {
    #[serde(rename = "type")]
    pub kind: JobKind,

    pub deployment_id: String,

    pub repository: String,

    #[serde(default)]
    pub branch: String,

    /// Optional access token for private repositories; never logged
    #[serde(default)]
    pub token: Option<SecretString>,

    #[serde(default, rename = "dockerFilePath")]
    pub dockerfile_path: String,

    #[serde(default)]
    pub compose_file_path: String,

    #[serde(default)]
    pub context_dir: String,

    /// The container port, string-encoded; empty when the service exposes
    /// no port
    #[serde(default)]
    pub port_number: String,
}

/// Status carried on an outbound result event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Built,
    Running,
}

/// A result event published back to the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEvent {
    pub deployment_id: String,
    pub status: ResultStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_build_message() {
        let raw = r#"{
            "type": "build",
            "deploymentId": "dep-123",
            "repository": "https://github.com/vky5/RaktConnect.git",
            "branch": "main",
            "token": "secret-token",
            "dockerFilePath": "./Dockerfile",
            "composeFilePath": "",
            "contextDir": ".",
            "portNumber": "3000"
        }"#;

        let msg: JobMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.kind, JobKind::Build);
        assert_eq!(msg.deployment_id, "dep-123");
        assert_eq!(msg.port_number, "3000");
        assert!(msg.token.is_some());
    }

    #[test]
    fn test_unknown_kind_decodes() {
        let raw = r#"{"type": "restart", "deploymentId": "d", "repository": "r"}"#;
        let msg: JobMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.kind, JobKind::Unknown);
    }

    #[test]
    fn test_result_event_wire_format() {
        let event = ResultEvent {
            deployment_id: "dep-123".to_string(),
            status: ResultStatus::Built,
        };
        let encoded = serde_json::to_value(&event).unwrap();
        assert_eq!(encoded["deploymentId"], "dep-123");
        assert_eq!(encoded["status"], "built");
    }
}
