//! Error types for the blacktree worker

use thiserror::Error;

use crate::ports::PortError;

/// Main error type for the worker
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Queue error: {0}")]
    QueueError(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Clone error: {0}")]
    CloneError(String),

    #[error("Build error: {0}")]
    BuildError(String),

    #[error("Container error: {0}")]
    ContainerError(String),

    #[error("State error: {0}")]
    StateError(String),

    #[error("Port error: {0}")]
    PortError(#[from] PortError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for WorkerError {
    fn from(err: anyhow::Error) -> Self {
        WorkerError::Internal(err.to_string())
    }
}
