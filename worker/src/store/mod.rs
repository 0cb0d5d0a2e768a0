//! Persistent deployment status store

pub mod record;
pub mod status_store;

pub use record::{DeploymentRecord, DeploymentStatus};
pub use status_store::StatusStore;
