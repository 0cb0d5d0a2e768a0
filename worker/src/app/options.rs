//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use crate::queue::BrokerAddress;
use crate::workers::{consumer, reconciler};

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Broker address
    pub broker: BrokerAddress,

    /// Base directory for tracker, store and workspaces
    pub data_dir: PathBuf,

    /// Image namespace for derived image/container names
    pub image_namespace: String,

    /// Maximum concurrent image builds
    pub max_concurrent_builds: usize,

    /// Host port lease range
    pub min_port: u16,
    pub max_port: u16,

    /// Consumer worker options
    pub consumer: consumer::Options,

    /// Reconciler worker options
    pub reconciler: reconciler::Options,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            broker: BrokerAddress::default(),
            data_dir: PathBuf::from("./data"),
            image_namespace: "blacktree".to_string(),
            max_concurrent_builds: 2,
            min_port: 3000,
            max_port: 10000,
            consumer: consumer::Options::default(),
            reconciler: reconciler::Options::default(),
        }
    }
}

/// Lifecycle options for the worker
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}
