//! Settings file management

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;

/// Worker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Message broker configuration
    #[serde(default)]
    pub broker: BrokerSettings,

    /// Base directory for the tracker file, the status store and cloned
    /// repository workspaces
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Image namespace; image names are derived as
    /// `<namespace>/<repo-slug>-<short deployment id>`
    #[serde(default = "default_namespace")]
    pub image_namespace: String,

    /// Maximum number of concurrent image builds
    #[serde(default = "default_max_builds")]
    pub max_concurrent_builds: usize,

    /// Reconciliation interval in seconds
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,

    /// Host port range leased to containers
    #[serde(default)]
    pub ports: PortRangeSettings,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_namespace() -> String {
    "blacktree".to_string()
}

fn default_max_builds() -> usize {
    2
}

fn default_reconcile_interval() -> u64 {
    5
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            broker: BrokerSettings::default(),
            data_dir: default_data_dir(),
            image_namespace: default_namespace(),
            max_concurrent_builds: default_max_builds(),
            reconcile_interval_secs: default_reconcile_interval(),
            ports: PortRangeSettings::default(),
        }
    }
}

/// Message broker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerSettings {
    /// Broker host
    #[serde(default = "default_broker_host")]
    pub host: String,

    /// Broker port
    #[serde(default = "default_broker_port")]
    pub port: u16,

    /// Use TLS
    #[serde(default)]
    pub tls: bool,

    /// Optional path to a PEM-encoded CA certificate for broker TLS
    /// verification. When absent, the system certificate store is used.
    #[serde(default)]
    pub ca_cert_path: Option<String>,

    /// Optional broker credentials
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

fn default_broker_host() -> String {
    "localhost".to_string()
}

fn default_broker_port() -> u16 {
    1883
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            host: default_broker_host(),
            port: default_broker_port(),
            tls: false,
            ca_cert_path: None,
            username: None,
            password: None,
        }
    }
}

/// Host port range settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PortRangeSettings {
    #[serde(default = "default_min_port")]
    pub min_port: u16,

    #[serde(default = "default_max_port")]
    pub max_port: u16,
}

fn default_min_port() -> u16 {
    3000
}

fn default_max_port() -> u16 {
    10000
}

impl Default for PortRangeSettings {
    fn default() -> Self {
        Self {
            min_port: default_min_port(),
            max_port: default_max_port(),
        }
    }
}
