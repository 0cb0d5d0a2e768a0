//! Blacktree Worker - Entry Point
//!
//! Consumes deployment jobs from the backend queue, clones repositories,
//! builds images under a concurrency cap and runs, stops and deletes the
//! resulting containers.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use blacktree_worker::app::options::AppOptions;
use blacktree_worker::app::run::run;
use blacktree_worker::filesys::file::JsonFile;
use blacktree_worker::logs::{init_logging, LogOptions};
use blacktree_worker::queue::BrokerAddress;
use blacktree_worker::settings::Settings;
use blacktree_worker::utils::version_info;
use blacktree_worker::workers::reconciler;

use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        println!("{}", serde_json::to_string_pretty(&version).unwrap());
        return;
    }

    // Retrieve the settings file; defaults apply when it is missing
    let settings_path = cli_args
        .get("settings")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./settings.json"));
    let settings_file = JsonFile::new(&settings_path);
    let settings = if settings_file.exists().await {
        match settings_file.read::<Settings>().await {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Unable to read settings file {}: {}", settings_path.display(), e);
                return;
            }
        }
    } else {
        Settings::default()
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    if !settings_file.exists().await {
        warn!("Settings file {} not found, using defaults", settings_path.display());
    }

    // Run the worker
    let options = AppOptions {
        broker: BrokerAddress {
            host: settings.broker.host.clone(),
            port: settings.broker.port,
            use_tls: settings.broker.tls,
            ca_cert_path: settings.broker.ca_cert_path.clone(),
            username: settings.broker.username.clone(),
            password: settings.broker.password.clone(),
        },
        data_dir: settings.data_dir.clone(),
        image_namespace: settings.image_namespace.clone(),
        max_concurrent_builds: settings.max_concurrent_builds,
        min_port: settings.ports.min_port,
        max_port: settings.ports.max_port,
        reconciler: reconciler::Options {
            interval: std::time::Duration::from_secs(settings.reconcile_interval_secs),
        },
        ..Default::default()
    };

    info!("Running blacktree worker v{}", version.version);
    if let Err(e) = run(options, await_shutdown_signal()).await {
        error!("Failed to run the worker: {e}");
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).unwrap();
        let mut sigint = signal(SignalKind::interrupt()).unwrap();

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("Ctrl+C received, shutting down...");
    }
}
