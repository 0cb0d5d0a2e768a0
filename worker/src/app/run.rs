//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::WorkerContext;
use crate::deploy::{CliDockerClient, CliGitClient};
use crate::errors::WorkerError;
use crate::filesys::file::JsonFile;
use crate::ports::PortAllocator;
use crate::queue::QueueClient;
use crate::store::StatusStore;
use crate::tracker::Tracker;
use crate::workers::builder::BuildExecutor;
use crate::workers::{consumer, dispatcher, reconciler};

/// Run the worker
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), WorkerError> {
    info!("Initializing blacktree worker...");

    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(options.lifecycle.clone());

    if let Err(e) = init(&options, shutdown_tx.clone(), &mut shutdown_manager).await {
        error!("Failed to start worker: {}", e);
        shutdown_manager.shutdown(&shutdown_tx).await?;
        return Err(e);
    }

    tokio::select! {
        _ = shutdown_signal => {
            info!("Shutdown signal received, shutting down...");
        }
    }

    shutdown_manager.shutdown(&shutdown_tx).await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), WorkerError> {
    // Data directory first; nothing works without it
    tokio::fs::create_dir_all(&options.data_dir).await?;

    // Broker connectivity is fatal at startup: there is no useful
    // degraded mode for a queue-driven worker
    info!("Connecting to the broker...");
    let queue = QueueClient::new(&options.broker, "blacktree-worker").await?;
    queue.subscribe_jobs().await?;
    info!("Connected successfully");

    let ctx = Arc::new(WorkerContext {
        image_namespace: options.image_namespace.clone(),
        repos_dir: options.data_dir.join("repos"),
        store: Arc::new(StatusStore::new(JsonFile::new(
            options.data_dir.join("deployments.json"),
        ))),
        tracker: Arc::new(Tracker::new(
            JsonFile::new(options.data_dir.join("repos.json")),
            options.data_dir.join("repos"),
        )),
        ports: Arc::new(PortAllocator::new(options.min_port, options.max_port)),
        git: Arc::new(CliGitClient),
        docker: Arc::new(CliDockerClient),
        results: Arc::new(queue.publisher()),
    });

    let executor = Arc::new(BuildExecutor::new(ctx.clone(), options.max_concurrent_builds));

    // Consumer -> dispatcher handoff; unbuffered-equivalent so the
    // consumer waits until the dispatcher takes each message
    let (tx, rx) = mpsc::channel(1);

    let consumer_options = options.consumer.clone();
    let mut consumer_shutdown = shutdown_tx.subscribe();
    let consumer_handle = tokio::spawn(async move {
        consumer::run(
            &consumer_options,
            queue,
            tx,
            Box::pin(async move {
                let _ = consumer_shutdown.recv().await;
            }),
        )
        .await;
    });
    shutdown_manager.with_consumer_handle(consumer_handle)?;

    let dispatcher_ctx = ctx.clone();
    let mut dispatcher_shutdown = shutdown_tx.subscribe();
    let dispatcher_handle = tokio::spawn(async move {
        dispatcher::run(
            dispatcher_ctx,
            rx,
            Box::pin(async move {
                let _ = dispatcher_shutdown.recv().await;
            }),
        )
        .await;
    });
    shutdown_manager.with_dispatcher_handle(dispatcher_handle)?;

    let reconciler_options = options.reconciler.clone();
    let reconciler_ctx = ctx.clone();
    let mut reconciler_shutdown = shutdown_tx.subscribe();
    let reconciler_handle = tokio::spawn(async move {
        reconciler::run(
            &reconciler_options,
            reconciler_ctx,
            executor,
            |wait| tokio::time::sleep(wait),
            Box::pin(async move {
                let _ = reconciler_shutdown.recv().await;
            }),
        )
        .await;
    });
    shutdown_manager.with_reconciler_handle(reconciler_handle)?;

    Ok(())
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    lifecycle_options: LifecycleOptions,
    consumer_handle: Option<JoinHandle<()>>,
    dispatcher_handle: Option<JoinHandle<()>>,
    reconciler_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    fn new(lifecycle_options: LifecycleOptions) -> Self {
        Self {
            lifecycle_options,
            consumer_handle: None,
            dispatcher_handle: None,
            reconciler_handle: None,
        }
    }

    fn with_consumer_handle(&mut self, handle: JoinHandle<()>) -> Result<(), WorkerError> {
        if self.consumer_handle.is_some() {
            return Err(WorkerError::ShutdownError("consumer_handle already set".to_string()));
        }
        self.consumer_handle = Some(handle);
        Ok(())
    }

    fn with_dispatcher_handle(&mut self, handle: JoinHandle<()>) -> Result<(), WorkerError> {
        if self.dispatcher_handle.is_some() {
            return Err(WorkerError::ShutdownError("dispatcher_handle already set".to_string()));
        }
        self.dispatcher_handle = Some(handle);
        Ok(())
    }

    fn with_reconciler_handle(&mut self, handle: JoinHandle<()>) -> Result<(), WorkerError> {
        if self.reconciler_handle.is_some() {
            return Err(WorkerError::ShutdownError("reconciler_handle already set".to_string()));
        }
        self.reconciler_handle = Some(handle);
        Ok(())
    }

    async fn shutdown(&mut self, shutdown_tx: &broadcast::Sender<()>) -> Result<(), WorkerError> {
        let _ = shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}",
                    self.lifecycle_options.max_shutdown_delay
                );
                Err(WorkerError::ShutdownError("graceful shutdown timed out".to_string()))
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), WorkerError> {
        info!("Shutting down blacktree worker...");

        // 1. Consumer (stops new messages coming in)
        if let Some(handle) = self.consumer_handle.take() {
            handle.await.map_err(|e| WorkerError::ShutdownError(e.to_string()))?;
        }

        // 2. Dispatcher
        if let Some(handle) = self.dispatcher_handle.take() {
            handle.await.map_err(|e| WorkerError::ShutdownError(e.to_string()))?;
        }

        // 3. Reconciler
        if let Some(handle) = self.reconciler_handle.take() {
            handle.await.map_err(|e| WorkerError::ShutdownError(e.to_string()))?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
