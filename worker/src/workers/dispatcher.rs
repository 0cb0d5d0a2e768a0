//! Message dispatcher
//!
//! Routes each decoded job message to exactly one handler, spawned as an
//! independent task. Handlers are unbounded on purpose; only the build
//! stage is throttled, by the executor's semaphore.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::app::state::WorkerContext;
use crate::handlers::{clone, delete, stop, trigger};
use crate::models::message::{JobKind, JobMessage};

/// Route one message to its handler task
pub fn dispatch(ctx: Arc<WorkerContext>, msg: JobMessage) {
    match msg.kind {
        JobKind::Build => {
            tokio::spawn(clone::handle_clone(ctx, msg));
        }
        JobKind::Delete => {
            tokio::spawn(delete::handle_delete(ctx, msg));
        }
        JobKind::Trigger => {
            tokio::spawn(trigger::handle_trigger(ctx, msg));
        }
        JobKind::Stop => {
            tokio::spawn(stop::handle_stop(ctx, msg));
        }
        JobKind::Unknown => {
            warn!(deployment_id = %msg.deployment_id, "Unknown message type, dropping");
        }
    }
}

/// Run the dispatcher worker: drain the internal channel until shutdown
pub async fn run(
    ctx: Arc<WorkerContext>,
    mut rx: mpsc::Receiver<JobMessage>,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) {
    info!("Dispatcher worker starting...");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Dispatcher worker shutting down...");
                return;
            }
            received = rx.recv() => {
                match received {
                    Some(msg) => {
                        info!(deployment_id = %msg.deployment_id, kind = ?msg.kind, "Received message");
                        dispatch(ctx.clone(), msg);
                    }
                    None => {
                        info!("Message channel closed, dispatcher exiting");
                        return;
                    }
                }
            }
        }
    }
}
