//! Queue consumer worker
//!
//! Polls the broker, decodes job messages and hands them to the internal
//! channel. The ack is sent after the handoff, not after processing: a
//! crash between ack and the first durable write can drop a job
//! (at-least-once until ack, best-effort after).

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::models::message::JobMessage;
use crate::queue::QueueClient;
use crate::utils::{calc_exp_backoff, CooldownOptions};

/// Consumer worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// How long one consume call blocks before returning an empty poll
    pub poll_timeout: Duration,

    /// Backoff applied after transport errors
    pub cooldown: CooldownOptions,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(30),
            cooldown: CooldownOptions::default(),
        }
    }
}

/// Run the consumer worker until shutdown
pub async fn run(
    options: &Options,
    mut client: QueueClient,
    tx: mpsc::Sender<JobMessage>,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) {
    info!("Consumer worker starting...");

    let mut error_streak: u32 = 0;

    loop {
        let inbound = tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Consumer worker shutting down...");
                let _ = client.disconnect().await;
                return;
            }
            inbound = client.next_message(options.poll_timeout) => inbound,
        };

        let msg = match inbound {
            Ok(Some(msg)) => msg,
            Ok(None) => {
                // Empty poll, not an error
                continue;
            }
            Err(e) => {
                // The event loop reconnects on the next poll; back off so a
                // dead broker does not spin the loop
                error_streak += 1;
                let delay = calc_exp_backoff(&options.cooldown, error_streak);
                error!("Queue error: {}, retrying in {:?}", e, delay);
                tokio::time::sleep(delay).await;
                continue;
            }
        };
        error_streak = 0;

        let decoded: JobMessage = match msg.parse_json() {
            Ok(decoded) => decoded,
            Err(e) => {
                // Malformed payloads are acked so they are never
                // redelivered, then dropped
                warn!("Dropping malformed message: {}", e);
                if let Err(e) = client.ack(&msg).await {
                    error!("Failed to ack malformed message: {}", e);
                }
                continue;
            }
        };

        // Handoff is the ack boundary
        if tx.send(decoded).await.is_err() {
            info!("Message channel closed, consumer exiting");
            return;
        }
        if let Err(e) = client.ack(&msg).await {
            error!("Failed to ack message: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::BrokerAddress;

    fn require_send<T: Send>(value: T) -> T {
        value
    }

    // The consumer runs under tokio::spawn; its future must stay Send even
    // though the client's event loop is not Sync. Compile-time check.
    #[tokio::test]
    async fn test_run_future_is_spawnable() {
        let client = QueueClient::new(&BrokerAddress::default(), "consumer-test")
            .await
            .unwrap();
        let options = Options::default();
        let (tx, rx) = mpsc::channel::<JobMessage>(1);

        let fut = require_send(run(&options, client, tx, Box::pin(async {})));
        drop(fut);
        drop(rx);
    }
}
