//! Broker client
//!
//! Thin wrapper over rumqttc: manual acks, a consume timeout treated as an
//! empty poll, and a cloneable publisher handle for result events. The
//! wire protocol stays behind this module; everything above it deals in
//! `JobMessage` / `ResultEvent`.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, Publish, QoS};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::errors::WorkerError;
use crate::models::message::ResultEvent;
use crate::queue::topics;

/// Broker address
#[derive(Debug, Clone)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    /// Optional path to a PEM-encoded CA certificate for broker
    /// verification. When `None` and `use_tls` is `true`, the system
    /// certificate store is used.
    pub ca_cert_path: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for BrokerAddress {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            use_tls: false,
            ca_cert_path: None,
            username: None,
            password: None,
        }
    }
}

/// Where result events go. Implemented by the broker publisher; tests
/// substitute a collector.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn publish(&self, event: ResultEvent) -> Result<(), WorkerError>;
}

/// Queue client wrapper
pub struct QueueClient {
    client: AsyncClient,
    eventloop: EventLoop,
}

impl QueueClient {
    /// Connect to the broker
    pub async fn new(address: &BrokerAddress, client_id: &str) -> Result<Self, WorkerError> {
        if address.host.is_empty() {
            return Err(WorkerError::QueueError("broker host is not configured".to_string()));
        }

        let mut options = MqttOptions::new(client_id, &address.host, address.port);
        options.set_keep_alive(Duration::from_secs(30));
        options.set_manual_acks(true);
        options.set_clean_session(false);

        if let (Some(user), Some(pass)) = (&address.username, &address.password) {
            options.set_credentials(user, pass);
        }

        if address.use_tls {
            use rumqttc::{TlsConfiguration, Transport};
            use rustls::ClientConfig;
            use std::sync::Arc;

            let mut root_cert_store = rustls::RootCertStore::empty();

            if let Some(ref ca_path) = address.ca_cert_path {
                let ca_pem = std::fs::read(ca_path).map_err(|e| {
                    WorkerError::QueueError(format!("Failed to read CA cert {ca_path}: {e}"))
                })?;
                let mut cursor = std::io::Cursor::new(ca_pem);
                for cert in rustls_pemfile::certs(&mut cursor).flatten() {
                    let _ = root_cert_store.add(cert);
                }
            } else {
                for cert in rustls_native_certs::load_native_certs().unwrap_or_default() {
                    let _ = root_cert_store.add(cert);
                }
            }

            let client_config = ClientConfig::builder()
                .with_root_certificates(root_cert_store)
                .with_no_client_auth();

            options.set_transport(Transport::tls_with_config(TlsConfiguration::Rustls(
                Arc::new(client_config),
            )));
        }

        let (client, eventloop) = AsyncClient::new(options, 10);

        Ok(Self { client, eventloop })
    }

    /// Subscribe to the job topic
    pub async fn subscribe_jobs(&self) -> Result<(), WorkerError> {
        self.client
            .subscribe(topics::EXECUTE_TOPIC, QoS::AtLeastOnce)
            .await
            .map_err(|e| WorkerError::QueueError(e.to_string()))?;
        info!("Subscribed to: {}", topics::EXECUTE_TOPIC);
        Ok(())
    }

    /// Wait for the next inbound message.
    ///
    /// Returns `Ok(None)` when `timeout` elapses with nothing delivered;
    /// an empty poll is not an error.
    pub async fn next_message(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<InboundMessage>, WorkerError> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let event = match tokio::time::timeout_at(deadline, self.eventloop.poll()).await {
                Ok(event) => event,
                Err(_) => {
                    debug!("No message received in time");
                    return Ok(None);
                }
            };

            match event {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    debug!("Received message on topic: {}", publish.topic);
                    return Ok(Some(InboundMessage { publish }));
                }
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("Broker connected");
                }
                Ok(Event::Incoming(Packet::SubAck(_))) => {
                    debug!("Subscription acknowledged");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Broker poll error: {}", e);
                    return Err(WorkerError::QueueError(e.to_string()));
                }
            }
        }
    }

    /// Acknowledge a delivered message. Called once the decoded message
    /// has been handed to the processing channel, or to drop a malformed
    /// payload without redelivery.
    ///
    /// Takes `&mut self`: the event loop makes a shared `QueueClient`
    /// borrow non-`Send`, and the consumer task owns the client anyway.
    pub async fn ack(&mut self, msg: &InboundMessage) -> Result<(), WorkerError> {
        self.client
            .ack(&msg.publish)
            .await
            .map_err(|e| WorkerError::QueueError(e.to_string()))
    }

    /// A cloneable handle for publishing result events
    pub fn publisher(&self) -> ResultPublisher {
        ResultPublisher {
            client: self.client.clone(),
        }
    }

    /// Disconnect from the broker
    pub async fn disconnect(&mut self) -> Result<(), WorkerError> {
        self.client
            .disconnect()
            .await
            .map_err(|e| WorkerError::QueueError(e.to_string()))?;
        info!("Broker disconnected");
        Ok(())
    }
}

/// An undecoded inbound delivery
pub struct InboundMessage {
    publish: Publish,
}

impl InboundMessage {
    /// Parse the payload as JSON
    pub fn parse_json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, WorkerError> {
        serde_json::from_slice(&self.publish.payload)
            .map_err(|e| WorkerError::DecodeError(e.to_string()))
    }
}

/// Publishes result events to the result topic
#[derive(Clone)]
pub struct ResultPublisher {
    client: AsyncClient,
}

#[async_trait]
impl ResultSink for ResultPublisher {
    async fn publish(&self, event: ResultEvent) -> Result<(), WorkerError> {
        let payload = serde_json::to_vec(&event)?;
        self.client
            .publish(topics::RESULT_TOPIC, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| WorkerError::QueueError(e.to_string()))?;
        debug!(deployment_id = %event.deployment_id, "Published result event");
        Ok(())
    }
}
