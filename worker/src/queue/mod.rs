//! Message queue transport

pub mod client;
pub mod topics;

pub use client::{BrokerAddress, InboundMessage, QueueClient, ResultPublisher, ResultSink};
