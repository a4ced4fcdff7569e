// Copyright 2025 Cowboy AI, LLC.

//! Infrastructure layer
//!
//! NATS connection, outbound publisher and inbound listener loop. The engine
//! itself never depends on this module except for the configuration type.

pub mod nats_client;
pub mod nats_transport;

pub use nats_client::{NatsClient, NatsConfig};
pub use nats_transport::{decode, encode, run_listener, NatsPublisher};

use thiserror::Error;

/// Errors raised by the NATS transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to establish connection to NATS server
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to subscribe to the listen subject
    #[error("Subscribe failed: {0}")]
    SubscribeFailed(String),
}
