// Copyright 2025 Cowboy AI, LLC.

//! Participant messages over NATS
//!
//! Outbound messages are queued on an unbounded channel and published by a
//! background task, so [`MessagePublisher`] calls never wait on the network.

use super::nats_client::NatsClient;
use super::TransportError;
use crate::errors::{ParticipantError, ParticipantResult};
use crate::messages::{OutboundMessage, ParticipantAck, ParticipantMessage, ParticipantStatus, ResyncRequest};
use crate::participant::Participant;
use crate::publisher::MessagePublisher;
use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Publishes outbound participant messages as JSON on one subject
#[derive(Debug, Clone)]
pub struct NatsPublisher {
    queue: mpsc::UnboundedSender<OutboundMessage>,
}

impl NatsPublisher {
    /// Start the publishing task on the client's publish subject
    pub fn start(client: &NatsClient) -> (Self, JoinHandle<()>) {
        let (queue, mut outbound) = mpsc::unbounded_channel::<OutboundMessage>();
        let nats = client.client().clone();
        let subject = client.config().publish_subject.clone();

        let task = tokio::spawn(async move {
            while let Some(message) = outbound.recv().await {
                let payload = match encode(&message) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(error = %e, "Dropping outbound message that failed to serialize");
                        continue;
                    }
                };
                if let Err(e) = nats.publish(subject.clone(), payload).await {
                    warn!(subject = %subject, error = %e, "Failed to publish outbound message");
                }
            }
            debug!("Outbound queue closed");
        });
        (Self { queue }, task)
    }

    fn enqueue(&self, message: OutboundMessage) -> ParticipantResult<()> {
        self.queue
            .send(message)
            .map_err(|_| ParticipantError::Publish("outbound queue closed".to_string()))
    }
}

impl MessagePublisher for NatsPublisher {
    fn send_ack(&self, ack: ParticipantAck) -> ParticipantResult<()> {
        self.enqueue(ack.into())
    }

    fn send_status(&self, status: ParticipantStatus) -> ParticipantResult<()> {
        self.enqueue(OutboundMessage::Status(status))
    }

    fn send_resync_request(&self, request: ResyncRequest) -> ParticipantResult<()> {
        self.enqueue(OutboundMessage::ResyncRequest(request))
    }
}

/// Serialize an outbound message to its JSON wire form
pub fn encode(message: &OutboundMessage) -> ParticipantResult<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(message)?))
}

/// Parse an inbound participant message from its JSON wire form
pub fn decode(payload: &[u8]) -> ParticipantResult<ParticipantMessage> {
    Ok(serde_json::from_slice(payload)?)
}

/// Feed every message on the listen subject to the participant
///
/// Undecodable payloads are logged and skipped. Returns when the
/// subscription ends.
pub async fn run_listener(client: &NatsClient, participant: Arc<Participant>) -> Result<(), TransportError> {
    let subject = client.config().listen_subject.clone();
    let mut subscriber = client
        .client()
        .subscribe(subject.clone())
        .await
        .map_err(|e| TransportError::SubscribeFailed(format!("{subject}: {e}")))?;
    info!(subject = %subject, "Listening for participant messages");

    while let Some(message) = subscriber.next().await {
        match decode(&message.payload) {
            Ok(decoded) => participant.dispatch(decoded).await,
            Err(e) => warn!(subject = %message.subject, error = %e, "Skipping undecodable participant message"),
        }
    }
    info!(subject = %subject, "Participant subscription ended");
    Ok(())
}
