// Copyright 2025 Cowboy AI, LLC.

//! Outbound publisher seam
//!
//! The engine never performs I/O itself: every acknowledgement, status and
//! resync request goes through a [`MessagePublisher`]. Implementations must
//! not block; the NATS adapter queues messages for a background task.

use crate::errors::ParticipantResult;
use crate::messages::{
    CompositionAck, InstanceAck, OutboundMessage, ParticipantAck, ParticipantStatus, ResyncRequest,
};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Notify;

/// Publisher trait for everything a participant sends to the orchestrator
pub trait MessagePublisher: Send + Sync {
    /// Send an acknowledgement
    fn send_ack(&self, ack: ParticipantAck) -> ParticipantResult<()>;

    /// Send a status message
    fn send_status(&self, status: ParticipantStatus) -> ParticipantResult<()>;

    /// Ask the orchestrator to resend authoritative state
    fn send_resync_request(&self, request: ResyncRequest) -> ParticipantResult<()>;
}

/// Publisher that records every message, for tests and local runs
#[derive(Clone, Default)]
pub struct RecordingPublisher {
    published: Arc<RwLock<Vec<OutboundMessage>>>,
    notify: Arc<Notify>,
}

impl RecordingPublisher {
    /// Create an empty recording publisher
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, message: OutboundMessage) {
        self.published
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message);
        self.notify.notify_waiters();
    }

    /// Every message published so far, in order
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.published
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of messages published so far
    pub fn len(&self) -> usize {
        self.published
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Check if nothing was published
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every recorded message
    pub fn clear(&self) {
        self.published
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    /// Recorded instance acknowledgements
    pub fn instance_acks(&self) -> Vec<InstanceAck> {
        self.messages()
            .into_iter()
            .filter_map(|message| match message {
                OutboundMessage::InstanceAck(ack) => Some(ack),
                _ => None,
            })
            .collect()
    }

    /// Recorded composition acknowledgements
    pub fn composition_acks(&self) -> Vec<CompositionAck> {
        self.messages()
            .into_iter()
            .filter_map(|message| match message {
                OutboundMessage::CompositionAck(ack) => Some(ack),
                _ => None,
            })
            .collect()
    }

    /// Recorded status messages
    pub fn statuses(&self) -> Vec<ParticipantStatus> {
        self.messages()
            .into_iter()
            .filter_map(|message| match message {
                OutboundMessage::Status(status) => Some(status),
                _ => None,
            })
            .collect()
    }

    /// Recorded resync requests
    pub fn resync_requests(&self) -> Vec<ResyncRequest> {
        self.messages()
            .into_iter()
            .filter_map(|message| match message {
                OutboundMessage::ResyncRequest(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    /// Wait until at least `count` messages are recorded
    ///
    /// Returns `false` if the timeout elapses first.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            if self.len() >= count {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.len() >= count;
            }
        }
    }
}

impl MessagePublisher for RecordingPublisher {
    fn send_ack(&self, ack: ParticipantAck) -> ParticipantResult<()> {
        self.record(ack.into());
        Ok(())
    }

    fn send_status(&self, status: ParticipantStatus) -> ParticipantResult<()> {
        self.record(OutboundMessage::Status(status));
        Ok(())
    }

    fn send_resync_request(&self, request: ResyncRequest) -> ParticipantResult<()> {
        self.record(OutboundMessage::ResyncRequest(request));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn resync() -> ResyncRequest {
        ResyncRequest {
            participant_id: Uuid::new_v4(),
            replica_id: Uuid::new_v4(),
            composition_id: Some(Uuid::new_v4()),
            composition_target_id: None,
            automation_composition_id: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_recording_publisher_filters_by_kind() {
        let publisher = RecordingPublisher::new();
        assert!(publisher.is_empty());

        publisher.send_resync_request(resync()).unwrap();
        assert_eq!(publisher.len(), 1);
        assert_eq!(publisher.resync_requests().len(), 1);
        assert!(publisher.instance_acks().is_empty());

        publisher.clear();
        assert!(publisher.is_empty());
    }

    #[tokio::test]
    async fn test_wait_for_returns_when_message_arrives() {
        let publisher = RecordingPublisher::new();
        let sender = publisher.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            sender.send_resync_request(resync()).unwrap();
        });
        assert!(publisher.wait_for(1, Duration::from_secs(2)).await);
        assert!(!publisher.wait_for(2, Duration::from_millis(50)).await);
    }
}
