// Copyright 2025 Cowboy AI, LLC.

//! Revision-gated admission of inbound messages
//!
//! A message that references a composition, target composition or instance
//! at a revision this replica has not seen yet is held back and a resync
//! request goes out. Held messages are re-evaluated by
//! [`AdmissionGate::take_ready`], which the participant calls from a single
//! background task.

use crate::identifiers::{CompositionId, InstanceId};
use crate::messages::{MessageKind, ParticipantMessage, ResyncRequest};
use crate::publisher::MessagePublisher;
use crate::store::StateStore;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Key of a held message
///
/// A newer message with the same key replaces the held one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HoldKey {
    /// Message kind
    pub kind: MessageKind,
    /// Instance or composition the message is about
    pub entity_id: Uuid,
    /// Start phase or stage
    pub wave: i32,
}

impl HoldKey {
    /// Key for a message
    pub fn of(message: &ParticipantMessage) -> Self {
        Self {
            kind: message.kind(),
            entity_id: message.entity_id(),
            wave: message.wave(),
        }
    }
}

/// References a message still waits for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaleRefs {
    /// Composition not yet at the expected revision
    pub composition: Option<CompositionId>,
    /// Target composition not yet at the expected revision
    pub target: Option<CompositionId>,
    /// Instance not yet at the expected revision
    pub instance: Option<InstanceId>,
}

impl StaleRefs {
    /// Check if every reference is satisfied
    pub fn is_empty(&self) -> bool {
        self.composition.is_none() && self.target.is_none() && self.instance.is_none()
    }
}

/// Outcome of [`AdmissionGate::admit`]
#[derive(Debug)]
pub enum Admission {
    /// The message can be handled now
    Ready(ParticipantMessage),
    /// The message was held
    Deferred(HoldKey),
}

/// Holds messages until the revisions they reference are present
pub struct AdmissionGate {
    store: Arc<StateStore>,
    publisher: Arc<dyn MessagePublisher>,
    held: DashMap<HoldKey, ParticipantMessage>,
}

impl AdmissionGate {
    /// Create a gate over a store
    pub fn new(store: Arc<StateStore>, publisher: Arc<dyn MessagePublisher>) -> Self {
        Self {
            store,
            publisher,
            held: DashMap::new(),
        }
    }

    /// Admit a message or hold it back
    ///
    /// Satisfied revision expectations are cleared from the message, so a
    /// message that was admitted once is always admitted again. Every
    /// deferral sends exactly one resync request.
    pub fn admit(&self, mut message: ParticipantMessage) -> Admission {
        let stale = self.evaluate(&mut message);
        if stale.is_empty() {
            return Admission::Ready(message);
        }

        let key = HoldKey::of(&message);
        info!(
            kind = %key.kind,
            entity_id = %key.entity_id,
            message_id = %message.message_id(),
            "Holding message until referenced revisions arrive"
        );
        if self.held.insert(key, message).is_some() {
            debug!(kind = %key.kind, entity_id = %key.entity_id, "Replaced an older held message");
        }
        self.request_resync(stale);
        Admission::Deferred(key)
    }

    /// Remove and return every held message whose references are now satisfied
    ///
    /// Each held message is returned at most once.
    pub fn take_ready(&self) -> Vec<ParticipantMessage> {
        let keys: Vec<HoldKey> = self.held.iter().map(|entry| *entry.key()).collect();
        let mut ready = Vec::new();
        for key in keys {
            if let Some((_, message)) = self
                .held
                .remove_if_mut(&key, |_, message| self.evaluate(message).is_empty())
            {
                debug!(kind = %key.kind, entity_id = %key.entity_id, "Releasing held message");
                ready.push(message);
            }
        }
        ready
    }

    /// Number of held messages
    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    /// Check whether a message is held under `key`
    pub fn is_held(&self, key: &HoldKey) -> bool {
        self.held.contains_key(key)
    }

    fn evaluate(&self, message: &mut ParticipantMessage) -> StaleRefs {
        let refs = message.revision_refs();
        let mut stale = StaleRefs::default();

        if let Some((id, revision)) = refs.composition {
            if self.store.is_composition_current(&id, revision.as_ref()) {
                *revision = None;
            } else {
                stale.composition = Some(id);
            }
        }
        if let Some((id, revision)) = refs.target {
            if self.store.is_composition_current(&id, revision.as_ref()) {
                *revision = None;
            } else {
                stale.target = Some(id);
            }
        }
        if let Some((id, revision)) = refs.instance {
            if self.store.is_instance_current(&id, revision.as_ref()) {
                *revision = None;
            } else {
                stale.instance = Some(id);
            }
        }
        stale
    }

    fn request_resync(&self, stale: StaleRefs) {
        let request = ResyncRequest {
            participant_id: self.store.participant_id(),
            replica_id: self.store.replica_id(),
            composition_id: stale.composition,
            composition_target_id: stale.target,
            automation_composition_id: stale.instance,
            timestamp: Utc::now(),
        };
        if let Err(e) = self.publisher.send_resync_request(request) {
            warn!(error = %e, "Failed to send resync request");
        }
    }
}
