// Copyright 2025 Cowboy AI, LLC.

//! Prime, deprime and sync of composition definitions

use super::HandlerContext;
use crate::executor::Operation;
use crate::messages::{
    CompositionAck, ParticipantAck, ParticipantDefinition, ParticipantDeprime, ParticipantPrime,
    ParticipantSync,
};
use crate::model::ElementDefinition;
use crate::state::{AcTypeState, StateChangeResult};
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Handles messages addressed to a composition definition
#[derive(Clone)]
pub struct DefinitionHandler {
    ctx: HandlerContext,
}

impl DefinitionHandler {
    /// Create a handler
    pub fn new(ctx: HandlerContext) -> Self {
        Self { ctx }
    }

    /// Store this participant's element definitions and prime them
    pub async fn handle_prime(&self, message: ParticipantPrime) {
        let list = own_definitions(self.ctx.store().participant_id(), message.participant_definition_updates);
        if list.is_empty() {
            debug!(composition_id = %message.composition_id, "Prime carries no definitions for this participant");
            return;
        }

        let store = self.ctx.store();
        store.put_definitions(message.composition_id, list, message.revision_id_composition);
        let view = store.with_definition_mut(&message.composition_id, |def| {
            def.state = AcTypeState::Priming;
            def.view()
        });
        if let Some(view) = view {
            info!(composition_id = %message.composition_id, "Priming composition");
            self.ctx
                .submit(message.message_id, Operation::Prime(view))
                .await;
        }
    }

    /// Deprime a composition, or acknowledge at once when it is unknown here
    pub async fn handle_deprime(&self, message: ParticipantDeprime) {
        let store = self.ctx.store();
        let view = store.with_definition_mut(&message.composition_id, |def| {
            def.state = AcTypeState::Depriming;
            def.view()
        });

        match view {
            Some(view) => {
                info!(composition_id = %message.composition_id, "Depriming composition");
                self.ctx
                    .submit(message.message_id, Operation::Deprime(view))
                    .await;
            }
            None => {
                debug!(composition_id = %message.composition_id, "Deprime of a composition not primed here");
                let ack = CompositionAck {
                    participant_id: store.participant_id(),
                    replica_id: store.replica_id(),
                    response_to: Some(message.message_id),
                    composition_id: message.composition_id,
                    composition_state: AcTypeState::Commissioned,
                    state_change_result: StateChangeResult::NoError,
                    result: true,
                    message: "Already deprimed or never primed".to_string(),
                    timestamp: Utc::now(),
                };
                if let Err(e) = self.ctx.publisher().send_ack(ParticipantAck::Composition(ack)) {
                    warn!(composition_id = %message.composition_id, error = %e, "Failed to send acknowledgement");
                }
            }
        }
    }

    /// Restore or delete a composition and its instances
    ///
    /// No element callback fires.
    pub fn handle_sync(&self, message: ParticipantSync) {
        let store = self.ctx.store();
        if message.exclude_replicas.contains(&store.replica_id()) {
            debug!(composition_id = %message.composition_id, "Sync excludes this replica");
            return;
        }

        if message.delete {
            if message.state == AcTypeState::Commissioned {
                store.remove_definition(&message.composition_id);
            }
            for restart in &message.automation_composition_list {
                store.remove_instance(&restart.automation_composition_id);
            }
            info!(composition_id = %message.composition_id,
                instances = message.automation_composition_list.len(), "Sync removed composition state");
            return;
        }

        let list = own_definitions(store.participant_id(), message.participant_definition_updates);
        if !list.is_empty() {
            store.put_definitions(message.composition_id, list, message.revision_id_composition);
            store.with_definition_mut(&message.composition_id, |def| def.state = message.state);
        }
        for restart in &message.automation_composition_list {
            store.restore_instance(message.composition_id, restart);
        }
        info!(composition_id = %message.composition_id,
            instances = message.automation_composition_list.len(), "Sync restored composition state");
    }
}

fn own_definitions(participant_id: Uuid, updates: Vec<ParticipantDefinition>) -> Vec<ElementDefinition> {
    updates
        .into_iter()
        .filter(|update| update.participant_id == participant_id)
        .flat_map(|update| update.element_definitions)
        .collect()
}
