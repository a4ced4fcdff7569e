// Copyright 2025 Cowboy AI, LLC.

//! Protocol handlers
//!
//! One handler per message family. A handler sets the in-progress state on
//! the live instance first, then submits one [`Operation`] per element that
//! takes part in the current phase or stage. Handlers never return errors:
//! every path ends in a log line, a published acknowledgement or a submitted
//! operation.

pub mod definition;
pub mod deploy;
pub mod lock;
pub mod migration;
pub mod substate;
pub mod update;

pub use definition::DefinitionHandler;
pub use deploy::DeployHandler;
pub use lock::LockHandler;
pub use migration::MigrationHandler;
pub use substate::SubStateHandler;
pub use update::UpdateHandler;

use crate::aggregator::StateAggregator;
use crate::executor::{ConcurrentExecutor, ElementOp, Operation};
use crate::identifiers::{CompositionId, DefinitionId, InstanceId, MessageId};
use crate::messages::{AcElementDeploy, InstanceAck, ParticipantAck, ParticipantDeploy};
use crate::model::{Element, Instance, InstanceElementView};
use crate::properties::{find_start_phase, PropertyMap};
use crate::publisher::MessagePublisher;
use crate::state::{DeployState, ElementState, LockState, StateChangeResult};
use crate::store::StateStore;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, warn};

/// Shared collaborators of every handler
#[derive(Clone)]
pub struct HandlerContext {
    store: Arc<StateStore>,
    aggregator: Arc<StateAggregator>,
    executor: Arc<ConcurrentExecutor>,
    publisher: Arc<dyn MessagePublisher>,
}

impl HandlerContext {
    /// Bundle the collaborators
    pub fn new(
        store: Arc<StateStore>,
        aggregator: Arc<StateAggregator>,
        executor: Arc<ConcurrentExecutor>,
        publisher: Arc<dyn MessagePublisher>,
    ) -> Self {
        Self {
            store,
            aggregator,
            executor,
            publisher,
        }
    }

    /// State store
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// State aggregator
    pub fn aggregator(&self) -> &Arc<StateAggregator> {
        &self.aggregator
    }

    /// Executor
    pub fn executor(&self) -> &Arc<ConcurrentExecutor> {
        &self.executor
    }

    /// Outbound publisher
    pub fn publisher(&self) -> &Arc<dyn MessagePublisher> {
        &self.publisher
    }

    pub(crate) async fn submit(&self, message_id: MessageId, operation: Operation) {
        let name = operation.name();
        let key = operation.key();
        if let Err(e) = self.executor.submit(message_id, operation).await {
            error!(key = %key, operation = name, error = %e, "Failed to submit element operation");
        }
    }

    /// Elements of `participant_updates` assigned to this participant
    pub(crate) fn own_elements<'a>(
        &self,
        participant_updates: &'a [ParticipantDeploy],
    ) -> Vec<&'a AcElementDeploy> {
        let participant_id = self.store.participant_id();
        participant_updates
            .iter()
            .filter(|update| update.participant_id == participant_id)
            .flat_map(|update| update.ac_element_list.iter())
            .collect()
    }

    /// Declared properties of a definition, empty when the definition is unknown
    pub(crate) fn common_properties(
        &self,
        composition_id: &CompositionId,
        definition_id: &DefinitionId,
    ) -> PropertyMap {
        match self.store.common_properties(composition_id, definition_id) {
            Ok(properties) => properties,
            Err(e) => {
                warn!(composition_id = %composition_id, definition_id = %definition_id, error = %e,
                    "Element definition not primed on this participant");
                PropertyMap::new()
            }
        }
    }

    /// Declared start phase of a definition
    pub(crate) fn start_phase(&self, composition_id: &CompositionId, definition_id: &DefinitionId) -> i32 {
        find_start_phase(&self.common_properties(composition_id, definition_id))
    }

    /// Views of one element for a single-element operation
    pub(crate) fn element_op(&self, composition_id: &CompositionId, instance_id: InstanceId, element: &Element) -> ElementOp {
        ElementOp {
            composition_element: self
                .store
                .composition_element_view(composition_id, &element.definition),
            instance_element: InstanceElementView::of(instance_id, element),
        }
    }

    /// Elements of `instance` whose declared start phase is `start_phase`
    pub(crate) fn elements_in_phase<'a>(
        &self,
        instance: &'a Instance,
        composition_id: &CompositionId,
        start_phase: i32,
    ) -> Vec<&'a Element> {
        instance
            .elements
            .values()
            .filter(|element| self.start_phase(composition_id, &element.definition) == start_phase)
            .collect()
    }

    /// Acknowledge an instance message straight away, without running anything
    pub(crate) fn ack_instance_now(
        &self,
        message_id: MessageId,
        instance_id: InstanceId,
        deploy_state: DeployState,
        lock_state: LockState,
        message: &str,
    ) {
        let ack = InstanceAck {
            participant_id: self.store.participant_id(),
            replica_id: self.store.replica_id(),
            response_to: Some(message_id),
            automation_composition_id: instance_id,
            deploy_state,
            lock_state,
            result: true,
            state_change_result: StateChangeResult::NoError,
            message: message.to_string(),
            automation_composition_result_map: BTreeMap::new(),
            timestamp: Utc::now(),
        };
        if let Err(e) = self.publisher.send_ack(ParticipantAck::Instance(ack)) {
            warn!(instance_id = %instance_id, error = %e, "Failed to send acknowledgement");
        }
    }
}

/// Lock state for an element joining `instance`: that of its first sibling
/// still in place, `LOCKED` when there is none
pub(crate) fn sibling_lock_state(instance: &Instance) -> LockState {
    instance
        .elements
        .values()
        .find(|element| element.migration_state != ElementState::Removed)
        .map_or(LockState::Locked, |element| element.lock_state)
}
