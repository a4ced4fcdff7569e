// Copyright 2025 Cowboy AI, LLC.

//! Deploy, undeploy and delete, one start phase at a time

use super::HandlerContext;
use crate::executor::{ElementOp, Operation};
use crate::messages::{AutomationCompositionDeploy, AutomationCompositionStateChange};
use crate::model::InstanceElementView;
use crate::state::{DeployOrder, DeployState, LockState, SubState};
use tracing::{debug, info, warn};

/// Handles the deploy family of instance messages
#[derive(Clone)]
pub struct DeployHandler {
    ctx: HandlerContext,
}

impl DeployHandler {
    /// Create a handler
    pub fn new(ctx: HandlerContext) -> Self {
        Self { ctx }
    }

    /// Deploy the elements of one start phase
    ///
    /// The first phase (re)creates the instance from the message.
    pub async fn handle_deploy(&self, message: AutomationCompositionDeploy) {
        if message.participant_updates.is_empty() {
            warn!(instance_id = %message.automation_composition_id, "Deploy carries no element updates");
            return;
        }
        let store = self.ctx.store();
        let instance_id = message.automation_composition_id;

        if message.start_phase == message.first_start_phase {
            store.initialize_instance(
                message.composition_id,
                instance_id,
                &message.participant_updates,
                DeployState::Deploying,
                SubState::None,
                message.revision_id_instance,
            );
        } else if store
            .with_instance_mut(&instance_id, |instance| instance.deploy_state = DeployState::Deploying)
            .is_none()
        {
            warn!(instance_id = %instance_id, start_phase = message.start_phase,
                "Deploy phase for an instance not initialised here");
            return;
        }

        let Some(instance) = store.get_instance(&instance_id) else {
            return;
        };
        let mut operations = Vec::new();
        for update in self.ctx.own_elements(&message.participant_updates) {
            let Some(element) = instance.elements.get(&update.id) else {
                continue;
            };
            if self.ctx.start_phase(&instance.composition_id, &element.definition) != message.start_phase {
                continue;
            }
            let mut instance_element = InstanceElementView::of(instance_id, element);
            instance_element.in_properties = update.properties.clone();
            operations.push(ElementOp {
                composition_element: store
                    .composition_element_view(&instance.composition_id, &element.definition),
                instance_element,
            });
        }

        let element_ids: Vec<_> = operations.iter().map(|op| op.instance_element.element_id).collect();
        store.with_instance_mut(&instance_id, |instance| {
            for id in &element_ids {
                if let Some(element) = instance.elements.get_mut(id) {
                    element.deploy_state = DeployState::Deploying;
                }
            }
        });

        info!(instance_id = %instance_id, start_phase = message.start_phase,
            elements = operations.len(), "Deploying instance phase");
        for op in operations {
            self.ctx.submit(message.message_id, Operation::Deploy(op)).await;
        }
    }

    /// Undeploy or delete the elements of one start phase
    pub async fn handle_state_change(&self, message: AutomationCompositionStateChange) {
        let store = self.ctx.store();
        let instance_id = message.automation_composition_id;

        if !store.contains_instance(&instance_id) {
            if message.deploy_order_state == DeployOrder::Delete {
                debug!(instance_id = %instance_id, "Delete of an instance unknown here");
                self.ctx.ack_instance_now(
                    message.message_id,
                    instance_id,
                    DeployState::Deleted,
                    LockState::None,
                    "Already deleted or never used",
                );
            } else {
                warn!(instance_id = %instance_id, order = %message.deploy_order_state,
                    "State change for an instance unknown here");
            }
            return;
        }

        let (instance_state, element_state) = match message.deploy_order_state {
            DeployOrder::Undeploy => (DeployState::Undeploying, DeployState::Undeploying),
            DeployOrder::Delete => (DeployState::Deleting, DeployState::Deleting),
            other => {
                warn!(instance_id = %instance_id, order = %other, "Unsupported deploy order in state change");
                return;
            }
        };

        let Some(instance) = store.with_instance_mut(&instance_id, |instance| {
            instance.deploy_state = instance_state;
            instance.clone()
        }) else {
            return;
        };
        // an instance whose migration failed runs on the target definitions
        let composition_id = instance
            .composition_target_id
            .unwrap_or(instance.composition_id);

        let selected = self
            .ctx
            .elements_in_phase(&instance, &composition_id, message.start_phase);
        let operations: Vec<ElementOp> = selected
            .iter()
            .map(|element| self.ctx.element_op(&composition_id, instance_id, element))
            .collect();
        store.with_instance_mut(&instance_id, |instance| {
            for op in &operations {
                if let Some(element) = instance.elements.get_mut(&op.instance_element.element_id) {
                    element.deploy_state = element_state;
                }
            }
        });

        info!(instance_id = %instance_id, order = %message.deploy_order_state,
            start_phase = message.start_phase, elements = operations.len(), "Changing instance deploy state");
        for op in operations {
            let operation = match message.deploy_order_state {
                DeployOrder::Delete => Operation::Delete(op),
                _ => Operation::Undeploy(op),
            };
            self.ctx.submit(message.message_id, operation).await;
        }
    }
}
