// Copyright 2025 Cowboy AI, LLC.

//! Prepare and review, the sub-state protocols

use super::HandlerContext;
use crate::executor::{ElementOp, Operation};
use crate::messages::AutomationCompositionPrepare;
use crate::model::InstanceElementView;
use crate::properties::find_stage_set_prepare;
use crate::state::{DeployState, SubState};
use tracing::{info, warn};

/// Handles prepare messages, with and without `preDeploy`
#[derive(Clone)]
pub struct SubStateHandler {
    ctx: HandlerContext,
}

impl SubStateHandler {
    /// Create a handler
    pub fn new(ctx: HandlerContext) -> Self {
        Self { ctx }
    }

    /// Route to prepare or review
    pub async fn handle_prepare(&self, message: AutomationCompositionPrepare) {
        if message.pre_deploy {
            self.prepare(message).await;
        } else {
            self.review(message).await;
        }
    }

    async fn prepare(&self, message: AutomationCompositionPrepare) {
        let instance_id = message.automation_composition_id;
        let updates = self.ctx.own_elements(&message.participant_list);
        if updates.is_empty() {
            warn!(instance_id = %instance_id, "Prepare carries no elements for this participant");
            return;
        }
        let store = self.ctx.store();

        if message.stage == 0 || !store.contains_instance(&instance_id) {
            store.initialize_instance(
                message.composition_id,
                instance_id,
                &message.participant_list,
                DeployState::Undeployed,
                SubState::Preparing,
                message.revision_id_instance,
            );
        }
        let Some(instance) = store.with_instance_mut(&instance_id, |instance| {
            instance.sub_state = SubState::Preparing;
            instance.clone()
        }) else {
            return;
        };

        let mut operations = Vec::new();
        for update in updates {
            let Some(element) = instance.elements.get(&update.id) else {
                continue;
            };
            let stages = find_stage_set_prepare(
                &self.ctx.common_properties(&instance.composition_id, &element.definition),
            );
            if !stages.contains(&message.stage) {
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
        store.with_instance_mut(&instance_id, |instance| {
            for op in &operations {
                if let Some(element) = instance.elements.get_mut(&op.instance_element.element_id) {
                    element.sub_state = SubState::Preparing;
                }
            }
        });

        info!(instance_id = %instance_id, stage = message.stage, elements = operations.len(),
            "Preparing instance stage");
        for op in operations {
            self.ctx
                .submit(message.message_id, Operation::Prepare(op, message.stage))
                .await;
        }
    }

    async fn review(&self, message: AutomationCompositionPrepare) {
        let instance_id = message.automation_composition_id;
        let Some(instance) = self.ctx.store().with_instance_mut(&instance_id, |instance| {
            instance.sub_state = SubState::Reviewing;
            for element in instance.elements.values_mut() {
                element.sub_state = SubState::Reviewing;
            }
            instance.clone()
        }) else {
            warn!(instance_id = %instance_id, "Review for an instance unknown here");
            return;
        };

        info!(instance_id = %instance_id, elements = instance.elements.len(), "Reviewing instance");
        for element in instance.elements.values() {
            let op = self.ctx.element_op(&instance.composition_id, instance_id, element);
            self.ctx.submit(message.message_id, Operation::Review(op)).await;
        }
    }
}
