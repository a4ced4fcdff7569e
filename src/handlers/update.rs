// Copyright 2025 Cowboy AI, LLC.

//! Property updates of deployed elements

use super::{sibling_lock_state, HandlerContext};
use crate::executor::{ElementOp, Operation};
use crate::messages::PropertiesUpdate;
use crate::model::{Element, InstanceElementView};
use crate::properties::{deep_merge, merged, PropertyMap};
use crate::state::{DeployState, ElementState};
use std::collections::HashSet;
use tracing::{info, warn};

/// Handles property updates
///
/// The update is deep-merged into the elements the instance already has.
/// Elements new to the instance are created from the message and elements the
/// message no longer lists are dropped from the instance.
#[derive(Clone)]
pub struct UpdateHandler {
    ctx: HandlerContext,
}

impl UpdateHandler {
    /// Create a handler
    pub fn new(ctx: HandlerContext) -> Self {
        Self { ctx }
    }

    /// Merge new properties and run the update callbacks
    pub async fn handle_update(&self, message: PropertiesUpdate) {
        let instance_id = message.automation_composition_id;
        let updates = self.ctx.own_elements(&message.participant_updates);
        if updates.is_empty() {
            warn!(instance_id = %instance_id, "Properties update carries no element updates");
            return;
        }

        let store = self.ctx.store();
        let participant_id = store.participant_id();
        let Some(before) = store.with_instance_mut(&instance_id, |instance| {
            let before = instance.clone();
            let lock_state = sibling_lock_state(instance);
            instance.deploy_state = DeployState::Updating;
            for update in &updates {
                match instance.elements.get_mut(&update.id) {
                    Some(element) => {
                        deep_merge(&mut element.properties, &update.properties);
                        element.deploy_state = DeployState::Updating;
                    }
                    None => {
                        let mut element = Element::new(update.id, update.definition.clone(), participant_id);
                        element.properties = merged(&PropertyMap::new(), &update.properties);
                        element.deploy_state = DeployState::Updating;
                        element.lock_state = lock_state;
                        instance.elements.insert(update.id, element);
                    }
                }
            }
            let keep: HashSet<_> = updates.iter().map(|update| update.id).collect();
            instance.elements.retain(|id, _| keep.contains(id));
            before
        }) else {
            warn!(instance_id = %instance_id, "Properties update for an instance unknown here");
            return;
        };

        let dropped = before.elements.keys().filter(|id| !updates.iter().any(|u| u.id == **id)).count();
        info!(instance_id = %instance_id, elements = updates.len(), dropped, "Updating instance properties");
        for update in updates {
            let (op, mut updated) = match before.elements.get(&update.id) {
                Some(element) => (
                    self.ctx.element_op(&before.composition_id, instance_id, element),
                    InstanceElementView::of(instance_id, element),
                ),
                None => (
                    ElementOp {
                        composition_element: store
                            .composition_element_view(&before.composition_id, &update.definition),
                        instance_element: InstanceElementView::not_present(instance_id, update.id),
                    },
                    InstanceElementView::not_present(instance_id, update.id).with_state(ElementState::Present),
                ),
            };
            updated.in_properties = merged(&updated.in_properties, &update.properties);
            self.ctx
                .submit(message.message_id, Operation::Update(op, updated))
                .await;
        }
    }
}
