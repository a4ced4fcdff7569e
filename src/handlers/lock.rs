// Copyright 2025 Cowboy AI, LLC.

//! Phased lock and unlock

use super::HandlerContext;
use crate::executor::{ElementOp, Operation};
use crate::messages::AutomationCompositionStateChange;
use crate::state::{LockOrder, LockState};
use tracing::{debug, info, warn};

/// Handles state changes that carry a lock order
#[derive(Clone)]
pub struct LockHandler {
    ctx: HandlerContext,
}

impl LockHandler {
    /// Create a handler
    pub fn new(ctx: HandlerContext) -> Self {
        Self { ctx }
    }

    /// Lock or unlock the elements whose declared start phase matches the message
    pub async fn handle_state_change(&self, message: AutomationCompositionStateChange) {
        let instance_id = message.automation_composition_id;
        let state = match message.lock_order_state {
            LockOrder::Lock => LockState::Locking,
            LockOrder::Unlock => LockState::Unlocking,
            LockOrder::None => {
                debug!(instance_id = %instance_id, "State change without deploy or lock order");
                return;
            }
        };

        let store = self.ctx.store();
        let Some(instance) = store.with_instance_mut(&instance_id, |instance| {
            instance.lock_state = state;
            instance.clone()
        }) else {
            warn!(instance_id = %instance_id, order = %message.lock_order_state,
                "Lock change for an instance unknown here");
            return;
        };

        let operations: Vec<ElementOp> = self
            .ctx
            .elements_in_phase(&instance, &instance.composition_id, message.start_phase)
            .into_iter()
            .map(|element| self.ctx.element_op(&instance.composition_id, instance_id, element))
            .collect();
        store.with_instance_mut(&instance_id, |instance| {
            for op in &operations {
                if let Some(element) = instance.elements.get_mut(&op.instance_element.element_id) {
                    element.lock_state = state;
                }
            }
        });

        info!(instance_id = %instance_id, order = %message.lock_order_state,
            start_phase = message.start_phase, elements = operations.len(), "Changing instance lock state");
        for op in operations {
            let operation = match message.lock_order_state {
                LockOrder::Unlock => Operation::Unlock(op),
                _ => Operation::Lock(op),
            };
            self.ctx.submit(message.message_id, operation).await;
        }
    }
}
