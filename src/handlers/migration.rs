// Copyright 2025 Cowboy AI, LLC.

//! Staged migration, rollback and migration precheck
//!
//! Dispositions are always computed against the instance as it was before
//! the migration started. Stage 0 records the element map on the instance
//! before reconciling it, and later stages compare against that record, so
//! the merges of earlier stages never leak into the comparison basis.
//!
//! Elements dropped by the migration stay in the instance, marked `REMOVED`,
//! until their callback reports them `DELETED`.

use super::{sibling_lock_state, HandlerContext};
use crate::executor::{MigrationOp, Operation};
use crate::identifiers::{CompositionId, ElementId};
use crate::messages::{AcElementDeploy, AutomationCompositionMigration, AutomationCompositionMigrationPrecheck};
use crate::model::{CompositionElementView, Element, Instance, InstanceElementView};
use crate::properties::{deep_merge, find_stage_set_migrate, merged, PropertyMap, StageSet};
use crate::state::{DeployState, ElementState, SubState};
use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::{info, warn};

/// How an element takes part in a migration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Present only in the new element set
    Added,
    /// Present before and after
    Updated,
    /// Present only in the old element set
    Removed,
}

/// Classify every element of `before` and `incoming`
///
/// Elements created by an earlier stage of the same migration still count
/// as added. Incoming elements come first, in message order, followed by the
/// removed ones in instance order.
pub fn classify(before: &Instance, incoming: &[ElementId]) -> IndexMap<ElementId, Disposition> {
    let mut result = IndexMap::new();
    for id in incoming {
        let disposition = match before.elements.get(id) {
            Some(element) if element.migration_state != ElementState::New => Disposition::Updated,
            _ => Disposition::Added,
        };
        result.insert(*id, disposition);
    }
    let incoming: HashSet<&ElementId> = incoming.iter().collect();
    for id in before.elements.keys() {
        if !incoming.contains(id) {
            result.insert(*id, Disposition::Removed);
        }
    }
    result
}

struct Step {
    disposition: Disposition,
    stages: StageSet,
    op: MigrationOp,
}

/// Handles migration and precheck messages
#[derive(Clone)]
pub struct MigrationHandler {
    ctx: HandlerContext,
}

impl MigrationHandler {
    /// Create a handler
    pub fn new(ctx: HandlerContext) -> Self {
        Self { ctx }
    }

    /// Run one stage of a migration, or of its rollback
    pub async fn handle_migrate(&self, message: AutomationCompositionMigration) {
        let instance_id = message.automation_composition_id;
        if message.participant_updates.is_empty() {
            warn!(instance_id = %instance_id, "Migration carries no element updates");
            return;
        }
        let updates = self.ctx.own_elements(&message.participant_updates);
        let store = self.ctx.store();
        let Some(live) = store.get_instance(&instance_id) else {
            warn!(instance_id = %instance_id, "Migration for an instance unknown here");
            return;
        };
        let first_stage = message.stage == 0 || live.migration_basis.is_none();
        let before = if first_stage { live } else { live.before_migration() };

        let steps = self.plan(&before, message.composition_target_id, &updates, message.stage);
        let participant_id = store.participant_id();
        store.with_instance_mut(&instance_id, |instance| {
            if first_stage {
                instance.migration_basis = Some(instance.elements.clone());
            }
            instance.deploy_state = DeployState::Migrating;
            instance.composition_target_id = Some(message.composition_target_id);
            reconcile_elements(instance, &updates, participant_id, message.stage == 0);
            for step in &steps {
                let pending = step.stages.range(message.stage..).next().is_some();
                if step.disposition != Disposition::Removed && pending {
                    if let Some(element) = instance.elements.get_mut(&step.op.instance_element.element_id) {
                        element.deploy_state = DeployState::Migrating;
                    }
                }
            }
        });

        let dispatched: Vec<MigrationOp> = steps
            .into_iter()
            .filter(|step| match step.disposition {
                Disposition::Removed => message.stage == 0,
                _ => step.stages.contains(&message.stage),
            })
            .map(|step| step.op)
            .collect();

        info!(instance_id = %instance_id, stage = message.stage, rollback = message.rollback,
            elements = dispatched.len(), "Migrating instance stage");
        for op in dispatched {
            let operation = if message.rollback {
                Operation::Rollback(op)
            } else {
                Operation::Migrate(op)
            };
            self.ctx.submit(message.message_id, operation).await;
        }
    }

    /// Ask every element whether a migration would succeed
    ///
    /// Only the sub-state marker is set on the live instance.
    pub async fn handle_precheck(&self, message: AutomationCompositionMigrationPrecheck) {
        let instance_id = message.automation_composition_id;
        let updates = self.ctx.own_elements(&message.participant_updates);
        let store = self.ctx.store();
        let Some(before) = store.get_instance(&instance_id) else {
            warn!(instance_id = %instance_id, "Migration precheck for an instance unknown here");
            return;
        };

        let steps = self.plan(&before, message.composition_target_id, &updates, 0);
        store.with_instance_mut(&instance_id, |instance| {
            instance.sub_state = SubState::MigrationPrechecking;
            for step in &steps {
                if let Some(element) = instance.elements.get_mut(&step.op.instance_element.element_id) {
                    element.sub_state = SubState::MigrationPrechecking;
                }
            }
        });

        info!(instance_id = %instance_id, elements = steps.len(), "Prechecking instance migration");
        for step in steps {
            self.ctx
                .submit(message.message_id, Operation::MigratePrecheck(step.op))
                .await;
        }
    }

    fn plan(
        &self,
        before: &Instance,
        target: CompositionId,
        updates: &[&AcElementDeploy],
        stage: i32,
    ) -> Vec<Step> {
        let store = self.ctx.store();
        let instance_id = before.instance_id;
        let source = before.composition_id;
        let incoming: Vec<ElementId> = updates.iter().map(|update| update.id).collect();
        let by_id: IndexMap<ElementId, &AcElementDeploy> =
            updates.iter().map(|update| (update.id, *update)).collect();

        let mut steps = Vec::new();
        for (id, disposition) in classify(before, &incoming) {
            let previous = before.elements.get(&id);
            let step = match (disposition, by_id.get(&id)) {
                (Disposition::Removed, _) => {
                    let Some(element) = previous else { continue };
                    Step {
                        disposition,
                        stages: StageSet::from([0]),
                        op: MigrationOp {
                            composition_element: store.composition_element_view(&source, &element.definition),
                            composition_element_target: CompositionElementView::not_present(
                                target,
                                element.definition.clone(),
                            )
                            .with_state(ElementState::Removed),
                            instance_element: InstanceElementView::of(instance_id, element),
                            instance_element_migrate: InstanceElementView::of(instance_id, element)
                                .with_state(ElementState::Removed),
                            stage,
                        },
                    }
                }
                (_, Some(update)) => {
                    let empty = PropertyMap::new();
                    let base = previous.map(|element| &element.properties).unwrap_or(&empty);
                    let mut migrate = match previous {
                        Some(element) => InstanceElementView::of(instance_id, element),
                        None => InstanceElementView::not_present(instance_id, id)
                            .with_state(ElementState::Present),
                    };
                    migrate.in_properties = merged(base, &update.properties);

                    let (composition_element, instance_element) = match (disposition, previous) {
                        (Disposition::Updated, Some(element)) => (
                            store.composition_element_view(&source, &element.definition),
                            InstanceElementView::of(instance_id, element),
                        ),
                        _ => (
                            CompositionElementView::not_present(source, update.definition.clone()),
                            InstanceElementView::not_present(instance_id, id),
                        ),
                    };
                    Step {
                        disposition,
                        stages: find_stage_set_migrate(
                            &self.ctx.common_properties(&target, &update.definition),
                        ),
                        op: MigrationOp {
                            composition_element,
                            composition_element_target: store
                                .composition_element_view(&target, &update.definition),
                            instance_element,
                            instance_element_migrate: migrate,
                            stage,
                        },
                    }
                }
                (_, None) => continue,
            };
            steps.push(step);
        }
        steps
    }
}

/// Bring the element map of the live instance in line with the message
///
/// Elements missing from the message are marked `REMOVED` at stage 0; their
/// removal callback runs in that stage and the aggregator drops them once
/// they report `DELETED`.
fn reconcile_elements(
    instance: &mut Instance,
    updates: &[&AcElementDeploy],
    participant_id: uuid::Uuid,
    removal_stage: bool,
) {
    let lock_state = sibling_lock_state(instance);
    for update in updates {
        match instance.elements.get_mut(&update.id) {
            Some(element) => {
                deep_merge(&mut element.properties, &update.properties);
                element.definition = update.definition.clone();
            }
            None => {
                let mut element = Element::new(update.id, update.definition.clone(), participant_id);
                element.properties = merged(&PropertyMap::new(), &update.properties);
                element.deploy_state = DeployState::Migrating;
                element.lock_state = lock_state;
                element.migration_state = ElementState::New;
                instance.elements.insert(update.id, element);
            }
        }
    }

    let keep: HashSet<ElementId> = updates.iter().map(|update| update.id).collect();
    instance.elements.retain(|id, element| {
        keep.contains(id) || element.migration_state == ElementState::Removed || removal_stage
    });
    if removal_stage {
        for (id, element) in instance.elements.iter_mut() {
            if !keep.contains(id) {
                element.migration_state = ElementState::Removed;
                element.deploy_state = DeployState::Migrating;
            }
        }
    }
}
