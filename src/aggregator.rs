// Copyright 2025 Cowboy AI, LLC.

//! Element state reports, aggregate derivation and acknowledgements
//!
//! [`StateAggregator`] is the only API element callbacks use to report
//! progress. Aggregate instance state follows the scan-and-compare rule: after
//! an element changes, the instance takes the new value only once every
//! element holds it. The whole read-modify-scan runs under the instance's
//! store lock, so concurrent reports for different elements of one instance
//! cannot lose a promotion.

use crate::errors::{ParticipantError, ParticipantResult};
use crate::identifiers::{CompositionId, DefinitionId, ElementId, InstanceId};
use crate::messages::{
    CompositionAck, CompositionInfo, DefinitionInfo, ElementAck, ElementInfo, InstanceAck,
    InstanceInfo, ParticipantAck, ParticipantStatus,
};
use crate::model::{CompositionDefinition, Element, Instance};
use crate::properties::PropertyMap;
use crate::publisher::MessagePublisher;
use crate::state::{AcTypeState, DeployState, ElementState, LockState, ParticipantState, StateChangeResult, SubState};
use crate::store::StateStore;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

enum ReportOutcome {
    UnknownElement,
    InvalidStates,
    Applied {
        result: StateChangeResult,
        element: ElementAck,
        deploy_state: DeployState,
        lock_state: LockState,
        deleted: bool,
    },
}

/// Receives element and composition state reports and acknowledges them
pub struct StateAggregator {
    store: Arc<StateStore>,
    publisher: Arc<dyn MessagePublisher>,
}

impl StateAggregator {
    /// Create an aggregator over a store
    pub fn new(store: Arc<StateStore>, publisher: Arc<dyn MessagePublisher>) -> Self {
        Self { store, publisher }
    }

    /// Store the aggregator works on
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Snapshot of an instance, for callbacks that need more context
    pub fn get_instance(&self, instance_id: &InstanceId) -> Option<Instance> {
        self.store.get_instance(instance_id)
    }

    /// Copy of a composition definition, for callbacks that need more context
    pub fn get_definition(&self, composition_id: &CompositionId) -> Option<CompositionDefinition> {
        self.store.get_definition(composition_id)
    }

    /// Report the new state of one element
    ///
    /// Exactly one of `deploy_state` and `lock_state` must be given, unless
    /// the element is in a sub-state: then the sub-state is cleared, the
    /// given states are ignored and a failure is downgraded to `NO_ERROR`.
    /// Reports that cannot be applied are logged and dropped.
    pub fn update_element_state(
        &self,
        instance_id: InstanceId,
        element_id: ElementId,
        deploy_state: Option<DeployState>,
        lock_state: Option<LockState>,
        result: StateChangeResult,
        message: &str,
    ) {
        if let Err(e) =
            self.try_update_element_state(instance_id, element_id, deploy_state, lock_state, result, message)
        {
            error!(instance_id = %instance_id, element_id = %element_id, error = %e,
                "Cannot update element state");
        }
    }

    /// Same as [`update_element_state`](Self::update_element_state), returning
    /// why a report could not be applied
    pub fn try_update_element_state(
        &self,
        instance_id: InstanceId,
        element_id: ElementId,
        deploy_state: Option<DeployState>,
        lock_state: Option<LockState>,
        result: StateChangeResult,
        message: &str,
    ) -> ParticipantResult<()> {
        let outcome = self
            .store
            .with_instance_mut(&instance_id, |instance| {
                apply_report(instance, element_id, deploy_state, lock_state, result, message)
            })
            .ok_or_else(|| ParticipantError::not_found("instance", instance_id))?;

        let (result, element, aggregate_deploy, aggregate_lock) = match outcome {
            ReportOutcome::UnknownElement => {
                return Err(ParticipantError::not_found("element", element_id));
            }
            ReportOutcome::InvalidStates => {
                return Err(ParticipantError::InvalidStateReport(format!(
                    "deploy state {deploy_state:?} and lock state {lock_state:?}, exactly one must be given"
                )));
            }
            ReportOutcome::Applied {
                result,
                element,
                deploy_state,
                lock_state,
                deleted,
            } => {
                if deleted {
                    self.store.remove_instance(&instance_id);
                    debug!(instance_id = %instance_id, "Instance deleted");
                }
                (result, element, deploy_state, lock_state)
            }
        };

        debug!(instance_id = %instance_id, element_id = %element_id,
            deploy_state = %element.deploy_state, lock_state = %element.lock_state,
            result = %result, "Element state updated");

        self.publish_instance_ack(instance_id, element_id, element, aggregate_deploy, aggregate_lock, result, message);
        Ok(())
    }

    /// Report that an element finished a migration stage and waits for `next_stage`
    ///
    /// The element stays `MIGRATING` and the aggregate state is left alone.
    pub fn update_element_stage(
        &self,
        instance_id: InstanceId,
        element_id: ElementId,
        result: StateChangeResult,
        next_stage: i32,
        message: &str,
    ) {
        let outcome = self.store.with_instance_mut(&instance_id, |instance| {
            let element = instance.elements.get_mut(&element_id)?;
            element.deploy_state = DeployState::Migrating;
            element.migration_stage = Some(next_stage);
            let mut ack = element_ack(element, message);
            ack.stage = Some(next_stage);
            instance.state_change_result = result;
            Some((ack, instance.deploy_state, instance.lock_state))
        });

        match outcome {
            Some(Some((element, deploy_state, lock_state))) => {
                debug!(instance_id = %instance_id, element_id = %element_id, next_stage,
                    "Element migration stage done");
                self.publish_instance_ack(instance_id, element_id, element, deploy_state, lock_state, result, message);
            }
            Some(None) => error!(instance_id = %instance_id, element_id = %element_id,
                "Cannot update element stage, element not present"),
            None => error!(instance_id = %instance_id, element_id = %element_id,
                "Cannot update element stage, instance not present"),
        }
    }

    /// Report the outcome of a prime or deprime
    ///
    /// A successful report of `COMMISSIONED` removes the definition.
    pub fn update_composition_state(
        &self,
        composition_id: CompositionId,
        state: AcTypeState,
        result: StateChangeResult,
        message: &str,
    ) {
        if state == AcTypeState::Commissioned && result == StateChangeResult::NoError {
            self.store.remove_definition(&composition_id);
            debug!(composition_id = %composition_id, "Composition definition removed");
        } else if self
            .store
            .with_definition_mut(&composition_id, |def| def.state = state)
            .is_none()
        {
            debug!(composition_id = %composition_id, "Composition state reported for unknown definition");
        }

        let ack = CompositionAck {
            participant_id: self.store.participant_id(),
            replica_id: self.store.replica_id(),
            response_to: self.store.take_correlation(&composition_id),
            composition_id,
            composition_state: state,
            state_change_result: result,
            result: true,
            message: message.to_string(),
            timestamp: Utc::now(),
        };
        self.publish_ack(ParticipantAck::Composition(ack));
    }

    /// Report non-state information of an element
    pub fn send_element_info(
        &self,
        instance_id: InstanceId,
        element_id: ElementId,
        use_state: Option<String>,
        operational_state: Option<String>,
        out_properties: PropertyMap,
    ) {
        let info = self.store.with_instance_mut(&instance_id, |instance| {
            let element = instance.elements.get_mut(&element_id)?;
            element.use_state = use_state;
            element.operational_state = operational_state;
            element.out_properties = out_properties;
            let element = element_info(element);
            Some(InstanceInfo {
                automation_composition_id: instance.instance_id,
                deploy_state: instance.deploy_state,
                lock_state: instance.lock_state,
                sub_state: instance.sub_state,
                elements: vec![element],
            })
        });

        match info {
            Some(Some(info)) => self.publish_status(vec![info], vec![]),
            _ => error!(instance_id = %instance_id, element_id = %element_id,
                "Cannot send element info, element not present"),
        }
    }

    /// Report new output properties of an element definition
    pub fn send_definition_info(
        &self,
        composition_id: CompositionId,
        definition_id: &DefinitionId,
        out_properties: PropertyMap,
    ) {
        let info = self.store.with_definition_mut(&composition_id, |def| {
            let element = def.elements.get_mut(definition_id)?;
            element.out_properties = out_properties;
            Some(composition_info(def))
        });

        match info {
            Some(Some(info)) => self.publish_status(vec![], vec![info]),
            _ => error!(composition_id = %composition_id, definition_id = %definition_id,
                "Cannot send definition info, definition not present"),
        }
    }

    /// Full status of this replica
    pub fn participant_status(&self) -> ParticipantStatus {
        let mut instances = self.store.instances();
        instances.sort_by_key(|instance| instance.instance_id);
        let mut definitions = self.store.definitions();
        definitions.sort_by_key(|def| def.composition_id);
        self.status(
            instances.iter().map(instance_info).collect(),
            definitions.iter().map(composition_info).collect(),
        )
    }

    fn status(&self, instances: Vec<InstanceInfo>, compositions: Vec<CompositionInfo>) -> ParticipantStatus {
        ParticipantStatus {
            participant_id: self.store.participant_id(),
            replica_id: self.store.replica_id(),
            state: ParticipantState::OnLine,
            supported_element_types: self.store.supported_element_types().to_vec(),
            automation_composition_info_list: instances,
            composition_info_list: compositions,
            timestamp: Utc::now(),
        }
    }

    fn publish_status(&self, instances: Vec<InstanceInfo>, compositions: Vec<CompositionInfo>) {
        if let Err(e) = self.publisher.send_status(self.status(instances, compositions)) {
            warn!(error = %e, "Failed to send participant status");
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn publish_instance_ack(
        &self,
        instance_id: InstanceId,
        element_id: ElementId,
        element: ElementAck,
        deploy_state: DeployState,
        lock_state: LockState,
        result: StateChangeResult,
        message: &str,
    ) {
        let ack = InstanceAck {
            participant_id: self.store.participant_id(),
            replica_id: self.store.replica_id(),
            response_to: self.store.take_correlation(&element_id),
            automation_composition_id: instance_id,
            deploy_state,
            lock_state,
            result: true,
            state_change_result: result,
            message: message.to_string(),
            automation_composition_result_map: BTreeMap::from([(element_id, element)]),
            timestamp: Utc::now(),
        };
        self.publish_ack(ParticipantAck::Instance(ack));
    }

    fn publish_ack(&self, ack: ParticipantAck) {
        if let Err(e) = self.publisher.send_ack(ack) {
            warn!(error = %e, "Failed to send acknowledgement");
        }
    }
}

fn apply_report(
    instance: &mut Instance,
    element_id: ElementId,
    deploy_state: Option<DeployState>,
    lock_state: Option<LockState>,
    mut result: StateChangeResult,
    message: &str,
) -> ReportOutcome {
    let Some(element) = instance.elements.get_mut(&element_id) else {
        return ReportOutcome::UnknownElement;
    };

    if element.sub_state != SubState::None {
        element.sub_state = SubState::None;
        if result != StateChangeResult::NoError {
            warn!(instance_id = %instance.instance_id, element_id = %element_id, result = %result,
                message, "Sub-state operation reported a failure, acknowledging as NO_ERROR");
            result = StateChangeResult::NoError;
        }
        if instance.all_elements(|e| e.sub_state == SubState::None) {
            instance.sub_state = SubState::None;
        }
    } else {
        match (deploy_state, lock_state) {
            (Some(deploy_state), None) => apply_deploy_state(instance, element_id, deploy_state),
            (None, Some(lock_state)) => apply_lock_state(instance, element_id, lock_state),
            _ => return ReportOutcome::InvalidStates,
        }
    }
    instance.state_change_result = result;

    let Some(element) = instance.elements.get(&element_id) else {
        return ReportOutcome::UnknownElement;
    };
    let ack = element_ack(element, message);
    if element.migration_state == ElementState::Removed && element.deploy_state == DeployState::Deleted {
        instance.elements.shift_remove(&element_id);
        debug!(instance_id = %instance.instance_id, element_id = %element_id, "Element removed by migration");
        promote_deploy_state(instance, DeployState::Deployed);
    }
    ReportOutcome::Applied {
        result,
        element: ack,
        deploy_state: instance.deploy_state,
        lock_state: instance.lock_state,
        deleted: instance.deploy_state == DeployState::Deleted,
    }
}

fn element_ack(element: &Element, message: &str) -> ElementAck {
    ElementAck {
        deploy_state: element.deploy_state,
        lock_state: element.lock_state,
        operational_state: element.operational_state.clone(),
        use_state: element.use_state.clone(),
        out_properties: element.out_properties.clone(),
        result: true,
        message: message.to_string(),
        stage: None,
    }
}

fn lock_state_for(deploy_state: DeployState) -> LockState {
    if deploy_state == DeployState::Deployed {
        LockState::Locked
    } else {
        LockState::None
    }
}

fn apply_deploy_state(instance: &mut Instance, element_id: ElementId, deploy_state: DeployState) {
    if let Some(element) = instance.elements.get_mut(&element_id) {
        element.deploy_state = deploy_state;
        element.lock_state = lock_state_for(deploy_state);
        element.migration_stage = None;
    }
    promote_deploy_state(instance, deploy_state);
}

/// Scan-and-compare over the elements a migration is not removing
///
/// A migration completes only once every removed element has left.
fn promote_deploy_state(instance: &mut Instance, deploy_state: DeployState) {
    if !instance.all_tracked(|e| e.deploy_state == deploy_state) {
        return;
    }
    if deploy_state == DeployState::Deployed && instance.elements.values().any(Element::is_leaving) {
        return;
    }
    instance.deploy_state = deploy_state;
    instance.lock_state = lock_state_for(deploy_state);
    instance.sub_state = SubState::None;

    if deploy_state == DeployState::Deployed {
        if let Some(target) = instance.composition_target_id.take() {
            debug!(instance_id = %instance.instance_id, composition_id = %target,
                "Migration complete, instance moved to target composition");
            instance.composition_id = target;
        }
        instance.migration_basis = None;
        for element in instance.elements.values_mut() {
            element.migration_state = ElementState::Present;
            element.migration_stage = None;
        }
    }
}

fn apply_lock_state(instance: &mut Instance, element_id: ElementId, lock_state: LockState) {
    if let Some(element) = instance.elements.get_mut(&element_id) {
        element.lock_state = lock_state;
    }
    if instance.all_tracked(|e| e.lock_state == lock_state) {
        instance.lock_state = lock_state;
    }
}

fn element_info(element: &Element) -> ElementInfo {
    ElementInfo {
        element_id: element.id,
        deploy_state: element.deploy_state,
        lock_state: element.lock_state,
        operational_state: element.operational_state.clone(),
        use_state: element.use_state.clone(),
        out_properties: element.out_properties.clone(),
    }
}

fn instance_info(instance: &Instance) -> InstanceInfo {
    InstanceInfo {
        automation_composition_id: instance.instance_id,
        deploy_state: instance.deploy_state,
        lock_state: instance.lock_state,
        sub_state: instance.sub_state,
        elements: instance.elements.values().map(element_info).collect(),
    }
}

fn composition_info(definition: &CompositionDefinition) -> CompositionInfo {
    CompositionInfo {
        composition_id: definition.composition_id,
        state: definition.state,
        element_definitions: definition
            .elements
            .values()
            .map(|def| DefinitionInfo {
                definition_id: def.definition_id.clone(),
                out_properties: def.out_properties.clone(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::DefinitionId;
    use crate::publisher::RecordingPublisher;
    use uuid::Uuid;

    struct Fixture {
        store: Arc<StateStore>,
        publisher: RecordingPublisher,
        aggregator: StateAggregator,
        instance_id: InstanceId,
        elements: Vec<ElementId>,
    }

    fn fixture(count: usize, deploy_state: DeployState) -> Fixture {
        let store = Arc::new(StateStore::new(Uuid::new_v4(), vec![]));
        let publisher = RecordingPublisher::new();
        let aggregator = StateAggregator::new(store.clone(), Arc::new(publisher.clone()));
        let instance_id = Uuid::new_v4();
        let mut instance = Instance::new(instance_id, Uuid::new_v4());
        instance.deploy_state = deploy_state;
        let elements: Vec<ElementId> = (0..count).map(|_| Uuid::new_v4()).collect();
        for id in &elements {
            let mut element =
                Element::new(*id, DefinitionId::new("element", "1.0.0"), store.participant_id());
            element.deploy_state = deploy_state;
            instance.elements.insert(*id, element);
        }
        store.put_instance(instance);
        Fixture {
            store,
            publisher,
            aggregator,
            instance_id,
            elements,
        }
    }

    #[test]
    fn test_aggregate_promoted_after_last_element() {
        let f = fixture(3, DeployState::Deploying);
        for (i, id) in f.elements.iter().enumerate() {
            f.aggregator.update_element_state(
                f.instance_id,
                *id,
                Some(DeployState::Deployed),
                None,
                StateChangeResult::NoError,
                "Deployed",
            );
            let instance = f.store.get_instance(&f.instance_id).unwrap();
            let expected = if i == 2 { DeployState::Deployed } else { DeployState::Deploying };
            assert_eq!(instance.deploy_state, expected);
        }
        let instance = f.store.get_instance(&f.instance_id).unwrap();
        assert_eq!(instance.lock_state, LockState::Locked);
        assert_eq!(f.publisher.instance_acks().len(), 3);
    }

    #[test]
    fn test_ack_carries_correlation_once() {
        let f = fixture(1, DeployState::Deploying);
        let message_id = Uuid::new_v4();
        f.store.set_correlation(f.elements[0], message_id);

        for _ in 0..2 {
            f.aggregator.update_element_state(
                f.instance_id,
                f.elements[0],
                Some(DeployState::Deployed),
                None,
                StateChangeResult::NoError,
                "Deployed",
            );
        }
        let acks = f.publisher.instance_acks();
        assert_eq!(acks[0].response_to, Some(message_id));
        assert_eq!(acks[1].response_to, None);
    }

    #[test]
    fn test_both_or_neither_state_is_rejected() {
        let f = fixture(1, DeployState::Deployed);
        f.aggregator.update_element_state(
            f.instance_id,
            f.elements[0],
            Some(DeployState::Deployed),
            Some(LockState::Locked),
            StateChangeResult::NoError,
            "",
        );
        let err = f
            .aggregator
            .try_update_element_state(f.instance_id, f.elements[0], None, None, StateChangeResult::NoError, "")
            .unwrap_err();
        assert!(err.is_invalid_input());
        assert!(f.publisher.is_empty());
    }

    #[test]
    fn test_unknown_instance_or_element_is_dropped() {
        let f = fixture(1, DeployState::Deploying);
        f.aggregator.update_element_state(
            Uuid::new_v4(),
            f.elements[0],
            Some(DeployState::Deployed),
            None,
            StateChangeResult::NoError,
            "",
        );
        let err = f
            .aggregator
            .try_update_element_state(
                f.instance_id,
                Uuid::new_v4(),
                Some(DeployState::Deployed),
                None,
                StateChangeResult::NoError,
                "",
            )
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(f.publisher.is_empty());
    }

    #[test]
    fn test_deleted_instance_is_removed() {
        let f = fixture(2, DeployState::Deleting);
        for id in &f.elements {
            f.aggregator.update_element_state(
                f.instance_id,
                *id,
                Some(DeployState::Deleted),
                None,
                StateChangeResult::NoError,
                "Deleted",
            );
        }
        assert!(!f.store.contains_instance(&f.instance_id));
        let acks = f.publisher.instance_acks();
        assert_eq!(acks.len(), 2);
        assert_eq!(acks[1].deploy_state, DeployState::Deleted);
    }

    #[test]
    fn test_migration_completion_swaps_composition() {
        let f = fixture(1, DeployState::Migrating);
        let target = Uuid::new_v4();
        f.store.with_instance_mut(&f.instance_id, |instance| {
            instance.composition_target_id = Some(target);
            instance.elements[0].migration_state = ElementState::New;
        });

        f.aggregator.update_element_state(
            f.instance_id,
            f.elements[0],
            Some(DeployState::Deployed),
            None,
            StateChangeResult::NoError,
            "Migrated",
        );
        let instance = f.store.get_instance(&f.instance_id).unwrap();
        assert_eq!(instance.composition_id, target);
        assert_eq!(instance.composition_target_id, None);
        assert_eq!(instance.elements[0].migration_state, ElementState::Present);
    }

    #[test]
    fn test_migration_waits_for_removed_element_to_leave() {
        let f = fixture(2, DeployState::Migrating);
        let target = Uuid::new_v4();
        let (kept, removed) = (f.elements[0], f.elements[1]);
        f.store.with_instance_mut(&f.instance_id, |instance| {
            instance.composition_target_id = Some(target);
            instance.migration_basis = Some(instance.elements.clone());
            instance.elements[1].migration_state = ElementState::Removed;
        });

        f.aggregator.update_element_state(
            f.instance_id, kept, Some(DeployState::Deployed), None, StateChangeResult::NoError, "Migrated",
        );
        assert_eq!(f.store.get_instance(&f.instance_id).unwrap().deploy_state, DeployState::Migrating);

        f.aggregator.update_element_state(
            f.instance_id, removed, Some(DeployState::Undeployed), None, StateChangeResult::NoError, "Undeployed",
        );
        f.aggregator.update_element_state(
            f.instance_id, removed, Some(DeployState::Deleted), None, StateChangeResult::NoError, "Deleted",
        );

        let instance = f.store.get_instance(&f.instance_id).unwrap();
        assert_eq!(instance.deploy_state, DeployState::Deployed);
        assert_eq!(instance.composition_id, target);
        assert_eq!(instance.migration_basis, None);
        assert!(!instance.elements.contains_key(&removed));
        let acks = f.publisher.instance_acks();
        assert_eq!(acks.len(), 3);
        assert_eq!(acks[2].automation_composition_result_map[&removed].deploy_state, DeployState::Deleted);
    }

    #[test]
    fn test_stage_report_keeps_element_migrating() {
        let f = fixture(1, DeployState::Migrating);
        let target = Uuid::new_v4();
        f.store.with_instance_mut(&f.instance_id, |instance| {
            instance.composition_target_id = Some(target);
        });
        let correlated = Uuid::new_v4();
        f.store.set_correlation(f.elements[0], correlated);

        f.aggregator.update_element_stage(f.instance_id, f.elements[0], StateChangeResult::NoError, 2, "stage 0 Migrated");

        let instance = f.store.get_instance(&f.instance_id).unwrap();
        assert_eq!(instance.deploy_state, DeployState::Migrating);
        assert_eq!(instance.composition_target_id, Some(target));
        assert_eq!(instance.elements[0].deploy_state, DeployState::Migrating);
        assert_eq!(instance.elements[0].migration_stage, Some(2));
        let acks = f.publisher.instance_acks();
        assert_eq!(acks[0].response_to, Some(correlated));
        assert_eq!(acks[0].automation_composition_result_map[&f.elements[0]].stage, Some(2));
    }

    #[test]
    fn test_sub_state_failure_is_downgraded() {
        let f = fixture(2, DeployState::Deployed);
        f.store.with_instance_mut(&f.instance_id, |instance| {
            instance.sub_state = SubState::Reviewing;
            for element in instance.elements.values_mut() {
                element.sub_state = SubState::Reviewing;
            }
        });

        f.aggregator.update_element_state(
            f.instance_id,
            f.elements[0],
            Some(DeployState::Deployed),
            None,
            StateChangeResult::Failed,
            "Review failed",
        );
        let instance = f.store.get_instance(&f.instance_id).unwrap();
        assert_eq!(instance.sub_state, SubState::Reviewing);
        assert_eq!(
            f.publisher.instance_acks()[0].state_change_result,
            StateChangeResult::NoError
        );

        f.aggregator.update_element_state(
            f.instance_id,
            f.elements[1],
            None,
            None,
            StateChangeResult::NoError,
            "Reviewed",
        );
        let instance = f.store.get_instance(&f.instance_id).unwrap();
        assert_eq!(instance.sub_state, SubState::None);
    }

    #[test]
    fn test_successful_deprime_removes_definition() {
        let f = fixture(0, DeployState::Undeployed);
        let composition_id = Uuid::new_v4();
        f.store.put_definitions(composition_id, vec![], None);

        f.aggregator.update_composition_state(
            composition_id,
            AcTypeState::Primed,
            StateChangeResult::NoError,
            "Primed",
        );
        assert_eq!(f.store.get_definition(&composition_id).unwrap().state, AcTypeState::Primed);

        f.aggregator.update_composition_state(
            composition_id,
            AcTypeState::Commissioned,
            StateChangeResult::NoError,
            "Deprimed",
        );
        assert!(!f.store.contains_definition(&composition_id));
        assert_eq!(f.publisher.composition_acks().len(), 2);
    }

    #[test]
    fn test_element_info_updates_and_reports() {
        let f = fixture(1, DeployState::Deployed);
        let mut out = PropertyMap::new();
        out.insert("endpoint".to_string(), serde_json::json!("http://svc"));
        f.aggregator.send_element_info(
            f.instance_id,
            f.elements[0],
            Some("IDLE".to_string()),
            Some("ENABLED".to_string()),
            out,
        );

        let statuses = f.publisher.statuses();
        assert_eq!(statuses.len(), 1);
        let info = &statuses[0].automation_composition_info_list[0];
        assert_eq!(info.elements[0].operational_state.as_deref(), Some("ENABLED"));
        let instance = f.store.get_instance(&f.instance_id).unwrap();
        assert_eq!(instance.elements[0].use_state.as_deref(), Some("IDLE"));
    }
}
