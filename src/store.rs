// Copyright 2025 Cowboy AI, LLC.

//! Concurrent in-memory state of one participant replica
//!
//! The store is the only mutable state shared between handlers, executor
//! tasks and the aggregator. Every operation is atomic for a single key and
//! nothing here waits on I/O. There are no cross-key transactions: the
//! correlation map is independent of the instance map and may briefly hold
//! stale entries.
//!
//! Closures passed to the `with_*_mut` methods run while the key is locked.
//! They must not call back into the store.

use crate::errors::{ParticipantError, ParticipantResult};
use crate::identifiers::{CompositionId, DefinitionId, InstanceId, MessageId, RevisionId};
use crate::messages::{ParticipantDeploy, ParticipantRestartAc, SupportedElementType};
use crate::model::{CompositionDefinition, CompositionElementView, Element, ElementDefinition, Instance};
use crate::properties::PropertyMap;
use crate::state::{DeployState, SubState};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

/// Concurrent cache of composition definitions, instances and correlations
#[derive(Debug)]
pub struct StateStore {
    participant_id: Uuid,
    replica_id: Uuid,
    supported_element_types: Vec<SupportedElementType>,
    definitions: DashMap<CompositionId, CompositionDefinition>,
    instances: DashMap<InstanceId, Instance>,
    correlations: DashMap<Uuid, MessageId>,
}

impl StateStore {
    /// Create an empty store; the replica id is generated here
    pub fn new(participant_id: Uuid, supported_element_types: Vec<SupportedElementType>) -> Self {
        Self {
            participant_id,
            replica_id: Uuid::new_v4(),
            supported_element_types,
            definitions: DashMap::new(),
            instances: DashMap::new(),
            correlations: DashMap::new(),
        }
    }

    /// Participant this replica serves
    pub fn participant_id(&self) -> Uuid {
        self.participant_id
    }

    /// Identity of this replica
    pub fn replica_id(&self) -> Uuid {
        self.replica_id
    }

    /// Element types this participant hosts
    pub fn supported_element_types(&self) -> &[SupportedElementType] {
        &self.supported_element_types
    }

    // ---- composition definitions ----

    /// Copy of a stored composition definition
    pub fn get_definition(&self, composition_id: &CompositionId) -> Option<CompositionDefinition> {
        self.definitions.get(composition_id).map(|def| def.clone())
    }

    /// Store (or wholesale replace) the definitions of a composition
    pub fn put_definitions(
        &self,
        composition_id: CompositionId,
        list: Vec<ElementDefinition>,
        revision_id: Option<RevisionId>,
    ) {
        debug!(composition_id = %composition_id, count = list.len(), "Storing composition definitions");
        self.definitions.insert(
            composition_id,
            CompositionDefinition::new(composition_id, list, revision_id),
        );
    }

    /// Remove a composition definition
    pub fn remove_definition(&self, composition_id: &CompositionId) -> Option<CompositionDefinition> {
        self.definitions.remove(composition_id).map(|(_, def)| def)
    }

    /// Check whether a composition definition is stored
    pub fn contains_definition(&self, composition_id: &CompositionId) -> bool {
        self.definitions.contains_key(composition_id)
    }

    /// Mutate a stored composition definition in place
    pub fn with_definition_mut<R>(
        &self,
        composition_id: &CompositionId,
        f: impl FnOnce(&mut CompositionDefinition) -> R,
    ) -> Option<R> {
        self.definitions
            .get_mut(composition_id)
            .map(|mut def| f(def.value_mut()))
    }

    /// Copies of every stored composition definition
    pub fn definitions(&self) -> Vec<CompositionDefinition> {
        self.definitions.iter().map(|def| def.value().clone()).collect()
    }

    /// Declared properties of one element definition
    pub fn common_properties(
        &self,
        composition_id: &CompositionId,
        definition_id: &DefinitionId,
    ) -> ParticipantResult<PropertyMap> {
        let composition = self
            .definitions
            .get(composition_id)
            .ok_or_else(|| ParticipantError::not_found("composition", composition_id))?;
        composition
            .elements
            .get(definition_id)
            .map(|def| def.properties.clone())
            .ok_or_else(|| ParticipantError::not_found("element definition", definition_id))
    }

    /// View of one element definition, `NOT_PRESENT` when either key is unknown
    pub fn composition_element_view(
        &self,
        composition_id: &CompositionId,
        definition_id: &DefinitionId,
    ) -> CompositionElementView {
        match self.definitions.get(composition_id) {
            Some(def) => def.element_view(definition_id),
            None => CompositionElementView::not_present(*composition_id, definition_id.clone()),
        }
    }

    // ---- instances ----

    /// Independent snapshot of an instance
    ///
    /// The returned value shares nothing with the live instance; changes to
    /// it are never visible in the store.
    pub fn get_instance(&self, instance_id: &InstanceId) -> Option<Instance> {
        self.instances.get(instance_id).map(|instance| instance.clone())
    }

    /// Store (or replace) an instance
    pub fn put_instance(&self, instance: Instance) {
        self.instances.insert(instance.instance_id, instance);
    }

    /// Remove an instance
    pub fn remove_instance(&self, instance_id: &InstanceId) -> Option<Instance> {
        self.instances.remove(instance_id).map(|(_, instance)| instance)
    }

    /// Check whether an instance is stored
    pub fn contains_instance(&self, instance_id: &InstanceId) -> bool {
        self.instances.contains_key(instance_id)
    }

    /// Mutate a stored instance in place, atomically for that instance
    pub fn with_instance_mut<R>(
        &self,
        instance_id: &InstanceId,
        f: impl FnOnce(&mut Instance) -> R,
    ) -> Option<R> {
        self.instances
            .get_mut(instance_id)
            .map(|mut instance| f(instance.value_mut()))
    }

    /// Snapshots of every stored instance
    pub fn instances(&self) -> Vec<Instance> {
        self.instances.iter().map(|instance| instance.value().clone()).collect()
    }

    /// Number of stored instances
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// (Re)create an instance from the elements of a deploy-family message
    ///
    /// Only elements assigned to this participant are kept. When the instance
    /// already exists, the reported fields of its elements survive.
    pub fn initialize_instance(
        &self,
        composition_id: CompositionId,
        instance_id: InstanceId,
        participant_updates: &[ParticipantDeploy],
        deploy_state: DeployState,
        sub_state: SubState,
        revision_id: Option<RevisionId>,
    ) {
        let build = |previous: Option<&Instance>| {
            let mut instance = Instance::new(instance_id, composition_id);
            instance.deploy_state = deploy_state;
            instance.sub_state = sub_state;
            instance.revision_id = revision_id;
            for deploy in participant_updates
                .iter()
                .filter(|update| update.participant_id == self.participant_id)
            {
                for update in &deploy.ac_element_list {
                    let mut element =
                        Element::new(update.id, update.definition.clone(), self.participant_id);
                    element.deploy_state = deploy_state;
                    element.sub_state = sub_state;
                    element.properties = update.properties.clone();
                    if let Some(last) = previous.and_then(|p| p.elements.get(&update.id)) {
                        element.carry_over_from(last);
                    }
                    instance.elements.insert(update.id, element);
                }
            }
            instance
        };

        match self.instances.entry(instance_id) {
            Entry::Occupied(mut entry) => {
                let fresh = build(Some(entry.get()));
                entry.insert(fresh);
            }
            Entry::Vacant(entry) => {
                entry.insert(build(None));
            }
        }
    }

    /// Rebuild an instance from a sync (restart) payload
    pub fn restore_instance(&self, composition_id: CompositionId, restart: &ParticipantRestartAc) {
        let mut instance = Instance::new(restart.automation_composition_id, composition_id);
        instance.composition_target_id = restart.composition_target_id;
        instance.deploy_state = restart.deploy_state;
        instance.lock_state = restart.lock_state;
        instance.state_change_result = restart.state_change_result;
        instance.revision_id = restart.revision_id;
        for update in restart
            .ac_element_list
            .iter()
            .filter(|element| element.participant_id == self.participant_id)
        {
            let mut element = Element::new(update.id, update.definition.clone(), self.participant_id);
            element.deploy_state = update.deploy_state;
            element.lock_state = update.lock_state;
            element.sub_state = SubState::None;
            element.operational_state = update.operational_state.clone();
            element.use_state = update.use_state.clone();
            element.properties = update.properties.clone();
            element.out_properties = update.out_properties.clone();
            instance.elements.insert(update.id, element);
        }
        self.put_instance(instance);
    }

    // ---- revisions ----

    /// Whether the stored composition is at the expected revision
    ///
    /// An absent expectation is always satisfied.
    pub fn is_composition_current(
        &self,
        composition_id: &CompositionId,
        revision_id: Option<&RevisionId>,
    ) -> bool {
        match revision_id {
            None => true,
            Some(expected) => self
                .definitions
                .get(composition_id)
                .is_some_and(|def| def.revision_id.as_ref() == Some(expected)),
        }
    }

    /// Whether the stored instance is at the expected revision
    ///
    /// An absent expectation is always satisfied.
    pub fn is_instance_current(&self, instance_id: &InstanceId, revision_id: Option<&RevisionId>) -> bool {
        match revision_id {
            None => true,
            Some(expected) => self
                .instances
                .get(instance_id)
                .is_some_and(|instance| instance.revision_id.as_ref() == Some(expected)),
        }
    }

    // ---- correlation ----

    /// Record which inbound message an eventual ack for `key` answers
    pub fn set_correlation(&self, key: Uuid, message_id: MessageId) {
        self.correlations.insert(key, message_id);
    }

    /// Inbound message currently correlated with `key`
    pub fn correlation(&self, key: &Uuid) -> Option<MessageId> {
        self.correlations.get(key).map(|id| *id)
    }

    /// Take (and evict) the inbound message correlated with `key`
    pub fn take_correlation(&self, key: &Uuid) -> Option<MessageId> {
        self.correlations.remove(key).map(|(_, id)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::AcElementDeploy;
    use crate::state::{LockState, StateChangeResult};
    use serde_json::json;
    use std::sync::Arc;

    fn store() -> StateStore {
        StateStore::new(Uuid::new_v4(), vec![])
    }

    fn deploy_for(participant_id: Uuid, element_id: Uuid, timeout: i64) -> ParticipantDeploy {
        let mut properties = PropertyMap::new();
        properties.insert("timeout".to_string(), json!(timeout));
        ParticipantDeploy {
            participant_id,
            ac_element_list: vec![AcElementDeploy {
                id: element_id,
                definition: DefinitionId::new("element", "1.0.0"),
                properties,
            }],
        }
    }

    #[test]
    fn test_common_properties_not_found() {
        let store = store();
        let composition_id = Uuid::new_v4();
        let definition = DefinitionId::new("element", "1.0.0");

        let err = store.common_properties(&composition_id, &definition).unwrap_err();
        assert!(err.is_not_found());

        store.put_definitions(composition_id, vec![], None);
        let err = store.common_properties(&composition_id, &definition).unwrap_err();
        assert!(err.is_not_found());

        let mut properties = PropertyMap::new();
        properties.insert("startPhase".to_string(), json!(1));
        store.put_definitions(
            composition_id,
            vec![ElementDefinition::new(definition.clone(), properties)],
            None,
        );
        let found = store.common_properties(&composition_id, &definition).unwrap();
        assert_eq!(found["startPhase"], json!(1));
    }

    #[test]
    fn test_revision_checks() {
        let store = store();
        let composition_id = Uuid::new_v4();
        let revision = Uuid::new_v4();

        assert!(store.is_composition_current(&composition_id, None));
        assert!(!store.is_composition_current(&composition_id, Some(&revision)));

        store.put_definitions(composition_id, vec![], Some(revision));
        assert!(store.is_composition_current(&composition_id, Some(&revision)));
        assert!(!store.is_composition_current(&composition_id, Some(&Uuid::new_v4())));

        let instance_id = Uuid::new_v4();
        assert!(!store.is_instance_current(&instance_id, Some(&revision)));
        store.initialize_instance(
            composition_id,
            instance_id,
            &[],
            DeployState::Deploying,
            SubState::None,
            Some(revision),
        );
        assert!(store.is_instance_current(&instance_id, Some(&revision)));
    }

    #[test]
    fn test_initialize_keeps_only_own_elements_and_carries_over() {
        let store = store();
        let composition_id = Uuid::new_v4();
        let instance_id = Uuid::new_v4();
        let ours = Uuid::new_v4();
        let theirs = Uuid::new_v4();
        let updates = vec![
            deploy_for(store.participant_id(), ours, 30),
            deploy_for(Uuid::new_v4(), theirs, 30),
        ];

        store.initialize_instance(
            composition_id,
            instance_id,
            &updates,
            DeployState::Deploying,
            SubState::None,
            None,
        );
        store.with_instance_mut(&instance_id, |instance| {
            let element = &mut instance.elements[&ours];
            element.operational_state = Some("RUNNING".to_string());
            element.out_properties.insert("url".to_string(), json!("http://svc"));
        });

        let updates = vec![deploy_for(store.participant_id(), ours, 60)];
        store.initialize_instance(
            composition_id,
            instance_id,
            &updates,
            DeployState::Deploying,
            SubState::None,
            None,
        );

        let instance = store.get_instance(&instance_id).unwrap();
        assert_eq!(instance.elements.len(), 1);
        let element = &instance.elements[&ours];
        assert_eq!(element.properties["timeout"], json!(60));
        assert_eq!(element.operational_state.as_deref(), Some("RUNNING"));
        assert_eq!(element.out_properties["url"], json!("http://svc"));
        assert_eq!(element.deploy_state, DeployState::Deploying);
        assert_eq!(instance.deploy_state, DeployState::Deploying);
    }

    #[test]
    fn test_restore_instance_resets_sub_state() {
        let store = store();
        let element_id = Uuid::new_v4();
        let restart = ParticipantRestartAc {
            automation_composition_id: Uuid::new_v4(),
            composition_target_id: None,
            deploy_state: DeployState::Deployed,
            lock_state: LockState::Locked,
            state_change_result: StateChangeResult::NoError,
            revision_id: None,
            ac_element_list: vec![crate::messages::AcElementRestart {
                id: element_id,
                definition: DefinitionId::new("element", "1.0.0"),
                participant_id: store.participant_id(),
                deploy_state: DeployState::Deployed,
                lock_state: LockState::Locked,
                operational_state: Some("UP".to_string()),
                use_state: None,
                properties: PropertyMap::new(),
                out_properties: PropertyMap::new(),
            }],
        };

        store.restore_instance(Uuid::new_v4(), &restart);
        let instance = store.get_instance(&restart.automation_composition_id).unwrap();
        assert_eq!(instance.deploy_state, DeployState::Deployed);
        assert_eq!(instance.elements[&element_id].sub_state, SubState::None);
        assert_eq!(instance.elements[&element_id].operational_state.as_deref(), Some("UP"));
    }

    #[test]
    fn test_correlation_is_taken_once() {
        let store = store();
        let key = Uuid::new_v4();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        store.set_correlation(key, first);
        store.set_correlation(key, second);
        assert_eq!(store.correlation(&key), Some(second));
        assert_eq!(store.take_correlation(&key), Some(second));
        assert_eq!(store.take_correlation(&key), None);
    }

    #[tokio::test]
    async fn test_concurrent_element_updates_are_not_lost() {
        let store = Arc::new(store());
        let instance_id = Uuid::new_v4();
        let mut instance = Instance::new(instance_id, Uuid::new_v4());
        let ids: Vec<Uuid> = (0..32).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            instance.elements.insert(
                *id,
                Element::new(*id, DefinitionId::new("element", "1.0.0"), store.participant_id()),
            );
        }
        store.put_instance(instance);

        let handles: Vec<_> = ids
            .iter()
            .map(|id| {
                let store = store.clone();
                let id = *id;
                tokio::spawn(async move {
                    store.with_instance_mut(&instance_id, |instance| {
                        instance.elements[&id].deploy_state = DeployState::Deployed;
                    });
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let instance = store.get_instance(&instance_id).unwrap();
        assert!(instance.all_elements(|e| e.deploy_state == DeployState::Deployed));
    }
}
