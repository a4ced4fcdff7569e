// Copyright 2025 Cowboy AI, LLC.

//! Fixtures shared by the integration tests

#![allow(dead_code)]

use acm_participant::{
    AcElementDeploy, AutomationCompositionDeploy, AutomationCompositionStateChange, DefinitionId,
    DeployOrder, ElementDefinition, ElementListener, LockOrder, Participant, ParticipantConfig,
    ParticipantDefinition, ParticipantDeploy, ParticipantMessage, ParticipantPrime, PropertyMap,
    RecordingPublisher, SimConfig, SimulatorElement,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const ELEMENT_TYPE: &str = "org.onap.policy.clamp.acm.SimElement";

/// Participant wired to a simulator and a recording publisher
pub struct TestParticipant {
    pub participant: Arc<Participant>,
    pub publisher: RecordingPublisher,
    pub simulator: Arc<SimulatorElement>,
}

impl TestParticipant {
    pub fn participant_id(&self) -> Uuid {
        self.participant.store().participant_id()
    }

    pub async fn dispatch(&self, message: ParticipantMessage) {
        self.participant.dispatch(message).await;
    }
}

pub fn participant() -> TestParticipant {
    participant_with(SimConfig::default())
}

pub fn participant_with(sim_config: SimConfig) -> TestParticipant {
    let publisher = RecordingPublisher::new();
    let config = ParticipantConfig::new(Uuid::new_v4()).with_element_type(ELEMENT_TYPE, "1.0.0");
    let mut simulator = None;
    let participant = Participant::new(config, Arc::new(publisher.clone()), |aggregator| {
        let element = Arc::new(SimulatorElement::new(aggregator, sim_config));
        simulator = Some(element.clone());
        let listener: Arc<dyn ElementListener> = element;
        listener
    })
    .expect("valid participant config");
    TestParticipant {
        participant: Arc::new(participant),
        publisher,
        simulator: simulator.expect("listener factory called"),
    }
}

pub fn definition(name: &str) -> DefinitionId {
    DefinitionId::new(name, "1.0.0")
}

pub fn object(value: Value) -> PropertyMap {
    match value {
        Value::Object(map) => map,
        _ => PropertyMap::new(),
    }
}

/// Element definition declaring a start phase
pub fn phased_definition(name: &str, start_phase: i32) -> ElementDefinition {
    ElementDefinition::new(definition(name), object(json!({ "startPhase": start_phase })))
}

pub fn prime(participant_id: Uuid, composition_id: Uuid, definitions: Vec<ElementDefinition>) -> ParticipantMessage {
    ParticipantMessage::Prime(ParticipantPrime {
        message_id: Uuid::new_v4(),
        composition_id,
        revision_id_composition: None,
        participant_definition_updates: vec![ParticipantDefinition {
            participant_id,
            element_definitions: definitions,
        }],
    })
}

pub fn element(id: Uuid, name: &str, properties: Value) -> AcElementDeploy {
    AcElementDeploy {
        id,
        definition: definition(name),
        properties: object(properties),
    }
}

pub fn deploy(
    participant_id: Uuid,
    instance_id: Uuid,
    composition_id: Uuid,
    elements: Vec<AcElementDeploy>,
    start_phase: i32,
) -> AutomationCompositionDeploy {
    AutomationCompositionDeploy {
        message_id: Uuid::new_v4(),
        automation_composition_id: instance_id,
        composition_id,
        revision_id_composition: None,
        revision_id_instance: None,
        start_phase,
        first_start_phase: 0,
        participant_updates: vec![ParticipantDeploy {
            participant_id,
            ac_element_list: elements,
        }],
    }
}

pub fn state_change(
    instance_id: Uuid,
    composition_id: Uuid,
    deploy_order: DeployOrder,
    lock_order: LockOrder,
    start_phase: i32,
) -> AutomationCompositionStateChange {
    AutomationCompositionStateChange {
        message_id: Uuid::new_v4(),
        automation_composition_id: instance_id,
        composition_id,
        revision_id_composition: None,
        revision_id_instance: None,
        deploy_order_state: deploy_order,
        lock_order_state: lock_order,
        start_phase,
    }
}

/// Poll `condition` until it holds or two seconds pass
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Prime a composition and wait for its acknowledgement
pub async fn primed(test: &TestParticipant, definitions: Vec<ElementDefinition>) -> Uuid {
    let composition_id = Uuid::new_v4();
    let before = test.publisher.composition_acks().len();
    test.dispatch(prime(test.participant_id(), composition_id, definitions))
        .await;
    assert!(eventually(|| test.publisher.composition_acks().len() > before).await);
    test.publisher.clear();
    composition_id
}
