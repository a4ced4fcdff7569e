// Copyright 2025 Cowboy AI, LLC.

//! Deploy, lock, update and delete driven through a participant and the simulator

mod common;

use acm_participant::{
    AcTypeState, DeployOrder, DeployState, LockOrder, LockState, ParticipantDeploy,
    ParticipantDeprime, ParticipantMessage, PropertiesUpdate, SimConfig, StateChangeResult,
    VerbBehavior,
};
use common::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use test_case::test_case;
use uuid::Uuid;

#[tokio::test]
async fn test_deploy_single_element_end_to_end() {
    let test = participant_with(SimConfig {
        deploy: VerbBehavior::succeed_after(50),
        ..Default::default()
    });
    let composition_id = primed(&test, vec![phased_definition("a", 0)]).await;
    let (instance_id, e1) = (Uuid::new_v4(), Uuid::new_v4());

    let message = deploy(test.participant_id(), instance_id, composition_id, vec![element(e1, "a", json!({}))], 0);
    let message_id = message.message_id;
    test.dispatch(ParticipantMessage::Deploy(message)).await;

    let instance = test.participant.store().get_instance(&instance_id).unwrap();
    assert_eq!(instance.deploy_state, DeployState::Deploying);
    assert_eq!(instance.elements[&e1].deploy_state, DeployState::Deploying);
    assert!(test.participant.executor().is_in_flight(&e1));

    assert!(eventually(|| test.publisher.instance_acks().len() == 1).await);
    let ack = &test.publisher.instance_acks()[0];
    assert_eq!(ack.response_to, Some(message_id));
    assert_eq!(ack.deploy_state, DeployState::Deployed);
    assert_eq!(ack.state_change_result, StateChangeResult::NoError);

    let instance = test.participant.store().get_instance(&instance_id).unwrap();
    assert_eq!(instance.deploy_state, DeployState::Deployed);
    assert_eq!(instance.lock_state, LockState::Locked);
    assert!(test.participant.store().correlation(&e1).is_none());
}

#[tokio::test]
async fn test_deploy_promotes_only_after_last_phase() {
    let test = participant();
    let composition_id = primed(&test, vec![phased_definition("a", 0), phased_definition("b", 1)]).await;
    let (instance_id, e1, e2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let elements = vec![element(e1, "a", json!({})), element(e2, "b", json!({}))];

    test.dispatch(ParticipantMessage::Deploy(deploy(
        test.participant_id(), instance_id, composition_id, elements.clone(), 0,
    )))
    .await;
    assert!(eventually(|| test.publisher.instance_acks().len() == 1).await);
    let instance = test.participant.store().get_instance(&instance_id).unwrap();
    assert_eq!(instance.deploy_state, DeployState::Deploying);
    assert_eq!(instance.elements[&e1].deploy_state, DeployState::Deployed);
    assert_eq!(instance.elements[&e2].deploy_state, DeployState::Deploying);

    test.dispatch(ParticipantMessage::Deploy(deploy(
        test.participant_id(), instance_id, composition_id, elements, 1,
    )))
    .await;
    assert!(eventually(|| test.publisher.instance_acks().len() == 2).await);
    let acks = test.publisher.instance_acks();
    assert_eq!(acks[0].deploy_state, DeployState::Deploying);
    assert_eq!(acks[1].deploy_state, DeployState::Deployed);
}

#[tokio::test]
async fn test_undeploy_then_delete_removes_instance() {
    let test = participant();
    let composition_id = primed(&test, vec![phased_definition("a", 0)]).await;
    let (instance_id, e1) = (Uuid::new_v4(), Uuid::new_v4());
    test.dispatch(ParticipantMessage::Deploy(deploy(
        test.participant_id(), instance_id, composition_id, vec![element(e1, "a", json!({}))], 0,
    )))
    .await;
    assert!(eventually(|| test.publisher.instance_acks().len() == 1).await);

    test.dispatch(ParticipantMessage::StateChange(state_change(
        instance_id, composition_id, DeployOrder::Undeploy, LockOrder::None, 0,
    )))
    .await;
    assert!(eventually(|| test.publisher.instance_acks().len() == 2).await);
    let instance = test.participant.store().get_instance(&instance_id).unwrap();
    assert_eq!(instance.deploy_state, DeployState::Undeployed);
    assert_eq!(instance.lock_state, LockState::None);

    test.dispatch(ParticipantMessage::StateChange(state_change(
        instance_id, composition_id, DeployOrder::Delete, LockOrder::None, 0,
    )))
    .await;
    assert!(eventually(|| test.publisher.instance_acks().len() == 3).await);
    assert_eq!(test.publisher.instance_acks()[2].deploy_state, DeployState::Deleted);
    assert!(test.participant.store().get_instance(&instance_id).is_none());
}

#[tokio::test]
async fn test_delete_of_unknown_instance_is_acknowledged() {
    let test = participant();
    let message = state_change(Uuid::new_v4(), Uuid::new_v4(), DeployOrder::Delete, LockOrder::None, 0);
    let message_id = message.message_id;

    test.dispatch(ParticipantMessage::StateChange(message)).await;

    let acks = test.publisher.instance_acks();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].response_to, Some(message_id));
    assert_eq!(acks[0].deploy_state, DeployState::Deleted);
    assert_eq!(acks[0].state_change_result, StateChangeResult::NoError);
    assert_eq!(acks[0].message, "Already deleted or never used");
    assert_eq!(test.participant.executor().in_flight_count(), 0);
}

#[tokio::test]
async fn test_undeploy_of_unknown_instance_is_dropped() {
    let test = participant();
    test.dispatch(ParticipantMessage::StateChange(state_change(
        Uuid::new_v4(), Uuid::new_v4(), DeployOrder::Undeploy, LockOrder::None, 0,
    )))
    .await;
    assert!(test.publisher.is_empty());
}

#[tokio::test]
async fn test_deprime_of_unknown_composition_is_benign() {
    let test = participant();
    let message_id = Uuid::new_v4();
    let composition_id = Uuid::new_v4();

    test.dispatch(ParticipantMessage::Deprime(ParticipantDeprime {
        message_id,
        composition_id,
    }))
    .await;

    let acks = test.publisher.composition_acks();
    assert_eq!(acks.len(), 1);
    assert!(acks[0].result);
    assert_eq!(acks[0].response_to, Some(message_id));
    assert_eq!(acks[0].state_change_result, StateChangeResult::NoError);
    assert_eq!(acks[0].message, "Already deprimed or never primed");
    assert!(test.participant.store().definitions().is_empty());
}

#[tokio::test]
async fn test_deprime_removes_primed_composition() {
    let test = participant();
    let composition_id = primed(&test, vec![phased_definition("a", 0)]).await;
    assert_eq!(
        test.participant.store().get_definition(&composition_id).unwrap().state,
        AcTypeState::Primed
    );

    test.dispatch(ParticipantMessage::Deprime(ParticipantDeprime {
        message_id: Uuid::new_v4(),
        composition_id,
    }))
    .await;

    assert!(eventually(|| test.publisher.composition_acks().len() == 1).await);
    assert_eq!(test.publisher.composition_acks()[0].composition_state, AcTypeState::Commissioned);
    assert!(!test.participant.store().contains_definition(&composition_id));
}

#[tokio::test]
async fn test_unlock_runs_phase_by_phase() {
    let test = participant();
    let composition_id = primed(&test, vec![phased_definition("a", 0), phased_definition("b", 1)]).await;
    let (instance_id, e1, e2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let elements = vec![element(e1, "a", json!({})), element(e2, "b", json!({}))];
    for phase in 0..2 {
        test.dispatch(ParticipantMessage::Deploy(deploy(
            test.participant_id(), instance_id, composition_id, elements.clone(), phase,
        )))
        .await;
    }
    assert!(eventually(|| test.publisher.instance_acks().len() == 2).await);

    test.dispatch(ParticipantMessage::StateChange(state_change(
        instance_id, composition_id, DeployOrder::None, LockOrder::Unlock, 0,
    )))
    .await;
    assert!(eventually(|| test.publisher.instance_acks().len() == 3).await);
    let instance = test.participant.store().get_instance(&instance_id).unwrap();
    assert_eq!(instance.lock_state, LockState::Unlocking);
    assert_eq!(instance.elements[&e1].lock_state, LockState::Unlocked);
    assert_eq!(instance.elements[&e2].lock_state, LockState::Locked);

    test.dispatch(ParticipantMessage::StateChange(state_change(
        instance_id, composition_id, DeployOrder::None, LockOrder::Unlock, 1,
    )))
    .await;
    assert!(eventually(|| test.publisher.instance_acks().len() == 4).await);
    let instance = test.participant.store().get_instance(&instance_id).unwrap();
    assert_eq!(instance.lock_state, LockState::Unlocked);
}

#[tokio::test]
async fn test_properties_update_deep_merges() {
    let test = participant();
    let composition_id = primed(&test, vec![phased_definition("a", 0)]).await;
    let (instance_id, e1) = (Uuid::new_v4(), Uuid::new_v4());
    test.dispatch(ParticipantMessage::Deploy(deploy(
        test.participant_id(), instance_id, composition_id,
        vec![element(e1, "a", json!({ "timeout": 30 }))], 0,
    )))
    .await;
    assert!(eventually(|| test.publisher.instance_acks().len() == 1).await);

    test.dispatch(ParticipantMessage::PropertiesUpdate(PropertiesUpdate {
        message_id: Uuid::new_v4(),
        automation_composition_id: instance_id,
        composition_id,
        revision_id_composition: None,
        revision_id_instance: None,
        participant_updates: vec![ParticipantDeploy {
            participant_id: test.participant_id(),
            ac_element_list: vec![element(e1, "a", json!({ "timeout": 60, "retries": 3 }))],
        }],
    }))
    .await;

    assert!(eventually(|| test.publisher.instance_acks().len() == 2).await);
    let ack = &test.publisher.instance_acks()[1];
    assert_eq!(ack.deploy_state, DeployState::Deployed);
    assert_eq!(ack.message, "Updated");
    let instance = test.participant.store().get_instance(&instance_id).unwrap();
    assert_eq!(instance.elements[&e1].properties, object(json!({ "timeout": 60, "retries": 3 })));
}

#[tokio::test]
async fn test_properties_update_adds_and_drops_elements() {
    let test = participant();
    let composition_id = primed(&test, vec![phased_definition("a", 0)]).await;
    let (instance_id, e1, e2, e3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    test.dispatch(ParticipantMessage::Deploy(deploy(
        test.participant_id(), instance_id, composition_id,
        vec![element(e1, "a", json!({})), element(e3, "a", json!({}))], 0,
    )))
    .await;
    assert!(eventually(|| test.publisher.instance_acks().len() == 2).await);

    test.dispatch(ParticipantMessage::PropertiesUpdate(PropertiesUpdate {
        message_id: Uuid::new_v4(),
        automation_composition_id: instance_id,
        composition_id,
        revision_id_composition: None,
        revision_id_instance: None,
        participant_updates: vec![ParticipantDeploy {
            participant_id: test.participant_id(),
            ac_element_list: vec![element(e1, "a", json!({})), element(e2, "a", json!({ "retries": 3 }))],
        }],
    }))
    .await;

    assert!(eventually(|| test.publisher.instance_acks().len() == 4).await);
    let instance = test.participant.store().get_instance(&instance_id).unwrap();
    assert_eq!(instance.deploy_state, DeployState::Deployed);
    assert_eq!(instance.elements.keys().copied().collect::<Vec<_>>(), vec![e1, e2]);
    assert_eq!(instance.elements[&e2].properties, object(json!({ "retries": 3 })));
    assert_eq!(instance.elements[&e2].lock_state, LockState::Locked);
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Failing {
    Deploy,
    Undeploy,
    Lock,
    Unlock,
}

#[test_case(Failing::Deploy, DeployState::Undeployed, LockState::None, "Deploy failed!" ; "deploy reverts to undeployed")]
#[test_case(Failing::Undeploy, DeployState::Deployed, LockState::Locked, "Undeploy failed!" ; "undeploy reverts to deployed")]
#[test_case(Failing::Lock, DeployState::Deployed, LockState::Unlocked, "Lock failed!" ; "lock reverts to unlocked")]
#[test_case(Failing::Unlock, DeployState::Deployed, LockState::Locked, "Unlock failed!" ; "unlock reverts to locked")]
#[tokio::test]
async fn test_failed_operation_reverts_element(
    failing: Failing,
    deploy_state: DeployState,
    lock_state: LockState,
    message: &str,
) {
    let mut sim = SimConfig::default();
    match failing {
        Failing::Deploy => sim.deploy = VerbBehavior::fail_after(0),
        Failing::Undeploy => sim.undeploy = VerbBehavior::fail_after(0),
        Failing::Lock => sim.lock = VerbBehavior::fail_after(0),
        Failing::Unlock => sim.unlock = VerbBehavior::fail_after(0),
    }
    let test = participant_with(sim);
    let composition_id = primed(&test, vec![phased_definition("a", 0)]).await;
    let (instance_id, e1) = (Uuid::new_v4(), Uuid::new_v4());
    let change = |deploy_order, lock_order| {
        ParticipantMessage::StateChange(state_change(instance_id, composition_id, deploy_order, lock_order, 0))
    };

    test.dispatch(ParticipantMessage::Deploy(deploy(
        test.participant_id(), instance_id, composition_id, vec![element(e1, "a", json!({}))], 0,
    )))
    .await;
    let mut expected_acks = 1;
    assert!(eventually(|| test.publisher.instance_acks().len() == expected_acks).await);

    let follow_up = match failing {
        Failing::Deploy => vec![],
        Failing::Undeploy => vec![change(DeployOrder::Undeploy, LockOrder::None)],
        Failing::Unlock => vec![change(DeployOrder::None, LockOrder::Unlock)],
        Failing::Lock => vec![
            change(DeployOrder::None, LockOrder::Unlock),
            change(DeployOrder::None, LockOrder::Lock),
        ],
    };
    for message in follow_up {
        test.dispatch(message).await;
        expected_acks += 1;
        assert!(eventually(|| test.publisher.instance_acks().len() == expected_acks).await);
    }

    let acks = test.publisher.instance_acks();
    let last = acks.last().unwrap();
    assert_eq!(last.state_change_result, StateChangeResult::Failed);
    assert_eq!(last.message, message);
    let element = &last.automation_composition_result_map[&e1];
    assert_eq!(element.deploy_state, deploy_state);
    assert_eq!(element.lock_state, lock_state);
}
