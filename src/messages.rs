// Copyright 2025 Cowboy AI, LLC.

//! Wire messages exchanged with the orchestrator
//!
//! Inbound messages are internally tagged by `messageType` and use camelCase
//! field names. Every inbound message carries a `messageId` which the
//! resulting acknowledgement echoes as `responseTo`.
//!
//! Revision fields are optional. An absent revision is always satisfied,
//! which keeps older orchestrators that never send one working.

use crate::errors::{ParticipantError, ParticipantResult};
use crate::identifiers::{
    CompositionId, DefinitionId, ElementId, InstanceId, MessageId, RevisionId,
};
use crate::model::ElementDefinition;
use crate::properties::PropertyMap;
use crate::state::{
    AcTypeState, DeployOrder, DeployState, LockOrder, LockState, ParticipantState,
    StateChangeResult, SubState,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Element type a participant can host
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedElementType {
    /// Element type name
    pub type_name: String,
    /// Element type version
    pub type_version: String,
}

/// Element definitions of one participant inside a prime or sync message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDefinition {
    /// Owning participant
    pub participant_id: Uuid,
    /// Definitions assigned to that participant
    #[serde(default)]
    pub element_definitions: Vec<ElementDefinition>,
}

/// Per-element deploy payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcElementDeploy {
    /// Element identity
    pub id: ElementId,
    /// Definition the element instantiates
    pub definition: DefinitionId,
    /// Instance-scoped input properties
    #[serde(default)]
    pub properties: PropertyMap,
}

/// Elements of one participant inside a deploy-family message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDeploy {
    /// Owning participant
    pub participant_id: Uuid,
    /// Elements assigned to that participant
    #[serde(default)]
    pub ac_element_list: Vec<AcElementDeploy>,
}

/// Per-element state carried by a sync (restart) message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcElementRestart {
    /// Element identity
    pub id: ElementId,
    /// Definition the element instantiates
    pub definition: DefinitionId,
    /// Owning participant
    pub participant_id: Uuid,
    /// Deploy state known to the orchestrator
    #[serde(default)]
    pub deploy_state: DeployState,
    /// Lock state known to the orchestrator
    #[serde(default)]
    pub lock_state: LockState,
    /// Last reported operational state
    #[serde(default)]
    pub operational_state: Option<String>,
    /// Last reported use state
    #[serde(default)]
    pub use_state: Option<String>,
    /// Instance-scoped input properties
    #[serde(default)]
    pub properties: PropertyMap,
    /// Last reported output properties
    #[serde(default)]
    pub out_properties: PropertyMap,
}

/// One instance carried by a sync (restart) message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRestartAc {
    /// Instance identity
    pub automation_composition_id: InstanceId,
    /// Migration target, if one is in progress
    #[serde(default)]
    pub composition_target_id: Option<CompositionId>,
    /// Aggregate deploy state
    #[serde(default)]
    pub deploy_state: DeployState,
    /// Aggregate lock state
    #[serde(default)]
    pub lock_state: LockState,
    /// Result of the last state change
    #[serde(default)]
    pub state_change_result: StateChangeResult,
    /// Current instance revision
    #[serde(default)]
    pub revision_id: Option<RevisionId>,
    /// Elements of every participant
    #[serde(default)]
    pub ac_element_list: Vec<AcElementRestart>,
}

/// Prime a composition definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantPrime {
    /// Message identity
    pub message_id: MessageId,
    /// Composition to prime
    pub composition_id: CompositionId,
    /// Revision the stored definition takes
    #[serde(default)]
    pub revision_id_composition: Option<RevisionId>,
    /// Definitions per participant
    #[serde(default)]
    pub participant_definition_updates: Vec<ParticipantDefinition>,
}

/// Deprime a composition definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDeprime {
    /// Message identity
    pub message_id: MessageId,
    /// Composition to deprime
    pub composition_id: CompositionId,
}

/// Restore (or delete) the state of one composition and its instances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSync {
    /// Message identity
    pub message_id: MessageId,
    /// Composition concerned
    pub composition_id: CompositionId,
    /// Composition revision
    #[serde(default)]
    pub revision_id_composition: Option<RevisionId>,
    /// Prime state of the composition
    #[serde(default)]
    pub state: AcTypeState,
    /// Definitions per participant
    #[serde(default)]
    pub participant_definition_updates: Vec<ParticipantDefinition>,
    /// Instances of the composition
    #[serde(default)]
    pub automation_composition_list: Vec<ParticipantRestartAc>,
    /// Replicas that must ignore this message
    #[serde(default)]
    pub exclude_replicas: Vec<Uuid>,
    /// Delete scenario instead of restore
    #[serde(default)]
    pub delete: bool,
}

/// Deploy one start phase of an instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationCompositionDeploy {
    /// Message identity
    pub message_id: MessageId,
    /// Instance to deploy
    pub automation_composition_id: InstanceId,
    /// Composition the instance is deployed from
    pub composition_id: CompositionId,
    /// Expected composition revision
    #[serde(default)]
    pub revision_id_composition: Option<RevisionId>,
    /// Revision the instance takes when initialised by this message
    #[serde(default)]
    pub revision_id_instance: Option<RevisionId>,
    /// Phase deployed by this message
    #[serde(default)]
    pub start_phase: i32,
    /// Phase that initialises the instance
    #[serde(default)]
    pub first_start_phase: i32,
    /// Elements per participant
    #[serde(default)]
    pub participant_updates: Vec<ParticipantDeploy>,
}

/// Undeploy, delete, lock or unlock one start phase of an instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationCompositionStateChange {
    /// Message identity
    pub message_id: MessageId,
    /// Instance concerned
    pub automation_composition_id: InstanceId,
    /// Composition the instance is deployed from
    pub composition_id: CompositionId,
    /// Expected composition revision
    #[serde(default)]
    pub revision_id_composition: Option<RevisionId>,
    /// Expected instance revision
    #[serde(default)]
    pub revision_id_instance: Option<RevisionId>,
    /// Deploy order, `NONE` for a lock change
    #[serde(default)]
    pub deploy_order_state: DeployOrder,
    /// Lock order
    #[serde(default)]
    pub lock_order_state: LockOrder,
    /// Phase handled by this message
    #[serde(default)]
    pub start_phase: i32,
}

/// Update the properties of a deployed instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertiesUpdate {
    /// Message identity
    pub message_id: MessageId,
    /// Instance concerned
    pub automation_composition_id: InstanceId,
    /// Composition the instance is deployed from
    pub composition_id: CompositionId,
    /// Expected composition revision
    #[serde(default)]
    pub revision_id_composition: Option<RevisionId>,
    /// Expected instance revision
    #[serde(default)]
    pub revision_id_instance: Option<RevisionId>,
    /// Elements per participant
    #[serde(default)]
    pub participant_updates: Vec<ParticipantDeploy>,
}

/// Migrate (or roll back) one stage of an instance to a target composition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationCompositionMigration {
    /// Message identity
    pub message_id: MessageId,
    /// Instance concerned
    pub automation_composition_id: InstanceId,
    /// Composition the instance is deployed from
    pub composition_id: CompositionId,
    /// Composition migrated to
    pub composition_target_id: CompositionId,
    /// Expected composition revision
    #[serde(default)]
    pub revision_id_composition: Option<RevisionId>,
    /// Expected target composition revision
    #[serde(default)]
    pub revision_id_composition_target: Option<RevisionId>,
    /// Expected instance revision
    #[serde(default)]
    pub revision_id_instance: Option<RevisionId>,
    /// Stage handled by this message
    #[serde(default)]
    pub stage: i32,
    /// Roll back instead of migrating
    #[serde(default)]
    pub rollback: bool,
    /// Elements per participant, as they are after migration
    #[serde(default)]
    pub participant_updates: Vec<ParticipantDeploy>,
}

/// Check whether a migration would succeed without performing it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationCompositionMigrationPrecheck {
    /// Message identity
    pub message_id: MessageId,
    /// Instance concerned
    pub automation_composition_id: InstanceId,
    /// Composition the instance is deployed from
    pub composition_id: CompositionId,
    /// Composition that would be migrated to
    pub composition_target_id: CompositionId,
    /// Expected composition revision
    #[serde(default)]
    pub revision_id_composition: Option<RevisionId>,
    /// Expected target composition revision
    #[serde(default)]
    pub revision_id_composition_target: Option<RevisionId>,
    /// Expected instance revision
    #[serde(default)]
    pub revision_id_instance: Option<RevisionId>,
    /// Elements per participant, as they would be after migration
    #[serde(default)]
    pub participant_updates: Vec<ParticipantDeploy>,
}

/// Prepare (pre-deploy) or review (post-undeploy) an instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationCompositionPrepare {
    /// Message identity
    pub message_id: MessageId,
    /// Instance concerned
    pub automation_composition_id: InstanceId,
    /// Composition the instance is deployed from
    pub composition_id: CompositionId,
    /// Expected composition revision
    #[serde(default)]
    pub revision_id_composition: Option<RevisionId>,
    /// Prepare: revision the new instance takes; review: expected revision
    #[serde(default)]
    pub revision_id_instance: Option<RevisionId>,
    /// Stage handled by this message
    #[serde(default)]
    pub stage: i32,
    /// `true` for prepare, `false` for review
    #[serde(default)]
    pub pre_deploy: bool,
    /// Elements per participant
    #[serde(default)]
    pub participant_list: Vec<ParticipantDeploy>,
}

/// Ask the participant for its status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantStatusReq {
    /// Message identity
    pub message_id: MessageId,
}

/// Every message the orchestrator sends to a participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "messageType")]
pub enum ParticipantMessage {
    /// Prime a composition
    #[serde(rename = "PARTICIPANT_PRIME")]
    Prime(ParticipantPrime),
    /// Deprime a composition
    #[serde(rename = "PARTICIPANT_DEPRIME")]
    Deprime(ParticipantDeprime),
    /// Restore or delete a composition and its instances
    #[serde(rename = "PARTICIPANT_SYNC_MSG")]
    Sync(ParticipantSync),
    /// Deploy one phase of an instance
    #[serde(rename = "AUTOMATION_COMPOSITION_DEPLOY")]
    Deploy(AutomationCompositionDeploy),
    /// Undeploy, delete, lock or unlock one phase of an instance
    #[serde(rename = "AUTOMATION_COMPOSITION_STATE_CHANGE")]
    StateChange(AutomationCompositionStateChange),
    /// Update instance properties
    #[serde(rename = "PROPERTIES_UPDATE")]
    PropertiesUpdate(PropertiesUpdate),
    /// Migrate or roll back one stage of an instance
    #[serde(rename = "AUTOMATION_COMPOSITION_MIGRATION")]
    Migrate(AutomationCompositionMigration),
    /// Migration precheck
    #[serde(rename = "AUTOMATION_COMPOSITION_MIGRATION_PRECHECK")]
    MigratePrecheck(AutomationCompositionMigrationPrecheck),
    /// Prepare or review an instance
    #[serde(rename = "AUTOMATION_COMPOSITION_PREPARE")]
    Prepare(AutomationCompositionPrepare),
    /// Status request
    #[serde(rename = "PARTICIPANT_STATUS_REQ")]
    StatusRequest(ParticipantStatusReq),
}

/// Discriminant of an inbound message, used to key held messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    /// `PARTICIPANT_PRIME`
    Prime,
    /// `PARTICIPANT_DEPRIME`
    Deprime,
    /// `PARTICIPANT_SYNC_MSG`
    Sync,
    /// `AUTOMATION_COMPOSITION_DEPLOY`
    Deploy,
    /// `AUTOMATION_COMPOSITION_STATE_CHANGE`
    StateChange,
    /// `PROPERTIES_UPDATE`
    PropertiesUpdate,
    /// `AUTOMATION_COMPOSITION_MIGRATION`
    Migrate,
    /// `AUTOMATION_COMPOSITION_MIGRATION_PRECHECK`
    MigratePrecheck,
    /// `AUTOMATION_COMPOSITION_PREPARE` with `preDeploy`
    Prepare,
    /// `AUTOMATION_COMPOSITION_PREPARE` without `preDeploy`
    Review,
    /// `PARTICIPANT_STATUS_REQ`
    StatusRequest,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Prime => "PARTICIPANT_PRIME",
            Self::Deprime => "PARTICIPANT_DEPRIME",
            Self::Sync => "PARTICIPANT_SYNC_MSG",
            Self::Deploy => "AUTOMATION_COMPOSITION_DEPLOY",
            Self::StateChange => "AUTOMATION_COMPOSITION_STATE_CHANGE",
            Self::PropertiesUpdate => "PROPERTIES_UPDATE",
            Self::Migrate => "AUTOMATION_COMPOSITION_MIGRATION",
            Self::MigratePrecheck => "AUTOMATION_COMPOSITION_MIGRATION_PRECHECK",
            Self::Prepare => "AUTOMATION_COMPOSITION_PREPARE",
            Self::Review => "AUTOMATION_COMPOSITION_REVIEW",
            Self::StatusRequest => "PARTICIPANT_STATUS_REQ",
        };
        f.write_str(name)
    }
}

/// Mutable access to the revision expectations of a message
///
/// Each slot pairs the referenced id with the expected revision. A slot is
/// `None` when the message kind never checks that reference.
#[derive(Debug, Default)]
pub struct RevisionRefs<'a> {
    /// Composition the message is built against
    pub composition: Option<(CompositionId, &'a mut Option<RevisionId>)>,
    /// Migration target composition
    pub target: Option<(CompositionId, &'a mut Option<RevisionId>)>,
    /// Instance the message changes
    pub instance: Option<(InstanceId, &'a mut Option<RevisionId>)>,
}

impl ParticipantMessage {
    /// Identity of the message
    pub fn message_id(&self) -> MessageId {
        match self {
            Self::Prime(m) => m.message_id,
            Self::Deprime(m) => m.message_id,
            Self::Sync(m) => m.message_id,
            Self::Deploy(m) => m.message_id,
            Self::StateChange(m) => m.message_id,
            Self::PropertiesUpdate(m) => m.message_id,
            Self::Migrate(m) => m.message_id,
            Self::MigratePrecheck(m) => m.message_id,
            Self::Prepare(m) => m.message_id,
            Self::StatusRequest(m) => m.message_id,
        }
    }

    /// Kind of the message
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Prime(_) => MessageKind::Prime,
            Self::Deprime(_) => MessageKind::Deprime,
            Self::Sync(_) => MessageKind::Sync,
            Self::Deploy(_) => MessageKind::Deploy,
            Self::StateChange(_) => MessageKind::StateChange,
            Self::PropertiesUpdate(_) => MessageKind::PropertiesUpdate,
            Self::Migrate(_) => MessageKind::Migrate,
            Self::MigratePrecheck(_) => MessageKind::MigratePrecheck,
            Self::Prepare(m) if m.pre_deploy => MessageKind::Prepare,
            Self::Prepare(_) => MessageKind::Review,
            Self::StatusRequest(_) => MessageKind::StatusRequest,
        }
    }

    /// Instance or composition the message is about
    pub fn entity_id(&self) -> Uuid {
        match self {
            Self::Prime(m) => m.composition_id,
            Self::Deprime(m) => m.composition_id,
            Self::Sync(m) => m.composition_id,
            Self::Deploy(m) => m.automation_composition_id,
            Self::StateChange(m) => m.automation_composition_id,
            Self::PropertiesUpdate(m) => m.automation_composition_id,
            Self::Migrate(m) => m.automation_composition_id,
            Self::MigratePrecheck(m) => m.automation_composition_id,
            Self::Prepare(m) => m.automation_composition_id,
            Self::StatusRequest(m) => m.message_id,
        }
    }

    /// Phase or stage the message handles, `0` for single-wave messages
    pub fn wave(&self) -> i32 {
        match self {
            Self::Deploy(m) => m.start_phase,
            Self::StateChange(m) => m.start_phase,
            Self::Migrate(m) => m.stage,
            Self::Prepare(m) => m.stage,
            _ => 0,
        }
    }

    /// Reject messages that cannot be acted on
    pub fn validate(&self) -> ParticipantResult<()> {
        let missing = |what: &str| {
            Err(ParticipantError::InvalidMessage(format!("{} without {what}", self.kind())))
        };
        match self {
            Self::Deploy(m) if m.participant_updates.is_empty() => missing("participant updates"),
            Self::PropertiesUpdate(m) if m.participant_updates.is_empty() => missing("participant updates"),
            Self::Migrate(m) if m.participant_updates.is_empty() => missing("participant updates"),
            Self::Prepare(m) if m.pre_deploy && m.participant_list.is_empty() => missing("participant list"),
            Self::StateChange(m)
                if m.deploy_order_state == DeployOrder::None && m.lock_order_state == LockOrder::None =>
            {
                missing("deploy or lock order")
            }
            _ => Ok(()),
        }
    }

    /// Revision expectations the admission gate must check
    pub fn revision_refs(&mut self) -> RevisionRefs<'_> {
        match self {
            Self::Deploy(m) => RevisionRefs {
                composition: Some((m.composition_id, &mut m.revision_id_composition)),
                ..Default::default()
            },
            Self::StateChange(m) => RevisionRefs {
                composition: Some((m.composition_id, &mut m.revision_id_composition)),
                instance: Some((m.automation_composition_id, &mut m.revision_id_instance)),
                ..Default::default()
            },
            Self::PropertiesUpdate(m) => RevisionRefs {
                composition: Some((m.composition_id, &mut m.revision_id_composition)),
                instance: Some((m.automation_composition_id, &mut m.revision_id_instance)),
                ..Default::default()
            },
            Self::Migrate(m) => RevisionRefs {
                composition: Some((m.composition_id, &mut m.revision_id_composition)),
                target: Some((m.composition_target_id, &mut m.revision_id_composition_target)),
                instance: Some((m.automation_composition_id, &mut m.revision_id_instance)),
            },
            Self::MigratePrecheck(m) => RevisionRefs {
                composition: Some((m.composition_id, &mut m.revision_id_composition)),
                target: Some((m.composition_target_id, &mut m.revision_id_composition_target)),
                instance: Some((m.automation_composition_id, &mut m.revision_id_instance)),
            },
            Self::Prepare(m) => RevisionRefs {
                composition: Some((m.composition_id, &mut m.revision_id_composition)),
                // prepare carries the revision the new instance takes
                instance: if m.pre_deploy {
                    None
                } else {
                    Some((m.automation_composition_id, &mut m.revision_id_instance))
                },
                ..Default::default()
            },
            Self::Prime(_) | Self::Deprime(_) | Self::Sync(_) | Self::StatusRequest(_) => {
                RevisionRefs::default()
            }
        }
    }
}

/// Per-element result inside an instance acknowledgement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementAck {
    /// Element deploy state after the change
    pub deploy_state: DeployState,
    /// Element lock state after the change
    pub lock_state: LockState,
    /// Operational state
    pub operational_state: Option<String>,
    /// Use state
    pub use_state: Option<String>,
    /// Output properties
    pub out_properties: PropertyMap,
    /// Whether the element change succeeded
    pub result: bool,
    /// Human-readable detail
    pub message: String,
    /// Next migration stage, when the element finished a stage but not the migration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<i32>,
}

/// Acknowledgement of an instance-level state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceAck {
    /// Sender
    pub participant_id: Uuid,
    /// Sender replica
    pub replica_id: Uuid,
    /// Inbound message answered, when known
    pub response_to: Option<MessageId>,
    /// Instance concerned
    pub automation_composition_id: InstanceId,
    /// Aggregate deploy state after the change
    pub deploy_state: DeployState,
    /// Aggregate lock state after the change
    pub lock_state: LockState,
    /// Whether the change was accepted
    pub result: bool,
    /// Outcome
    pub state_change_result: StateChangeResult,
    /// Human-readable detail
    pub message: String,
    /// Per-element results
    pub automation_composition_result_map: BTreeMap<ElementId, ElementAck>,
    /// Creation time
    pub timestamp: DateTime<Utc>,
}

/// Acknowledgement of a prime or deprime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionAck {
    /// Sender
    pub participant_id: Uuid,
    /// Sender replica
    pub replica_id: Uuid,
    /// Inbound message answered, when known
    pub response_to: Option<MessageId>,
    /// Composition concerned
    pub composition_id: CompositionId,
    /// Prime state after the change
    pub composition_state: AcTypeState,
    /// Outcome
    pub state_change_result: StateChangeResult,
    /// Whether the change was accepted
    pub result: bool,
    /// Human-readable detail
    pub message: String,
    /// Creation time
    pub timestamp: DateTime<Utc>,
}

/// Any acknowledgement the participant emits
#[derive(Debug, Clone, PartialEq)]
pub enum ParticipantAck {
    /// Instance-level acknowledgement
    Instance(InstanceAck),
    /// Composition-level acknowledgement
    Composition(CompositionAck),
}

impl ParticipantAck {
    /// Inbound message answered, when known
    pub fn response_to(&self) -> Option<MessageId> {
        match self {
            Self::Instance(ack) => ack.response_to,
            Self::Composition(ack) => ack.response_to,
        }
    }

    /// Outcome carried by the acknowledgement
    pub fn state_change_result(&self) -> StateChangeResult {
        match self {
            Self::Instance(ack) => ack.state_change_result,
            Self::Composition(ack) => ack.state_change_result,
        }
    }
}

/// Non-state element information reported in a status message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementInfo {
    /// Element identity
    pub element_id: ElementId,
    /// Deploy state
    pub deploy_state: DeployState,
    /// Lock state
    pub lock_state: LockState,
    /// Operational state
    pub operational_state: Option<String>,
    /// Use state
    pub use_state: Option<String>,
    /// Output properties
    pub out_properties: PropertyMap,
}

/// Instance summary reported in a status message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceInfo {
    /// Instance identity
    pub automation_composition_id: InstanceId,
    /// Aggregate deploy state
    pub deploy_state: DeployState,
    /// Aggregate lock state
    pub lock_state: LockState,
    /// Aggregate sub-state
    pub sub_state: SubState,
    /// Per-element information
    pub elements: Vec<ElementInfo>,
}

/// Output properties of one element definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionInfo {
    /// Catalog key
    pub definition_id: DefinitionId,
    /// Output properties
    pub out_properties: PropertyMap,
}

/// Composition summary reported in a status message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionInfo {
    /// Composition identity
    pub composition_id: CompositionId,
    /// Prime state
    pub state: AcTypeState,
    /// Definition output properties
    pub element_definitions: Vec<DefinitionInfo>,
}

/// Participant status, sent on request, on element info changes and as heartbeat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantStatus {
    /// Sender
    pub participant_id: Uuid,
    /// Sender replica
    pub replica_id: Uuid,
    /// Availability
    pub state: ParticipantState,
    /// Element types this participant hosts
    pub supported_element_types: Vec<SupportedElementType>,
    /// Instances touched by this status, or all of them for a full status
    pub automation_composition_info_list: Vec<InstanceInfo>,
    /// Compositions touched by this status, or all of them for a full status
    pub composition_info_list: Vec<CompositionInfo>,
    /// Creation time
    pub timestamp: DateTime<Utc>,
}

/// Ask the orchestrator to resend authoritative state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResyncRequest {
    /// Sender
    pub participant_id: Uuid,
    /// Sender replica
    pub replica_id: Uuid,
    /// Stale composition, if any
    pub composition_id: Option<CompositionId>,
    /// Stale target composition, if any
    pub composition_target_id: Option<CompositionId>,
    /// Stale instance, if any
    pub automation_composition_id: Option<InstanceId>,
    /// Creation time
    pub timestamp: DateTime<Utc>,
}

/// Every message a participant sends to the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "messageType")]
pub enum OutboundMessage {
    /// Instance acknowledgement
    #[serde(rename = "AUTOMATION_COMPOSITION_STATECHANGE_ACK")]
    InstanceAck(InstanceAck),
    /// Composition acknowledgement
    #[serde(rename = "PARTICIPANT_PRIME_ACK")]
    CompositionAck(CompositionAck),
    /// Status
    #[serde(rename = "PARTICIPANT_STATUS")]
    Status(ParticipantStatus),
    /// Resync request
    #[serde(rename = "PARTICIPANT_REQ_SYNC_MSG")]
    ResyncRequest(ResyncRequest),
}

impl From<ParticipantAck> for OutboundMessage {
    fn from(ack: ParticipantAck) -> Self {
        match ack {
            ParticipantAck::Instance(ack) => Self::InstanceAck(ack),
            ParticipantAck::Composition(ack) => Self::CompositionAck(ack),
        }
    }
}
