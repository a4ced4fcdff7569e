// Copyright 2025 Cowboy AI, LLC.

//! # ACM Participant
//!
//! Participant-side state reconciliation for automation composition
//! lifecycle management.
//!
//! A participant hosts the elements of automation compositions. It receives
//! lifecycle orders from the orchestrator, runs them against its element
//! implementation and reports the resulting states back:
//! - **StateStore**: local view of composition definitions and instances
//! - **AdmissionGate**: holds messages that reference revisions not yet seen
//! - **Handlers**: turn lifecycle orders into element operations
//! - **ConcurrentExecutor**: runs element operations, at most one per key
//! - **StateAggregator**: folds element reports into instance states and acknowledges
//!
//! ## Wiring
//!
//! [`Participant`] builds all of the above from a [`ParticipantConfig`], a
//! [`MessagePublisher`] and an [`ElementListener`]. The NATS transport in
//! [`infrastructure`] feeds it inbound messages.

#![warn(missing_docs)]

mod admission;
mod aggregator;
mod config;
mod errors;
mod executor;
mod identifiers;
mod listener;
mod messages;
mod model;
mod participant;
mod properties;
mod publisher;
mod simulator;
mod state;
mod store;
pub mod handlers;
pub mod infrastructure;

pub use admission::{Admission, AdmissionGate, HoldKey, StaleRefs};
pub use aggregator::StateAggregator;
pub use config::ParticipantConfig;
pub use errors::{ParticipantError, ParticipantResult};
pub use executor::{ConcurrentExecutor, ElementOp, MigrationOp, Operation, Reversion};
pub use identifiers::{CompositionId, DefinitionId, ElementId, InstanceId, MessageId, RevisionId};
pub use listener::{ElementFailure, ElementListener, ElementResult};
pub use messages::{
    AcElementDeploy, AcElementRestart, AutomationCompositionDeploy,
    AutomationCompositionMigration, AutomationCompositionMigrationPrecheck,
    AutomationCompositionPrepare, AutomationCompositionStateChange, CompositionAck,
    CompositionInfo, DefinitionInfo, ElementAck, ElementInfo, InstanceAck, InstanceInfo,
    MessageKind, OutboundMessage, ParticipantAck, ParticipantDefinition, ParticipantDeploy,
    ParticipantDeprime, ParticipantMessage, ParticipantPrime, ParticipantRestartAc,
    ParticipantStatus, ParticipantStatusReq, ParticipantSync, PropertiesUpdate, ResyncRequest,
    RevisionRefs, SupportedElementType,
};
pub use model::{
    CompositionDefinition, CompositionElementView, CompositionView, Element, ElementDefinition,
    Instance, InstanceElementView,
};
pub use participant::Participant;
pub use properties::{
    deep_merge, find_stage_set_migrate, find_stage_set_prepare, find_start_phase, merged,
    PropertyMap, StageSet,
};
pub use publisher::{MessagePublisher, RecordingPublisher};
pub use simulator::{SimConfig, SimulatorElement, VerbBehavior};
pub use state::{
    AcTypeState, DeployOrder, DeployState, ElementState, LockOrder, LockState, ParticipantState,
    State, StateChangeResult, SubState,
};
pub use store::StateStore;
