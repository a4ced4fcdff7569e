// Copyright 2025 Cowboy AI, LLC.

//! Participant facade
//!
//! Wires the store, admission gate, executor, aggregator and handlers of one
//! replica together. The transport calls [`Participant::dispatch`] for every
//! inbound message; [`Participant::start_hold_retry`] runs the single
//! background task that replays held messages.

use crate::admission::{Admission, AdmissionGate};
use crate::aggregator::StateAggregator;
use crate::config::ParticipantConfig;
use crate::errors::ParticipantResult;
use crate::executor::ConcurrentExecutor;
use crate::handlers::{
    DefinitionHandler, DeployHandler, HandlerContext, LockHandler, MigrationHandler,
    SubStateHandler, UpdateHandler,
};
use crate::listener::ElementListener;
use crate::messages::{ParticipantMessage, ParticipantStatus};
use crate::publisher::MessagePublisher;
use crate::state::DeployOrder;
use crate::store::StateStore;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One participant replica
pub struct Participant {
    config: ParticipantConfig,
    store: Arc<StateStore>,
    publisher: Arc<dyn MessagePublisher>,
    aggregator: Arc<StateAggregator>,
    executor: Arc<ConcurrentExecutor>,
    gate: AdmissionGate,
    definition: DefinitionHandler,
    deploy: DeployHandler,
    lock: LockHandler,
    update: UpdateHandler,
    migration: MigrationHandler,
    substate: SubStateHandler,
    shutdown_tx: watch::Sender<bool>,
}

impl Participant {
    /// Build a participant
    ///
    /// `make_listener` receives the aggregator the element implementation
    /// reports through.
    pub fn new(
        config: ParticipantConfig,
        publisher: Arc<dyn MessagePublisher>,
        make_listener: impl FnOnce(Arc<StateAggregator>) -> Arc<dyn ElementListener>,
    ) -> ParticipantResult<Self> {
        config.validate()?;
        let store = Arc::new(StateStore::new(
            config.participant_id,
            config.supported_element_types.clone(),
        ));
        let aggregator = Arc::new(StateAggregator::new(store.clone(), publisher.clone()));
        let listener = make_listener(aggregator.clone());
        let executor = Arc::new(ConcurrentExecutor::new(
            aggregator.clone(),
            listener,
            config.thread_count,
        ));
        let ctx = HandlerContext::new(
            store.clone(),
            aggregator.clone(),
            executor.clone(),
            publisher.clone(),
        );
        let (shutdown_tx, _) = watch::channel(false);

        info!(participant_id = %store.participant_id(), replica_id = %store.replica_id(),
            threads = config.thread_count, "Participant created");
        Ok(Self {
            gate: AdmissionGate::new(store.clone(), publisher.clone()),
            definition: DefinitionHandler::new(ctx.clone()),
            deploy: DeployHandler::new(ctx.clone()),
            lock: LockHandler::new(ctx.clone()),
            update: UpdateHandler::new(ctx.clone()),
            migration: MigrationHandler::new(ctx.clone()),
            substate: SubStateHandler::new(ctx),
            config,
            store,
            publisher,
            aggregator,
            executor,
            shutdown_tx,
        })
    }

    /// Configuration the participant was built with
    pub fn config(&self) -> &ParticipantConfig {
        &self.config
    }

    /// State store
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Aggregator element implementations report through
    pub fn aggregator(&self) -> &Arc<StateAggregator> {
        &self.aggregator
    }

    /// Executor running element operations
    pub fn executor(&self) -> &Arc<ConcurrentExecutor> {
        &self.executor
    }

    /// Admission gate
    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Admit a message and handle it, or hold it until its revisions arrive
    pub async fn dispatch(&self, message: ParticipantMessage) {
        debug!(kind = %message.kind(), message_id = %message.message_id(), "Message received");
        if let Err(e) = message.validate() {
            warn!(kind = %message.kind(), message_id = %message.message_id(), error = %e,
                "Dropping malformed message");
            return;
        }
        match self.gate.admit(message) {
            Admission::Ready(message) => self.route(message).await,
            Admission::Deferred(key) => {
                debug!(kind = %key.kind, entity_id = %key.entity_id, "Message deferred");
            }
        }
    }

    /// Handle every held message whose revisions are now present
    ///
    /// Returns the number of replayed messages.
    pub async fn retry_held_messages(&self) -> usize {
        let ready = self.gate.take_ready();
        let count = ready.len();
        for message in ready {
            info!(kind = %message.kind(), message_id = %message.message_id(), "Replaying held message");
            self.route(message).await;
        }
        count
    }

    /// Spawn the background task that replays held messages
    ///
    /// The task runs every `hold_retry_interval_ms` until [`shutdown`](Self::shutdown).
    pub fn start_hold_retry(self: &Arc<Self>) -> JoinHandle<()> {
        let participant = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let period = self.config.hold_retry_interval();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = interval.tick() => {
                        if participant.gate.held_count() > 0 {
                            participant.retry_held_messages().await;
                        }
                    }
                }
            }
            debug!("Hold retry task stopped");
        })
    }

    /// Full status of this replica
    pub fn heartbeat(&self) -> ParticipantStatus {
        self.aggregator.participant_status()
    }

    /// Publish a heartbeat
    pub fn send_heartbeat(&self) {
        if let Err(e) = self.publisher.send_status(self.heartbeat()) {
            warn!(error = %e, "Failed to send participant status");
        }
    }

    /// Stop the hold retry task and abort every running element operation
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        self.executor.shutdown();
        info!(participant_id = %self.store.participant_id(), "Participant shut down");
    }

    async fn route(&self, message: ParticipantMessage) {
        match message {
            ParticipantMessage::Prime(m) => self.definition.handle_prime(m).await,
            ParticipantMessage::Deprime(m) => self.definition.handle_deprime(m).await,
            ParticipantMessage::Sync(m) => self.definition.handle_sync(m),
            ParticipantMessage::Deploy(m) => self.deploy.handle_deploy(m).await,
            ParticipantMessage::StateChange(m) if m.deploy_order_state == DeployOrder::None => {
                self.lock.handle_state_change(m).await
            }
            ParticipantMessage::StateChange(m) => self.deploy.handle_state_change(m).await,
            ParticipantMessage::PropertiesUpdate(m) => self.update.handle_update(m).await,
            ParticipantMessage::Migrate(m) => self.migration.handle_migrate(m).await,
            ParticipantMessage::MigratePrecheck(m) => self.migration.handle_precheck(m).await,
            ParticipantMessage::Prepare(m) => self.substate.handle_prepare(m).await,
            ParticipantMessage::StatusRequest(_) => self.send_heartbeat(),
        }
    }
}

impl Drop for Participant {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}
