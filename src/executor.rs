// Copyright 2025 Cowboy AI, LLC.

//! Bounded, cancellable execution of element operations
//!
//! Every [`Operation`] runs on its own tokio task, gated by a semaphore sized
//! to the configured thread count. Tasks are keyed by element id (or
//! composition id for prime and deprime); submitting under a key aborts the
//! task previously submitted under it. An aborted callback that already
//! reported state is not rolled back: the last report wins.

use crate::aggregator::StateAggregator;
use crate::errors::{ParticipantError, ParticipantResult};
use crate::identifiers::{CompositionId, ElementId, InstanceId, MessageId};
use crate::listener::{ElementListener, ElementResult};
use crate::model::{CompositionElementView, CompositionView, InstanceElementView};
use crate::state::{AcTypeState, DeployState, LockState, StateChangeResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::AbortHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// Views for an operation on one element
#[derive(Debug, Clone, PartialEq)]
pub struct ElementOp {
    /// Definition of the element
    pub composition_element: CompositionElementView,
    /// The element
    pub instance_element: InstanceElementView,
}

/// Views for one migration stage of one element
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationOp {
    /// Definition before migration
    pub composition_element: CompositionElementView,
    /// Definition after migration
    pub composition_element_target: CompositionElementView,
    /// Element before migration
    pub instance_element: InstanceElementView,
    /// Element after migration
    pub instance_element_migrate: InstanceElementView,
    /// Stage being run
    pub stage: i32,
}

/// One call on the element listener
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Deploy
    Deploy(ElementOp),
    /// Undeploy
    Undeploy(ElementOp),
    /// Lock
    Lock(ElementOp),
    /// Unlock
    Unlock(ElementOp),
    /// Delete
    Delete(ElementOp),
    /// Property update, with the view after the update
    Update(ElementOp, InstanceElementView),
    /// Migration stage
    Migrate(MigrationOp),
    /// Rollback stage
    Rollback(MigrationOp),
    /// Migration precheck
    MigratePrecheck(MigrationOp),
    /// Prepare stage
    Prepare(ElementOp, i32),
    /// Review
    Review(ElementOp),
    /// Prime a composition
    Prime(CompositionView),
    /// Deprime a composition
    Deprime(CompositionView),
}

/// State an element or composition falls back to when its operation fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reversion {
    /// Revert an element
    Element {
        /// Owning instance
        instance_id: InstanceId,
        /// Element
        element_id: ElementId,
        /// Deploy state to report
        deploy_state: Option<DeployState>,
        /// Lock state to report
        lock_state: Option<LockState>,
    },
    /// Revert a composition definition
    Composition {
        /// Composition
        composition_id: CompositionId,
        /// Prime state to report
        state: AcTypeState,
    },
}

impl Operation {
    /// Verb name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Deploy(_) => "deploy",
            Self::Undeploy(_) => "undeploy",
            Self::Lock(_) => "lock",
            Self::Unlock(_) => "unlock",
            Self::Delete(_) => "delete",
            Self::Update(..) => "update",
            Self::Migrate(_) => "migrate",
            Self::Rollback(_) => "rollback",
            Self::MigratePrecheck(_) => "migrate-precheck",
            Self::Prepare(..) => "prepare",
            Self::Review(_) => "review",
            Self::Prime(_) => "prime",
            Self::Deprime(_) => "deprime",
        }
    }

    /// Key the operation runs under
    pub fn key(&self) -> Uuid {
        match self {
            Self::Deploy(op)
            | Self::Undeploy(op)
            | Self::Lock(op)
            | Self::Unlock(op)
            | Self::Delete(op)
            | Self::Update(op, _)
            | Self::Prepare(op, _)
            | Self::Review(op) => op.instance_element.element_id,
            Self::Migrate(op) | Self::Rollback(op) | Self::MigratePrecheck(op) => {
                op.instance_element.element_id
            }
            Self::Prime(composition) | Self::Deprime(composition) => composition.composition_id,
        }
    }

    /// Where the element or composition goes if the callback fails
    pub fn reversion(&self) -> Reversion {
        let element = |op: &InstanceElementView, deploy_state, lock_state| Reversion::Element {
            instance_id: op.instance_id,
            element_id: op.element_id,
            deploy_state,
            lock_state,
        };
        match self {
            Self::Deploy(op) | Self::Delete(op) | Self::Prepare(op, _) => {
                element(&op.instance_element, Some(DeployState::Undeployed), None)
            }
            Self::Undeploy(op) | Self::Update(op, _) | Self::Review(op) => {
                element(&op.instance_element, Some(DeployState::Deployed), None)
            }
            Self::Migrate(op) | Self::Rollback(op) | Self::MigratePrecheck(op) => {
                element(&op.instance_element, Some(DeployState::Deployed), None)
            }
            Self::Lock(op) => element(&op.instance_element, None, Some(LockState::Unlocked)),
            Self::Unlock(op) => element(&op.instance_element, None, Some(LockState::Locked)),
            Self::Prime(composition) => Reversion::Composition {
                composition_id: composition.composition_id,
                state: AcTypeState::Commissioned,
            },
            Self::Deprime(composition) => Reversion::Composition {
                composition_id: composition.composition_id,
                state: AcTypeState::Primed,
            },
        }
    }

    /// Call the matching listener method
    pub async fn invoke(self, listener: &dyn ElementListener) -> ElementResult {
        match self {
            Self::Deploy(op) => listener.deploy(op.composition_element, op.instance_element).await,
            Self::Undeploy(op) => listener.undeploy(op.composition_element, op.instance_element).await,
            Self::Lock(op) => listener.lock(op.composition_element, op.instance_element).await,
            Self::Unlock(op) => listener.unlock(op.composition_element, op.instance_element).await,
            Self::Delete(op) => listener.delete(op.composition_element, op.instance_element).await,
            Self::Update(op, updated) => {
                listener
                    .update(op.composition_element, op.instance_element, updated)
                    .await
            }
            Self::Migrate(op) => {
                listener
                    .migrate(
                        op.composition_element,
                        op.composition_element_target,
                        op.instance_element,
                        op.instance_element_migrate,
                        op.stage,
                    )
                    .await
            }
            Self::Rollback(op) => {
                listener
                    .rollback_migration(
                        op.composition_element,
                        op.composition_element_target,
                        op.instance_element,
                        op.instance_element_migrate,
                        op.stage,
                    )
                    .await
            }
            Self::MigratePrecheck(op) => {
                listener
                    .migrate_precheck(
                        op.composition_element,
                        op.composition_element_target,
                        op.instance_element,
                        op.instance_element_migrate,
                    )
                    .await
            }
            Self::Prepare(op, stage) => {
                listener
                    .prepare(op.composition_element, op.instance_element, stage)
                    .await
            }
            Self::Review(op) => listener.review(op.composition_element, op.instance_element).await,
            Self::Prime(composition) => listener.prime(composition).await,
            Self::Deprime(composition) => listener.deprime(composition).await,
        }
    }
}

impl Reversion {
    /// Report the fallback state through the aggregator
    pub fn apply(self, aggregator: &StateAggregator, message: &str) {
        match self {
            Self::Element {
                instance_id,
                element_id,
                deploy_state,
                lock_state,
            } => aggregator.update_element_state(
                instance_id,
                element_id,
                deploy_state,
                lock_state,
                StateChangeResult::Failed,
                message,
            ),
            Self::Composition {
                composition_id,
                state,
            } => aggregator.update_composition_state(
                composition_id,
                state,
                StateChangeResult::Failed,
                message,
            ),
        }
    }
}

#[derive(Debug)]
struct InFlight {
    generation: u64,
    handle: AbortHandle,
}

/// Runs element operations with at most one in flight per key
pub struct ConcurrentExecutor {
    aggregator: Arc<StateAggregator>,
    listener: Arc<dyn ElementListener>,
    permits: Arc<Semaphore>,
    in_flight: Arc<DashMap<Uuid, InFlight>>,
    generation: AtomicU64,
}

impl ConcurrentExecutor {
    /// Create an executor running at most `thread_count` operations at once
    pub fn new(
        aggregator: Arc<StateAggregator>,
        listener: Arc<dyn ElementListener>,
        thread_count: usize,
    ) -> Self {
        Self {
            aggregator,
            listener,
            permits: Arc::new(Semaphore::new(thread_count.max(1))),
            in_flight: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Schedule an operation, superseding whatever runs under the same key
    ///
    /// Waits only for a free slot in the pool. The correlation for the key is
    /// overwritten with `message_id` before the operation starts.
    pub async fn submit(&self, message_id: MessageId, operation: Operation) -> ParticipantResult<()> {
        let key = operation.key();
        self.cancel(&key);
        self.aggregator.store().set_correlation(key, message_id);

        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ParticipantError::ExecutorClosed)?;

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let listener = self.listener.clone();
        let aggregator = self.aggregator.clone();
        let in_flight = self.in_flight.clone();
        let name = operation.name();

        // The slot is claimed under the entry lock, so two racing submits for
        // one key still leave a single task running.
        match self.in_flight.entry(key) {
            Entry::Occupied(mut entry) => {
                debug!(key = %key, operation = name, "Superseding operation submitted concurrently");
                entry.get().handle.abort();
                let handle = spawn_operation(
                    key, generation, operation, permit, listener, aggregator, in_flight,
                );
                entry.insert(InFlight { generation, handle });
            }
            Entry::Vacant(entry) => {
                let handle = spawn_operation(
                    key, generation, operation, permit, listener, aggregator, in_flight,
                );
                entry.insert(InFlight { generation, handle });
            }
        }
        debug!(key = %key, operation = name, "Operation scheduled");
        Ok(())
    }

    /// Abort the operation running under `key`, if any
    pub fn cancel(&self, key: &Uuid) -> bool {
        match self.in_flight.remove(key) {
            Some((_, previous)) => {
                previous.handle.abort();
                debug!(key = %key, "Cancelled in-flight operation");
                true
            }
            None => false,
        }
    }

    /// Number of operations currently scheduled or running
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Check whether an operation is scheduled or running under `key`
    pub fn is_in_flight(&self, key: &Uuid) -> bool {
        self.in_flight.contains_key(key)
    }

    /// Abort everything and refuse further submissions
    pub fn shutdown(&self) {
        self.permits.close();
        let keys: Vec<Uuid> = self.in_flight.iter().map(|entry| *entry.key()).collect();
        for key in keys {
            self.cancel(&key);
        }
    }
}

fn spawn_operation(
    key: Uuid,
    generation: u64,
    operation: Operation,
    permit: tokio::sync::OwnedSemaphorePermit,
    listener: Arc<dyn ElementListener>,
    aggregator: Arc<StateAggregator>,
    in_flight: Arc<DashMap<Uuid, InFlight>>,
) -> AbortHandle {
    let handle = tokio::spawn(async move {
        let _permit = permit;
        let name = operation.name();
        let reversion = operation.reversion();
        if let Err(failure) = operation.invoke(listener.as_ref()).await {
            warn!(key = %key, operation = name, error = %failure, "Element operation failed");
            reversion.apply(&aggregator, &failure.message);
        }
        in_flight.remove_if(&key, |_, current| current.generation == generation);
    });
    handle.abort_handle()
}
