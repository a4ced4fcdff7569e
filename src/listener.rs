// Copyright 2025 Cowboy AI, LLC.

//! Element lifecycle callback supplied by the hosting application
//!
//! Each method performs the real work of one lifecycle verb. A successful
//! return does not commit any state: the implementation reports the outcome
//! through the [`StateAggregator`](crate::aggregator::StateAggregator) it was
//! built with, usually before returning. Returning an [`ElementFailure`] makes
//! the executor revert the element and send a `FAILED` acknowledgement.

use crate::model::{CompositionElementView, CompositionView, InstanceElementView};
use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by an element callback
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ElementFailure {
    /// Human-readable reason, forwarded in the failure acknowledgement
    pub message: String,
}

impl ElementFailure {
    /// Create a failure with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result of an element callback
pub type ElementResult = Result<(), ElementFailure>;

/// Lifecycle callback for the elements hosted by a participant
#[async_trait]
pub trait ElementListener: Send + Sync {
    /// Deploy an element
    async fn deploy(
        &self,
        composition_element: CompositionElementView,
        instance_element: InstanceElementView,
    ) -> ElementResult;

    /// Undeploy an element
    async fn undeploy(
        &self,
        composition_element: CompositionElementView,
        instance_element: InstanceElementView,
    ) -> ElementResult;

    /// Lock an element
    async fn lock(
        &self,
        composition_element: CompositionElementView,
        instance_element: InstanceElementView,
    ) -> ElementResult;

    /// Unlock an element
    async fn unlock(
        &self,
        composition_element: CompositionElementView,
        instance_element: InstanceElementView,
    ) -> ElementResult;

    /// Delete an undeployed element
    async fn delete(
        &self,
        composition_element: CompositionElementView,
        instance_element: InstanceElementView,
    ) -> ElementResult;

    /// Apply updated properties to a deployed element
    async fn update(
        &self,
        composition_element: CompositionElementView,
        instance_element: InstanceElementView,
        instance_element_updated: InstanceElementView,
    ) -> ElementResult;

    /// Prime a composition definition
    async fn prime(&self, composition: CompositionView) -> ElementResult;

    /// Deprime a composition definition
    async fn deprime(&self, composition: CompositionView) -> ElementResult;

    /// Migrate one stage of an element
    async fn migrate(
        &self,
        composition_element: CompositionElementView,
        composition_element_target: CompositionElementView,
        instance_element: InstanceElementView,
        instance_element_migrate: InstanceElementView,
        stage: i32,
    ) -> ElementResult;

    /// Roll back one stage of a migration
    async fn rollback_migration(
        &self,
        composition_element: CompositionElementView,
        composition_element_target: CompositionElementView,
        instance_element: InstanceElementView,
        instance_element_migrate: InstanceElementView,
        stage: i32,
    ) -> ElementResult {
        self.migrate(
            composition_element,
            composition_element_target,
            instance_element,
            instance_element_migrate,
            stage,
        )
        .await
    }

    /// Check whether a migration would succeed
    async fn migrate_precheck(
        &self,
        composition_element: CompositionElementView,
        composition_element_target: CompositionElementView,
        instance_element: InstanceElementView,
        instance_element_migrate: InstanceElementView,
    ) -> ElementResult;

    /// Prepare an element before its first deploy
    async fn prepare(
        &self,
        composition_element: CompositionElementView,
        instance_element: InstanceElementView,
        stage: i32,
    ) -> ElementResult;

    /// Review an element after undeploy
    async fn review(
        &self,
        composition_element: CompositionElementView,
        instance_element: InstanceElementView,
    ) -> ElementResult;
}
