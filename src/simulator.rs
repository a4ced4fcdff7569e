// Copyright 2025 Cowboy AI, LLC.

//! Configurable element implementation for tests and local runs
//!
//! [`SimulatorElement`] waits for the configured delay, then either reports
//! the target state through the [`StateAggregator`] or fails the operation.
//! The delay is an await point, so a superseded operation stops there.

use crate::aggregator::StateAggregator;
use crate::identifiers::{CompositionId, DefinitionId, ElementId, InstanceId};
use crate::listener::{ElementFailure, ElementListener, ElementResult};
use crate::model::{CompositionElementView, CompositionView, InstanceElementView};
use crate::properties::{find_stage_set_migrate, PropertyMap};
use crate::state::{AcTypeState, DeployState, ElementState, LockState, StateChangeResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;

/// Outcome and duration of one simulated verb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VerbBehavior {
    /// Whether the verb succeeds
    pub success: bool,
    /// How long the verb takes
    pub delay_ms: u64,
}

impl Default for VerbBehavior {
    fn default() -> Self {
        Self {
            success: true,
            delay_ms: 0,
        }
    }
}

impl VerbBehavior {
    /// Succeed after `delay_ms`
    pub fn succeed_after(delay_ms: u64) -> Self {
        Self {
            success: true,
            delay_ms,
        }
    }

    /// Fail after `delay_ms`
    pub fn fail_after(delay_ms: u64) -> Self {
        Self {
            success: false,
            delay_ms,
        }
    }
}

/// Behaviour of every simulated verb
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimConfig {
    /// Deploy
    pub deploy: VerbBehavior,
    /// Undeploy
    pub undeploy: VerbBehavior,
    /// Lock
    pub lock: VerbBehavior,
    /// Unlock
    pub unlock: VerbBehavior,
    /// Delete
    pub delete: VerbBehavior,
    /// Properties update
    pub update: VerbBehavior,
    /// Migration stage
    pub migrate: VerbBehavior,
    /// Migration rollback
    pub rollback: VerbBehavior,
    /// Migration precheck
    pub migrate_precheck: VerbBehavior,
    /// Pre-deploy preparation
    pub prepare: VerbBehavior,
    /// Review
    pub review: VerbBehavior,
    /// Prime
    pub prime: VerbBehavior,
    /// Deprime
    pub deprime: VerbBehavior,
}

/// Element implementation driven by a [`SimConfig`]
pub struct SimulatorElement {
    aggregator: Arc<StateAggregator>,
    config: RwLock<SimConfig>,
}

impl SimulatorElement {
    /// Create a simulator reporting through `aggregator`
    pub fn new(aggregator: Arc<StateAggregator>, config: SimConfig) -> Self {
        Self {
            aggregator,
            config: RwLock::new(config),
        }
    }

    /// Current behaviour
    pub fn config(&self) -> SimConfig {
        self.config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the behaviour; operations already running keep the old one
    pub fn set_config(&self, config: SimConfig) {
        *self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = config;
    }

    /// Report output properties and free-form states of an element
    pub fn set_out_properties(
        &self,
        instance_id: InstanceId,
        element_id: ElementId,
        use_state: Option<String>,
        operational_state: Option<String>,
        out_properties: PropertyMap,
    ) {
        self.aggregator
            .send_element_info(instance_id, element_id, use_state, operational_state, out_properties);
    }

    /// Report output properties of an element definition
    pub fn set_composition_out_properties(
        &self,
        composition_id: CompositionId,
        definition_id: &DefinitionId,
        out_properties: PropertyMap,
    ) {
        self.aggregator
            .send_definition_info(composition_id, definition_id, out_properties);
    }

    async fn run(&self, verb: &str, select: impl Fn(&SimConfig) -> VerbBehavior) -> ElementResult {
        let behavior = select(&self.config());
        if behavior.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(behavior.delay_ms)).await;
        }
        if behavior.success {
            Ok(())
        } else {
            debug!(verb, "Simulated failure");
            Err(ElementFailure::new(format!("{verb} failed!")))
        }
    }

    fn report_deploy(&self, element: &InstanceElementView, state: DeployState, message: &str) {
        self.aggregator.update_element_state(
            element.instance_id,
            element.element_id,
            Some(state),
            None,
            StateChangeResult::NoError,
            message,
        );
    }

    /// Report a finished migration stage: removal, a pending later stage, or done
    fn report_migration(
        &self,
        target: &CompositionElementView,
        element: &InstanceElementView,
        migrated: &InstanceElementView,
        stage: i32,
        done: &str,
    ) {
        if migrated.state == ElementState::Removed {
            self.report_deploy(element, DeployState::Undeployed, "Undeployed");
            self.report_deploy(element, DeployState::Deleted, "Deleted");
            return;
        }
        let stages = find_stage_set_migrate(&target.in_properties);
        match stages.range(stage + 1..).next() {
            Some(next) => self.aggregator.update_element_stage(
                migrated.instance_id,
                migrated.element_id,
                StateChangeResult::NoError,
                *next,
                &format!("stage {stage} {done}"),
            ),
            None => self.report_deploy(migrated, DeployState::Deployed, done),
        }
    }

    fn report_lock(&self, element: &InstanceElementView, state: LockState, message: &str) {
        self.aggregator.update_element_state(
            element.instance_id,
            element.element_id,
            None,
            Some(state),
            StateChangeResult::NoError,
            message,
        );
    }
}

#[async_trait]
impl ElementListener for SimulatorElement {
    async fn deploy(&self, _: CompositionElementView, element: InstanceElementView) -> ElementResult {
        self.run("Deploy", |c| c.deploy).await?;
        self.report_deploy(&element, DeployState::Deployed, "Deployed");
        Ok(())
    }

    async fn undeploy(&self, _: CompositionElementView, element: InstanceElementView) -> ElementResult {
        self.run("Undeploy", |c| c.undeploy).await?;
        self.report_deploy(&element, DeployState::Undeployed, "Undeployed");
        Ok(())
    }

    async fn lock(&self, _: CompositionElementView, element: InstanceElementView) -> ElementResult {
        self.run("Lock", |c| c.lock).await?;
        self.report_lock(&element, LockState::Locked, "Locked");
        Ok(())
    }

    async fn unlock(&self, _: CompositionElementView, element: InstanceElementView) -> ElementResult {
        self.run("Unlock", |c| c.unlock).await?;
        self.report_lock(&element, LockState::Unlocked, "Unlocked");
        Ok(())
    }

    async fn delete(&self, _: CompositionElementView, element: InstanceElementView) -> ElementResult {
        self.run("Delete", |c| c.delete).await?;
        self.report_deploy(&element, DeployState::Deleted, "Deleted");
        Ok(())
    }

    async fn update(
        &self,
        _: CompositionElementView,
        element: InstanceElementView,
        _: InstanceElementView,
    ) -> ElementResult {
        self.run("Update", |c| c.update).await?;
        self.report_deploy(&element, DeployState::Deployed, "Updated");
        Ok(())
    }

    async fn prime(&self, composition: CompositionView) -> ElementResult {
        self.run("Prime", |c| c.prime).await?;
        self.aggregator.update_composition_state(
            composition.composition_id,
            AcTypeState::Primed,
            StateChangeResult::NoError,
            "Primed",
        );
        Ok(())
    }

    async fn deprime(&self, composition: CompositionView) -> ElementResult {
        self.run("Deprime", |c| c.deprime).await?;
        self.aggregator.update_composition_state(
            composition.composition_id,
            AcTypeState::Commissioned,
            StateChangeResult::NoError,
            "Deprimed",
        );
        Ok(())
    }

    async fn migrate(
        &self,
        _: CompositionElementView,
        target: CompositionElementView,
        element: InstanceElementView,
        migrated: InstanceElementView,
        stage: i32,
    ) -> ElementResult {
        self.run("Migrate", |c| c.migrate).await?;
        self.report_migration(&target, &element, &migrated, stage, "Migrated");
        Ok(())
    }

    async fn rollback_migration(
        &self,
        _: CompositionElementView,
        target: CompositionElementView,
        element: InstanceElementView,
        migrated: InstanceElementView,
        stage: i32,
    ) -> ElementResult {
        self.run("Rollback", |c| c.rollback).await?;
        self.report_migration(&target, &element, &migrated, stage, "Migration rollback done");
        Ok(())
    }

    async fn migrate_precheck(
        &self,
        _: CompositionElementView,
        _: CompositionElementView,
        element: InstanceElementView,
        _: InstanceElementView,
    ) -> ElementResult {
        self.run("Migration precheck", |c| c.migrate_precheck).await?;
        self.report_deploy(&element, DeployState::Deployed, "Migration precheck completed");
        Ok(())
    }

    async fn prepare(&self, _: CompositionElementView, element: InstanceElementView, _: i32) -> ElementResult {
        self.run("Prepare", |c| c.prepare).await?;
        self.report_deploy(&element, DeployState::Undeployed, "Prepare completed");
        Ok(())
    }

    async fn review(&self, _: CompositionElementView, element: InstanceElementView) -> ElementResult {
        self.run("Review", |c| c.review).await?;
        self.report_deploy(&element, DeployState::Deployed, "Review completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Element, Instance};
    use crate::publisher::RecordingPublisher;
    use crate::store::StateStore;
    use uuid::Uuid;

    fn setup(config: SimConfig) -> (Arc<StateStore>, RecordingPublisher, SimulatorElement, InstanceElementView) {
        let store = Arc::new(StateStore::new(Uuid::new_v4(), vec![]));
        let publisher = RecordingPublisher::new();
        let aggregator = Arc::new(StateAggregator::new(store.clone(), Arc::new(publisher.clone())));
        let mut instance = Instance::new(Uuid::new_v4(), Uuid::new_v4());
        let element = Element::new(Uuid::new_v4(), DefinitionId::new("sim", "1.0.0"), store.participant_id());
        let view = InstanceElementView::of(instance.instance_id, &element);
        instance.elements.insert(element.id, element);
        store.put_instance(instance);
        (store, publisher, SimulatorElement::new(aggregator, config), view)
    }

    fn definition_view(view: &InstanceElementView) -> CompositionElementView {
        CompositionElementView::not_present(view.instance_id, DefinitionId::new("sim", "1.0.0"))
    }

    #[tokio::test]
    async fn test_successful_deploy_reports_deployed() {
        let (store, publisher, sim, view) = setup(SimConfig::default());

        sim.deploy(definition_view(&view), view.clone()).await.unwrap();

        let instance = store.get_instance(&view.instance_id).unwrap();
        assert_eq!(instance.deploy_state, DeployState::Deployed);
        assert_eq!(publisher.instance_acks().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_verb_returns_failure_without_report() {
        let config = SimConfig {
            unlock: VerbBehavior::fail_after(0),
            ..Default::default()
        };
        let (_, publisher, sim, view) = setup(config);

        let err = sim.unlock(definition_view(&view), view).await.unwrap_err();
        assert_eq!(err.message, "Unlock failed!");
        assert!(publisher.is_empty());
    }

    #[tokio::test]
    async fn test_migrate_reports_pending_stage() {
        let (store, publisher, sim, view) = setup(SimConfig::default());
        let mut target = definition_view(&view).with_state(ElementState::Present);
        target.in_properties = serde_json::json!({ "stage": [0, 2] })
            .as_object()
            .cloned()
            .unwrap();

        sim.migrate(definition_view(&view), target.clone(), view.clone(), view.clone(), 0)
            .await
            .unwrap();

        let acks = publisher.instance_acks();
        let element = &acks[0].automation_composition_result_map[&view.element_id];
        assert_eq!(element.stage, Some(2));
        assert_eq!(acks[0].message, "stage 0 Migrated");
        let instance = store.get_instance(&view.instance_id).unwrap();
        assert_eq!(instance.elements[&view.element_id].deploy_state, DeployState::Migrating);

        sim.migrate(definition_view(&view), target, view.clone(), view.clone(), 2)
            .await
            .unwrap();
        let acks = publisher.instance_acks();
        assert_eq!(acks[1].message, "Migrated");
        assert_eq!(acks[1].deploy_state, DeployState::Deployed);
    }

    #[tokio::test]
    async fn test_migrate_of_removed_element_reports_undeploy_then_delete() {
        let (store, publisher, sim, view) = setup(SimConfig::default());
        store.with_instance_mut(&view.instance_id, |instance| {
            let element = &mut instance.elements[&view.element_id];
            element.migration_state = ElementState::Removed;
            element.deploy_state = DeployState::Migrating;
        });
        let removed = view.clone().with_state(ElementState::Removed);

        sim.migrate(definition_view(&view), definition_view(&view), view.clone(), removed, 0)
            .await
            .unwrap();

        let messages: Vec<String> = publisher.instance_acks().into_iter().map(|ack| ack.message).collect();
        assert_eq!(messages, vec!["Undeployed".to_string(), "Deleted".to_string()]);
        let instance = store.get_instance(&view.instance_id).unwrap();
        assert!(instance.elements.is_empty());
    }

    #[test]
    fn test_config_reads_camel_case_json() {
        let config: SimConfig =
            serde_json::from_str(r#"{ "migratePrecheck": { "success": false, "delayMs": 50 } }"#).unwrap();
        assert_eq!(config.migrate_precheck, VerbBehavior::fail_after(50));
        assert_eq!(config.deploy, VerbBehavior::default());
    }
}
