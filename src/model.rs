// Copyright 2025 Cowboy AI, LLC.

//! In-memory model of composition definitions and live instances
//!
//! [`Instance`] and [`Element`] are owned exclusively by the
//! [`StateStore`](crate::store::StateStore). Handlers take short-lived clones
//! when they need a "before" snapshot; cloning an `Instance` copies the whole
//! element graph, so a snapshot never aliases the live value.
//!
//! The `*View` types are the immutable values handed to element callbacks.

use crate::identifiers::{CompositionId, DefinitionId, ElementId, InstanceId, RevisionId};
use crate::properties::PropertyMap;
use crate::state::{
    AcTypeState, DeployState, ElementState, LockState, StateChangeResult, SubState,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One element definition inside a composition definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDefinition {
    /// Catalog key
    pub definition_id: DefinitionId,
    /// Declared (common) input properties
    #[serde(default)]
    pub properties: PropertyMap,
    /// Output properties reported by the element implementation
    #[serde(default)]
    pub out_properties: PropertyMap,
}

impl ElementDefinition {
    /// Create a definition with the given common properties
    pub fn new(definition_id: DefinitionId, properties: PropertyMap) -> Self {
        Self {
            definition_id,
            properties,
            out_properties: PropertyMap::new(),
        }
    }
}

/// The element definitions of one composition that belong to this participant
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionDefinition {
    /// Composition identity
    pub composition_id: CompositionId,
    /// Revision the orchestrator attached to the last prime or sync
    pub revision_id: Option<RevisionId>,
    /// Prime state as last reported by the orchestrator
    pub state: AcTypeState,
    /// Element definitions keyed by catalog key
    pub elements: IndexMap<DefinitionId, ElementDefinition>,
}

impl CompositionDefinition {
    /// Build a definition from a list of element definitions
    pub fn new(
        composition_id: CompositionId,
        list: impl IntoIterator<Item = ElementDefinition>,
        revision_id: Option<RevisionId>,
    ) -> Self {
        let elements = list
            .into_iter()
            .map(|definition| (definition.definition_id.clone(), definition))
            .collect();
        Self {
            composition_id,
            revision_id,
            state: AcTypeState::Commissioned,
            elements,
        }
    }

    /// Immutable view of the whole composition for prime/deprime callbacks
    pub fn view(&self) -> CompositionView {
        CompositionView {
            composition_id: self.composition_id,
            in_properties_map: self
                .elements
                .iter()
                .map(|(id, def)| (id.clone(), def.properties.clone()))
                .collect(),
            out_properties_map: self
                .elements
                .iter()
                .map(|(id, def)| (id.clone(), def.out_properties.clone()))
                .collect(),
        }
    }

    /// Immutable view of one element definition, `NOT_PRESENT` when unknown
    pub fn element_view(&self, definition_id: &DefinitionId) -> CompositionElementView {
        match self.elements.get(definition_id) {
            Some(def) => CompositionElementView {
                composition_id: self.composition_id,
                element_definition_id: definition_id.clone(),
                in_properties: def.properties.clone(),
                out_properties: def.out_properties.clone(),
                state: ElementState::Present,
            },
            None => CompositionElementView::not_present(self.composition_id, definition_id.clone()),
        }
    }
}

/// One deployable unit inside an instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    /// Element identity
    pub id: ElementId,
    /// Definition this element instantiates
    pub definition: DefinitionId,
    /// Participant the element is assigned to
    pub participant_id: Uuid,
    /// Deploy state
    pub deploy_state: DeployState,
    /// Lock state
    pub lock_state: LockState,
    /// Sub-protocol marker
    pub sub_state: SubState,
    /// `NEW` while the element was added by a migration still in progress,
    /// `REMOVED` while a migration is taking it out of the instance
    pub migration_state: ElementState,
    /// Next migration stage the element waits for
    #[serde(default)]
    pub migration_stage: Option<i32>,
    /// Free-form operational status reported by the implementation
    pub operational_state: Option<String>,
    /// Free-form usage status reported by the implementation
    pub use_state: Option<String>,
    /// Instance-scoped input properties
    pub properties: PropertyMap,
    /// Output properties reported by the implementation
    pub out_properties: PropertyMap,
}

impl Element {
    /// Create an element in its initial state
    pub fn new(id: ElementId, definition: DefinitionId, participant_id: Uuid) -> Self {
        Self {
            id,
            definition,
            participant_id,
            deploy_state: DeployState::Undeployed,
            lock_state: LockState::Locked,
            sub_state: SubState::None,
            migration_state: ElementState::Present,
            migration_stage: None,
            operational_state: None,
            use_state: None,
            properties: PropertyMap::new(),
            out_properties: PropertyMap::new(),
        }
    }

    /// Whether a migration removal of this element is still under way
    ///
    /// An element whose removal failed was reverted to `DEPLOYED` and stays.
    pub fn is_leaving(&self) -> bool {
        self.migration_state == ElementState::Removed && self.deploy_state != DeployState::Deployed
    }

    /// Keep the implementation-reported fields of an earlier incarnation
    pub fn carry_over_from(&mut self, previous: &Element) {
        self.out_properties = previous.out_properties.clone();
        self.operational_state = previous.operational_state.clone();
        self.use_state = previous.use_state.clone();
    }
}

/// A live automation composition instance
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    /// Instance identity
    pub instance_id: InstanceId,
    /// Composition the instance is deployed from
    pub composition_id: CompositionId,
    /// Target composition while a migration is in progress
    pub composition_target_id: Option<CompositionId>,
    /// Aggregate deploy state
    pub deploy_state: DeployState,
    /// Aggregate lock state
    pub lock_state: LockState,
    /// Aggregate sub-protocol marker
    pub sub_state: SubState,
    /// Result of the last state change
    pub state_change_result: StateChangeResult,
    /// Revision the orchestrator attached to the last (re)initialisation
    pub revision_id: Option<RevisionId>,
    /// Elements in insertion order
    pub elements: IndexMap<ElementId, Element>,
    /// Elements as they were before the migration in progress
    pub migration_basis: Option<IndexMap<ElementId, Element>>,
}

impl Instance {
    /// Create an empty instance
    pub fn new(instance_id: InstanceId, composition_id: CompositionId) -> Self {
        Self {
            instance_id,
            composition_id,
            composition_target_id: None,
            deploy_state: DeployState::Undeployed,
            lock_state: LockState::None,
            sub_state: SubState::None,
            state_change_result: StateChangeResult::NoError,
            revision_id: None,
            elements: IndexMap::new(),
            migration_basis: None,
        }
    }

    /// Check a predicate against every element
    ///
    /// An instance without elements never satisfies an aggregate condition.
    pub fn all_elements(&self, predicate: impl Fn(&Element) -> bool) -> bool {
        !self.elements.is_empty() && self.elements.values().all(predicate)
    }

    /// Check a predicate against every element not being removed by a migration
    pub fn all_tracked(&self, predicate: impl Fn(&Element) -> bool) -> bool {
        let mut tracked = self
            .elements
            .values()
            .filter(|element| element.migration_state != ElementState::Removed)
            .peekable();
        tracked.peek().is_some() && tracked.all(predicate)
    }

    /// The instance as it was before the migration in progress
    ///
    /// Falls back to the live elements when no migration recorded a basis.
    pub fn before_migration(&self) -> Instance {
        let mut before = self.clone();
        if let Some(basis) = before.migration_basis.take() {
            before.elements = basis;
        }
        before
    }

    /// Immutable view of one element
    pub fn element_view(&self, element_id: &ElementId) -> Option<InstanceElementView> {
        self.elements
            .get(element_id)
            .map(|element| InstanceElementView::of(self.instance_id, element))
    }
}

/// Immutable view of an element definition handed to callbacks
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionElementView {
    /// Composition the definition belongs to
    pub composition_id: CompositionId,
    /// Catalog key
    pub element_definition_id: DefinitionId,
    /// Common input properties
    pub in_properties: PropertyMap,
    /// Definition output properties
    pub out_properties: PropertyMap,
    /// Presence marker
    pub state: ElementState,
}

impl CompositionElementView {
    /// View of a definition that does not exist
    pub fn not_present(composition_id: CompositionId, element_definition_id: DefinitionId) -> Self {
        Self {
            composition_id,
            element_definition_id,
            in_properties: PropertyMap::new(),
            out_properties: PropertyMap::new(),
            state: ElementState::NotPresent,
        }
    }

    /// Same view with a different presence marker
    pub fn with_state(mut self, state: ElementState) -> Self {
        self.state = state;
        self
    }
}

/// Immutable view of an instance element handed to callbacks
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceElementView {
    /// Owning instance
    pub instance_id: InstanceId,
    /// Element identity
    pub element_id: ElementId,
    /// Instance-scoped input properties
    pub in_properties: PropertyMap,
    /// Output properties
    pub out_properties: PropertyMap,
    /// Presence marker
    pub state: ElementState,
}

impl InstanceElementView {
    /// View of an existing element
    pub fn of(instance_id: InstanceId, element: &Element) -> Self {
        Self {
            instance_id,
            element_id: element.id,
            in_properties: element.properties.clone(),
            out_properties: element.out_properties.clone(),
            state: ElementState::Present,
        }
    }

    /// View of an element that does not exist yet
    pub fn not_present(instance_id: InstanceId, element_id: ElementId) -> Self {
        Self {
            instance_id,
            element_id,
            in_properties: PropertyMap::new(),
            out_properties: PropertyMap::new(),
            state: ElementState::NotPresent,
        }
    }

    /// Same view with a different presence marker
    pub fn with_state(mut self, state: ElementState) -> Self {
        self.state = state;
        self
    }
}

/// Immutable view of a whole composition definition for prime/deprime
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionView {
    /// Composition identity
    pub composition_id: CompositionId,
    /// Common input properties per element definition
    pub in_properties_map: BTreeMap<DefinitionId, PropertyMap>,
    /// Output properties per element definition
    pub out_properties_map: BTreeMap<DefinitionId, PropertyMap>,
}

impl CompositionView {
    /// View of a composition with no definitions on this participant
    pub fn empty(composition_id: CompositionId) -> Self {
        Self {
            composition_id,
            in_properties_map: BTreeMap::new(),
            out_properties_map: BTreeMap::new(),
        }
    }
}
