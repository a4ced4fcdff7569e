// Copyright 2025 Cowboy AI, LLC.

//! Identifier types for compositions, instances and element definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies a composition definition (the primed catalog)
pub type CompositionId = Uuid;

/// Identifies a running automation composition instance
pub type InstanceId = Uuid;

/// Identifies one element inside an instance
pub type ElementId = Uuid;

/// Identifies an inbound message, echoed as `responseTo` in acknowledgements
pub type MessageId = Uuid;

/// Identifies an opaque revision issued by the orchestrator
pub type RevisionId = Uuid;

/// Element definition key - a name plus version pair
///
/// Element definitions are not entities - they're catalog keys within one
/// composition definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DefinitionId {
    /// Definition name
    pub name: String,
    /// Definition version
    pub version: String,
}

impl DefinitionId {
    /// Create a definition id from a name and version
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for DefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.version)
    }
}
