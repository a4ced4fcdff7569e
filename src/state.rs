// Copyright 2025 Cowboy AI, LLC.

//! Lifecycle state enums for instances, elements and composition definitions
//!
//! Every enum here is a closed set of states the orchestrator and this
//! participant agree on. Aggregate (instance-level) values are derived from the
//! element values by the scan-and-compare rule in the aggregator; nothing in
//! this module decides when a transition happens, it only names the states and
//! classifies them.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

/// Trait for types that can be used as lifecycle states
pub trait State: Debug + Clone + PartialEq + Eq + Send + Sync {
    /// Get the name of this state for logging/debugging
    fn name(&self) -> &'static str;

    /// Check if this is a terminal state
    fn is_terminal(&self) -> bool {
        false
    }

    /// Check if this state marks an operation still in flight
    fn is_transitional(&self) -> bool {
        false
    }
}

macro_rules! display_by_name {
    ($($ty:ty),* $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.name())
                }
            }
        )*
    };
}

/// Deployment state of an instance or element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeployState {
    /// Not deployed
    #[default]
    Undeployed,
    /// Deploy in progress
    Deploying,
    /// Deployed and running
    Deployed,
    /// Property update in progress
    Updating,
    /// Undeploy in progress
    Undeploying,
    /// Migration (or rollback) in progress
    Migrating,
    /// Delete in progress
    Deleting,
    /// Deleted; the instance leaves the store once every element gets here
    Deleted,
}

impl State for DeployState {
    fn name(&self) -> &'static str {
        match self {
            Self::Undeployed => "UNDEPLOYED",
            Self::Deploying => "DEPLOYING",
            Self::Deployed => "DEPLOYED",
            Self::Updating => "UPDATING",
            Self::Undeploying => "UNDEPLOYING",
            Self::Migrating => "MIGRATING",
            Self::Deleting => "DELETING",
            Self::Deleted => "DELETED",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Deleted)
    }

    fn is_transitional(&self) -> bool {
        matches!(
            self,
            Self::Deploying | Self::Updating | Self::Undeploying | Self::Migrating | Self::Deleting
        )
    }
}

/// Lock state of an instance or element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockState {
    /// No lock state (element not deployed)
    #[default]
    None,
    /// Locked
    Locked,
    /// Lock in progress
    Locking,
    /// Unlocked
    Unlocked,
    /// Unlock in progress
    Unlocking,
}

impl State for LockState {
    fn name(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Locked => "LOCKED",
            Self::Locking => "LOCKING",
            Self::Unlocked => "UNLOCKED",
            Self::Unlocking => "UNLOCKING",
        }
    }

    fn is_transitional(&self) -> bool {
        matches!(self, Self::Locking | Self::Unlocking)
    }
}

/// Secondary in-progress marker for sub-protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubState {
    /// No sub-protocol running
    #[default]
    None,
    /// Pre-deploy preparation running
    Preparing,
    /// Migration precheck running
    MigrationPrechecking,
    /// Post-undeploy review running
    Reviewing,
}

impl State for SubState {
    fn name(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Preparing => "PREPARING",
            Self::MigrationPrechecking => "MIGRATION_PRECHECKING",
            Self::Reviewing => "REVIEWING",
        }
    }

    fn is_transitional(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// State of a composition definition on this participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AcTypeState {
    /// Known to the orchestrator but not primed here
    #[default]
    Commissioned,
    /// Prime in progress
    Priming,
    /// Primed
    Primed,
    /// Deprime in progress
    Depriming,
}

impl State for AcTypeState {
    fn name(&self) -> &'static str {
        match self {
            Self::Commissioned => "COMMISSIONED",
            Self::Priming => "PRIMING",
            Self::Primed => "PRIMED",
            Self::Depriming => "DEPRIMING",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Commissioned)
    }

    fn is_transitional(&self) -> bool {
        matches!(self, Self::Priming | Self::Depriming)
    }
}

/// Outcome reported with every state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateChangeResult {
    /// The change succeeded
    #[default]
    NoError,
    /// The change failed
    Failed,
    /// The change timed out
    Timeout,
}

impl State for StateChangeResult {
    fn name(&self) -> &'static str {
        match self {
            Self::NoError => "NO_ERROR",
            Self::Failed => "FAILED",
            Self::Timeout => "TIMEOUT",
        }
    }
}

/// Presence marker carried by the views handed to element callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementState {
    /// The element (or definition) exists
    #[default]
    Present,
    /// No prior element or definition exists
    NotPresent,
    /// The element is being removed by a migration
    Removed,
    /// The element is being added by a migration
    New,
}

impl State for ElementState {
    fn name(&self) -> &'static str {
        match self {
            Self::Present => "PRESENT",
            Self::NotPresent => "NOT_PRESENT",
            Self::Removed => "REMOVED",
            Self::New => "NEW",
        }
    }
}

/// Availability of this participant as reported in status messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantState {
    /// Reachable and processing messages
    #[default]
    OnLine,
    /// Not processing messages
    OffLine,
}

impl State for ParticipantState {
    fn name(&self) -> &'static str {
        match self {
            Self::OnLine => "ON_LINE",
            Self::OffLine => "OFF_LINE",
        }
    }
}

/// Deployment order carried by a state-change message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeployOrder {
    /// No deploy change; the message is a lock change
    #[default]
    None,
    /// Undeploy the instance
    Undeploy,
    /// Delete the instance
    Delete,
    /// Deploy the instance
    Deploy,
    /// Update the instance
    Update,
    /// Migrate the instance
    Migrate,
}

impl State for DeployOrder {
    fn name(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Undeploy => "UNDEPLOY",
            Self::Delete => "DELETE",
            Self::Deploy => "DEPLOY",
            Self::Update => "UPDATE",
            Self::Migrate => "MIGRATE",
        }
    }
}

/// Lock order carried by a state-change message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockOrder {
    /// No lock change
    #[default]
    None,
    /// Lock the instance
    Lock,
    /// Unlock the instance
    Unlock,
}

impl State for LockOrder {
    fn name(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Lock => "LOCK",
            Self::Unlock => "UNLOCK",
        }
    }
}

display_by_name!(
    DeployState,
    LockState,
    SubState,
    AcTypeState,
    StateChangeResult,
    ElementState,
    ParticipantState,
    DeployOrder,
    LockOrder,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(DeployState::Deleted.is_terminal());
        assert!(!DeployState::Deployed.is_terminal());
        assert!(AcTypeState::Commissioned.is_terminal());
        assert!(!AcTypeState::Primed.is_terminal());
    }

    #[test]
    fn test_transitional_states() {
        assert!(DeployState::Deploying.is_transitional());
        assert!(DeployState::Migrating.is_transitional());
        assert!(!DeployState::Undeployed.is_transitional());
        assert!(LockState::Locking.is_transitional());
        assert!(!LockState::Locked.is_transitional());
        assert!(SubState::Reviewing.is_transitional());
        assert!(!SubState::None.is_transitional());
    }

    #[test]
    fn test_wire_names_match_display() {
        let json = serde_json::to_string(&SubState::MigrationPrechecking).unwrap();
        assert_eq!(json, "\"MIGRATION_PRECHECKING\"");
        assert_eq!(SubState::MigrationPrechecking.to_string(), "MIGRATION_PRECHECKING");

        let json = serde_json::to_string(&StateChangeResult::NoError).unwrap();
        assert_eq!(json, "\"NO_ERROR\"");

        let state: DeployState = serde_json::from_str("\"UNDEPLOYING\"").unwrap();
        assert_eq!(state, DeployState::Undeploying);
    }
}
