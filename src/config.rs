// Copyright 2025 Cowboy AI, LLC.

//! Participant configuration

use crate::errors::{ParticipantError, ParticipantResult};
use crate::infrastructure::nats_client::NatsConfig;
use crate::messages::SupportedElementType;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// Configuration of one participant replica
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticipantConfig {
    /// Identity of the participant (shared by all replicas)
    pub participant_id: Uuid,

    /// Element types this participant hosts
    pub supported_element_types: Vec<SupportedElementType>,

    /// Maximum number of element operations running at once
    pub thread_count: usize,

    /// Period of the held-message rescan in milliseconds
    pub hold_retry_interval_ms: u64,

    /// Message bus connection
    pub nats: NatsConfig,
}

impl Default for ParticipantConfig {
    fn default() -> Self {
        Self {
            participant_id: Uuid::nil(),
            supported_element_types: Vec::new(),
            thread_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            hold_retry_interval_ms: 1000,
            nats: NatsConfig::default(),
        }
    }
}

impl ParticipantConfig {
    /// Create a configuration for a participant id with defaults elsewhere
    pub fn new(participant_id: Uuid) -> Self {
        Self {
            participant_id,
            ..Default::default()
        }
    }

    /// Add a supported element type
    pub fn with_element_type(
        mut self,
        type_name: impl Into<String>,
        type_version: impl Into<String>,
    ) -> Self {
        self.supported_element_types.push(SupportedElementType {
            type_name: type_name.into(),
            type_version: type_version.into(),
        });
        self
    }

    /// Rescan period as a duration
    pub fn hold_retry_interval(&self) -> Duration {
        Duration::from_millis(self.hold_retry_interval_ms)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> ParticipantResult<()> {
        if self.participant_id.is_nil() {
            return Err(ParticipantError::Configuration(
                "participant_id must be set".to_string(),
            ));
        }
        if self.thread_count == 0 {
            return Err(ParticipantError::Configuration(
                "thread_count must be greater than zero".to_string(),
            ));
        }
        if self.hold_retry_interval_ms == 0 {
            return Err(ParticipantError::Configuration(
                "hold_retry_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Load and validate a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading participant config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing participant config {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("validating participant config {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ParticipantConfig::default();
        assert!(config.thread_count > 0);
        assert_eq!(config.hold_retry_interval(), Duration::from_millis(1000));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_threads() {
        let config = ParticipantConfig {
            thread_count: 0,
            ..ParticipantConfig::new(Uuid::new_v4())
        };
        match config.validate() {
            Err(ParticipantError::Configuration(msg)) => assert!(msg.contains("thread_count")),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_partial_file_uses_defaults() {
        let participant_id = Uuid::new_v4();
        let path = std::env::temp_dir().join(format!("participant-{participant_id}.json"));
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"participant_id": "{participant_id}", "thread_count": 2,
                "supported_element_types": [{{"typeName": "org.k8s", "typeVersion": "1.0.0"}}]}}"#
        )
        .unwrap();

        let config = ParticipantConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.participant_id, participant_id);
        assert_eq!(config.thread_count, 2);
        assert_eq!(config.hold_retry_interval_ms, 1000);
        assert_eq!(config.supported_element_types[0].type_name, "org.k8s");
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let err = ParticipantConfig::load("/nonexistent/participant.json").unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/participant.json"));
    }
}
