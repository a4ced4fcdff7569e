// Copyright 2025 Cowboy AI, LLC.

//! NATS connection for the participant transport

use super::TransportError;
use async_nats::{Client, ConnectOptions};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Configuration for NATS client connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// NATS server URL (e.g., "nats://localhost:4222")
    pub url: String,

    /// Optional username for authentication
    pub user: Option<String>,

    /// Optional password for authentication
    pub password: Option<String>,

    /// Whether TLS is required
    pub tls_required: bool,

    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,

    /// Reconnect interval in seconds
    pub reconnect_interval_secs: u64,

    /// Maximum reconnect attempts (0 = infinite)
    pub max_reconnects: usize,

    /// Subject the orchestrator sends participant messages on
    pub listen_subject: String,

    /// Subject acknowledgements, status and resync requests go to
    pub publish_subject: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            user: None,
            password: None,
            tls_required: false,
            connection_timeout_secs: 10,
            reconnect_interval_secs: 5,
            max_reconnects: 0, // Infinite reconnects
            listen_subject: "acm.participant".to_string(),
            publish_subject: "acm.runtime".to_string(),
        }
    }
}

/// Connected NATS client
#[derive(Debug, Clone)]
pub struct NatsClient {
    client: Client,
    config: NatsConfig,
}

impl NatsClient {
    /// Connect to NATS server with the provided configuration
    pub async fn connect(config: NatsConfig) -> Result<Self, TransportError> {
        let reconnect_interval = config.reconnect_interval_secs;
        let max_reconnects = config.max_reconnects;
        let mut options = ConnectOptions::new()
            .connection_timeout(Duration::from_secs(config.connection_timeout_secs))
            .reconnect_delay_callback(move |attempts| {
                if max_reconnects > 0 && attempts >= max_reconnects {
                    // Stop reconnecting after max attempts
                    Duration::from_secs(0)
                } else {
                    Duration::from_secs(reconnect_interval)
                }
            })
            .event_callback(|event| async move {
                match event {
                    async_nats::Event::Disconnected => warn!("NATS disconnected"),
                    async_nats::Event::Connected => info!("NATS connected"),
                    async_nats::Event::ClientError(err) => warn!(error = %err, "NATS client error"),
                    _ => {}
                }
            });

        if let (Some(user), Some(password)) = (&config.user, &config.password) {
            options = options.user_and_password(user.clone(), password.clone());
        }
        if config.tls_required {
            options = options.require_tls(true);
        }

        let client = options.connect(&config.url).await.map_err(|e| {
            TransportError::ConnectionFailed(format!("Failed to connect to {}: {}", config.url, e))
        })?;

        Ok(Self { client, config })
    }

    /// Get the underlying NATS client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Get the configuration
    pub fn config(&self) -> &NatsConfig {
        &self.config
    }

    /// Check if the client is connected
    pub async fn is_connected(&self) -> bool {
        self.client.flush().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NatsConfig::default();
        assert_eq!(config.url, "nats://localhost:4222");
        assert_eq!(config.connection_timeout_secs, 10);
        assert_eq!(config.max_reconnects, 0);
        assert_eq!(config.listen_subject, "acm.participant");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: NatsConfig =
            serde_json::from_str(r#"{ "url": "nats://bus:4222", "user": "participant" }"#).unwrap();
        assert_eq!(config.url, "nats://bus:4222");
        assert_eq!(config.user.as_deref(), Some("participant"));
        assert_eq!(config.publish_subject, "acm.runtime");
        assert_eq!(config.reconnect_interval_secs, 5);
    }
}
