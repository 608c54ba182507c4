//! Configuration for the ordering service

use serde::{Deserialize, Serialize};

/// Ordering service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Node ID, used for logging only
    pub node_id: String,

    /// Round configuration
    pub round: RoundConfig,

    /// Channel and retention limits
    pub limits: LimitsConfig,
}

/// Round configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundConfig {
    /// Voting window before undecided candidates are rejected (ms)
    pub timeout_ms: u64,
}

/// Channel and retention limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Actor mailbox capacity (backpressure on submitters)
    pub mailbox_capacity: usize,

    /// Capacity of the outbound consensus-event channel
    pub event_channel_capacity: usize,

    /// Capacity of the outbound chaincode channel
    pub chaincode_channel_capacity: usize,

    /// Number of transaction hashes kept for duplicate detection
    pub duplicate_retention: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_id: "node-1".to_string(),
            round: RoundConfig { timeout_ms: 1000 },
            limits: LimitsConfig {
                mailbox_capacity: 1000,
                event_channel_capacity: 1000,
                chaincode_channel_capacity: 100,
                duplicate_retention: 10_000,
            },
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(node_id) = std::env::var("VERITAS_NODE_ID") {
            config.node_id = node_id;
        }

        if let Ok(timeout) = std::env::var("VERITAS_ROUND_TIMEOUT_MS") {
            config.round.timeout_ms = timeout
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid round timeout: {}", e)))?;
        }

        if let Ok(retention) = std::env::var("VERITAS_DUPLICATE_RETENTION") {
            config.limits.duplicate_retention = retention
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid retention: {}", e)))?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.node_id, "node-1");
        assert_eq!(config.round.timeout_ms, 1000);
        assert_eq!(config.limits.duplicate_retention, 10_000);
    }

    #[test]
    fn test_config_roundtrip_toml() {
        let config = Config::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.round.timeout_ms, config.round.timeout_ms);
    }
}
