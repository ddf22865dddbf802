//! Registry configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Settings shared by every entity in the registry tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Deadline for aggregate temperature queries in milliseconds
    #[serde(rename = "query-timeout-ms", default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// Mailbox capacity of each root, group and device task
    #[serde(rename = "mailbox-buffer", default = "default_mailbox_buffer")]
    pub mailbox_buffer: usize,
}

fn default_query_timeout_ms() -> u64 {
    debug!("default_query_timeout_ms: called");
    3000
}

fn default_mailbox_buffer() -> usize {
    debug!("default_mailbox_buffer: called");
    256
}

impl Default for RegistryConfig {
    fn default() -> Self {
        debug!("RegistryConfig::default: called");
        Self {
            query_timeout_ms: 3000,
            mailbox_buffer: 256,
        }
    }
}

impl RegistryConfig {
    /// Get the query deadline as a Duration
    pub fn query_timeout(&self) -> Duration {
        debug!(query_timeout_ms = %self.query_timeout_ms, "RegistryConfig::query_timeout: called");
        Duration::from_millis(self.query_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert_eq!(config.query_timeout_ms, 3000);
        assert_eq!(config.mailbox_buffer, 256);
    }

    #[test]
    fn test_query_timeout_duration() {
        let config = RegistryConfig {
            query_timeout_ms: 500,
            ..Default::default()
        };
        assert_eq!(config.query_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: RegistryConfig = serde_yaml::from_str("query-timeout-ms: 1000").unwrap();
        assert_eq!(config.query_timeout_ms, 1000);
        assert_eq!(config.mailbox_buffer, 256);
    }
}
