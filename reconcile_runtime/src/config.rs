//! Driver configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backoff::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tuning for `ConvergenceDriver`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    /// Delay before re-checking a fully reconciled resource.
    pub resync_interval_secs: u64,
    /// Backoff after the first failed pass.
    pub backoff_base_ms: u64,
    /// Upper bound on backoff.
    pub backoff_max_ms: u64,
    /// Fallback filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            resync_interval_secs: 300,
            backoff_base_ms: 1_000,
            backoff_max_ms: 300_000,
            log_level: "info".to_string(),
        }
    }
}

impl DriverConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: DriverConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backoff_base_ms == 0 {
            return Err(ConfigError::Invalid("backoff_base_ms must be positive".into()));
        }
        if self.backoff_max_ms < self.backoff_base_ms {
            return Err(ConfigError::Invalid(format!(
                "backoff_max_ms ({}) is below backoff_base_ms ({})",
                self.backoff_max_ms, self.backoff_base_ms
            )));
        }
        Ok(())
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.backoff_max_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let config = DriverConfig::from_json_str("{}").unwrap();
        assert_eq!(config, DriverConfig::default());
        assert_eq!(config.resync_interval(), Duration::from_secs(300));
    }

    #[test]
    fn partial_override() {
        let config =
            DriverConfig::from_json_str(r#"{"resync_interval_secs": 30, "log_level": "debug"}"#)
                .unwrap();
        assert_eq!(config.resync_interval_secs, 30);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.backoff_base_ms, 1_000);
    }

    #[test]
    fn rejects_unknown_fields_and_bad_ranges() {
        assert!(matches!(
            DriverConfig::from_json_str(r#"{"resync": 1}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            DriverConfig::from_json_str(r#"{"backoff_base_ms": 500, "backoff_max_ms": 100}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            DriverConfig::from_json_str(r#"{"backoff_base_ms": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        let path = std::env::temp_dir().join("reconcile_runtime_no_such_config.json");
        assert!(matches!(
            DriverConfig::load(&path),
            Err(ConfigError::Read { .. })
        ));
    }
}
