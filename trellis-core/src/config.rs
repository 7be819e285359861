//! Runtime configuration.

use serde::Deserialize;

use crate::error::ConfigError;

/// Tunables for the per-thread runtime.
///
/// Missing fields take their defaults, so `{}` is a valid configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Drop events whose timestamp predates the listener's attachment.
    pub stale_event_check: bool,
    /// How many times one job may re-queue itself within a single flush.
    pub recursion_limit: usize,
    /// Log a warning when a readonly proxy rejects a mutation.
    pub warn_on_readonly: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stale_event_check: true,
            recursion_limit: 100,
            warn_on_readonly: true,
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.recursion_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "recursion_limit",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}
