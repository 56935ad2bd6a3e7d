//! Config loading, environment overrides, validation, and utility operations.

use super::model::Config;
use crate::error::{PackError, Result};
use crate::locks::StalenessPolicy;
use std::path::Path;
use std::time::Duration;

/// Overrides `heartbeat_interval_secs`.
pub const ENV_HEARTBEAT_SECS: &str = "PACKGUARD_HEARTBEAT_SECS";

/// Overrides `stale_timeout_secs`.
pub const ENV_STALE_SECS: &str = "PACKGUARD_STALE_SECS";

/// Overrides `worker_id`.
pub const ENV_WORKER_ID: &str = "PACKGUARD_WORKER_ID";

/// Overrides `worker_name`.
pub const ENV_WORKER_NAME: &str = "PACKGUARD_WORKER_NAME";

impl Config {
    /// Load and validate config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Self::read(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate config, falling back to defaults if the file does not exist.
    ///
    /// A file that exists but fails to parse is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Self::read_or_default(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the effective config for a station: file, then environment, then validation.
    ///
    /// Only the merged result is validated, so an environment override may
    /// repair a file value that is invalid on its own.
    pub fn resolve<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::read_or_default(path.as_ref())?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse config from a YAML string without validating it.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes as unit, not as an empty map.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(yaml)
            .map_err(|e| PackError::UserError(format!("failed to parse config YAML: {}", e)))
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PackError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    fn read_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::read(path)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| PackError::UserError(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Apply `PACKGUARD_*` environment variables on top of the loaded values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_HEARTBEAT_SECS) {
            self.heartbeat_interval_secs = parse_secs(ENV_HEARTBEAT_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_STALE_SECS) {
            self.stale_timeout_secs = parse_secs(ENV_STALE_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_WORKER_ID).filter(|v| !v.trim().is_empty()) {
            self.worker_id = Some(value.trim().to_string());
        }
        if let Some(value) = lookup(ENV_WORKER_NAME).filter(|v| !v.trim().is_empty()) {
            self.worker_name = Some(value.trim().to_string());
        }
        Ok(())
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `heartbeat_interval_secs` must be positive
    /// - `stale_timeout_secs` must be greater than `heartbeat_interval_secs`
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval_secs == 0 {
            return Err(PackError::UserError(
                "config validation failed: heartbeat_interval_secs must be greater than 0"
                    .to_string(),
            ));
        }

        if self.stale_timeout_secs <= self.heartbeat_interval_secs {
            return Err(PackError::UserError(format!(
                "config validation failed: stale_timeout_secs ({}) must be greater than heartbeat_interval_secs ({})",
                self.stale_timeout_secs, self.heartbeat_interval_secs
            )));
        }

        Ok(())
    }

    /// The staleness policy these settings describe.
    pub fn staleness_policy(&self) -> StalenessPolicy {
        StalenessPolicy {
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs),
            stale_timeout: Duration::from_secs(self.stale_timeout_secs),
        }
    }
}

fn parse_secs(key: &str, value: &str) -> Result<u64> {
    value.trim().parse::<u64>().map_err(|_| {
        PackError::UserError(format!(
            "invalid value for {}: '{}' (expected a whole number of seconds)",
            key, value
        ))
    })
}
