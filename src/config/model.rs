//! Config struct definition and default implementation.

use serde::{Deserialize, Serialize};

/// Configuration shared by all stations working on one root directory.
///
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Lock settings
    // =========================================================================
    /// Seconds between heartbeat refreshes of a held lock.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// Seconds without a heartbeat after which a lock is considered stale.
    #[serde(default = "default_stale_timeout_secs")]
    pub stale_timeout_secs: u64,

    // =========================================================================
    // Station identity
    // =========================================================================
    /// Optional operator/worker id recorded in lock files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,

    /// Optional human-readable worker name recorded in lock files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_name: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            stale_timeout_secs: default_stale_timeout_secs(),
            worker_id: None,
            worker_name: None,
        }
    }
}

pub(crate) fn default_heartbeat_interval_secs() -> u64 {
    60
}

pub(crate) fn default_stale_timeout_secs() -> u64 {
    120
}
