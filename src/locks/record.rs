//! Lock record stored in each work unit's lock file.

use super::holder::HolderIdentity;
use crate::error::{PackError, Result};
use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Lock metadata stored in `session.lock`.
///
/// Every non-optional field is required on read: a lock file missing one is
/// reported as corrupt rather than filled with a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Hostname of the holding station.
    pub holder_host: String,

    /// OS user running the holding process.
    pub holder_user: String,

    /// Process ID of the holder.
    pub holder_process_id: u32,

    /// When the lock was created (RFC 3339 with offset).
    pub acquired_at: DateTime<FixedOffset>,

    /// Last time the holder proved it was alive.
    pub last_heartbeat_at: DateTime<FixedOffset>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_name: Option<String>,
}

impl LockRecord {
    /// Create a fresh record for `holder` acquired at `now`.
    pub fn new(holder: &HolderIdentity, now: DateTime<FixedOffset>) -> Self {
        Self {
            holder_host: holder.host.clone(),
            holder_user: holder.user.clone(),
            holder_process_id: holder.process_id,
            acquired_at: now,
            last_heartbeat_at: now,
            worker_id: holder.worker_id.clone(),
            worker_name: holder.worker_name.clone(),
        }
    }

    /// Parse a lock record from a file.
    ///
    /// Returns `Ok(None)` if the file does not exist.
    pub fn read_optional<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PackError::Io(format!(
                    "failed to read lock file '{}': {}",
                    path.display(),
                    e
                )));
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| PackError::CorruptLock {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    /// Serialize the record to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PackError::Io(format!("failed to serialize lock record: {}", e)))
    }

    /// Whether this record names `holder` as the owning process.
    pub fn is_held_by(&self, holder: &HolderIdentity) -> bool {
        self.holder_host == holder.host
            && self.holder_user == holder.user
            && self.holder_process_id == holder.process_id
    }

    /// The same record with its heartbeat moved to `now`.
    pub fn with_heartbeat(&self, now: DateTime<FixedOffset>) -> Self {
        Self {
            last_heartbeat_at: now,
            ..self.clone()
        }
    }

    /// Time since the last heartbeat. Negative if the holder's clock runs ahead.
    pub fn heartbeat_age(&self, now: DateTime<FixedOffset>) -> Duration {
        now.signed_duration_since(self.last_heartbeat_at)
    }

    /// `user@host` of the holder.
    pub fn owner(&self) -> String {
        format!("{}@{}", self.holder_user, self.holder_host)
    }
}

impl fmt::Display for LockRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (pid {}", self.owner(), self.holder_process_id)?;
        match (&self.worker_name, &self.worker_id) {
            (Some(name), Some(id)) => write!(f, ", worker {} [{}]", name, id)?,
            (Some(name), None) => write!(f, ", worker {}", name)?,
            (None, Some(id)) => write!(f, ", worker [{}]", id)?,
            (None, None) => {}
        }
        write!(
            f,
            ", acquired {}, last heartbeat {})",
            self.acquired_at.format("%Y-%m-%d %H:%M:%S %:z"),
            self.last_heartbeat_at.format("%Y-%m-%d %H:%M:%S %:z")
        )
    }
}

/// Format a duration as a short human-readable age (`45s`, `3m 10s`, `2h 5m`, `1d 4h`).
pub fn format_age(age: Duration) -> String {
    let seconds = age.num_seconds().max(0);
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{}d {}h", days, hours % 24)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}
