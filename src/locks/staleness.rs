//! Staleness classification for lock records.
//!
//! A lock is stale when its heartbeat is strictly older than the stale
//! timeout. An age exactly equal to the timeout is still Active, and a
//! heartbeat stamped in the future (holder clock ahead of ours) is Active.

use super::record::LockRecord;
use chrono::{DateTime, FixedOffset};
use std::fmt;
use std::time::Duration;

/// Heartbeat cadence and the silence after which a holder is presumed dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    pub heartbeat_interval: Duration,
    pub stale_timeout: Duration,
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(60),
            stale_timeout: Duration::from_secs(120),
        }
    }
}

/// Liveness of a held lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    /// Heartbeat is fresh; the holder is presumed alive.
    Active,
    /// Heartbeat has expired; the holder probably crashed or disconnected.
    Stale,
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockStatus::Active => write!(f, "active"),
            LockStatus::Stale => write!(f, "STALE"),
        }
    }
}

/// Classify a lock record at `now`.
pub fn classify(
    record: &LockRecord,
    now: DateTime<FixedOffset>,
    policy: &StalenessPolicy,
) -> LockStatus {
    match record.heartbeat_age(now).to_std() {
        Ok(age) if age > policy.stale_timeout => LockStatus::Stale,
        _ => LockStatus::Active,
    }
}
