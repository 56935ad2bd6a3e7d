//! Lock acquisition, heartbeat refresh, release, and enumeration.
//!
//! Lock files are created by linking a fully written temporary file into
//! place, so a lock file is never observed half written and two stations
//! racing on a free unit produce exactly one winner. Every later rewrite
//! (heartbeat refresh) replaces the whole file through an atomic rename.
//!
//! This is advisory locking on a shared volume, not a consensus protocol:
//! some network filesystems do not make link/rename atomic across clients,
//! and a heartbeat refresh that races a force-release can resurrect the old
//! record. Both are accepted for a handful of cooperating stations.

use super::holder::HolderIdentity;
use super::record::{LockRecord, format_age};
use super::staleness::{LockStatus, StalenessPolicy, classify};
use crate::clock::{Clock, SystemClock};
use crate::context::{LOCK_FILE, RootContext, WorkUnitId};
use crate::error::{PackError, Result};
use crate::fs::{atomic_create, atomic_write_file};
use chrono::{DateTime, FixedOffset};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Result of an acquire attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The caller now holds the lock.
    Locked(LockRecord),
    /// Someone else holds the lock and is still heartbeating.
    Conflict(LockRecord),
    /// Someone else holds the lock but stopped heartbeating. Requires an
    /// explicit `force_release` before a retry can succeed.
    StaleLockDetected(LockRecord),
}

impl AcquireOutcome {
    /// Turn non-`Locked` outcomes into the matching error.
    pub fn into_result(self, unit: &WorkUnitId) -> Result<LockRecord> {
        match self {
            AcquireOutcome::Locked(record) => Ok(record),
            AcquireOutcome::Conflict(holder) => Err(PackError::LockConflict {
                unit: unit.to_string(),
                holder: Box::new(holder),
            }),
            AcquireOutcome::StaleLockDetected(holder) => Err(PackError::StaleLockDetected {
                unit: unit.to_string(),
                holder: Box::new(holder),
            }),
        }
    }
}

/// Result of a heartbeat refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    /// The record was rewritten with a new heartbeat.
    Refreshed(LockRecord),
    /// The caller no longer holds the lock; nothing was written.
    NotHolder { current: Option<LockRecord> },
}

/// Lock state of a single work unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitLockState {
    Free,
    Held {
        record: LockRecord,
        status: LockStatus,
    },
}

/// Information about one lock file found under the root.
#[derive(Debug, Clone)]
pub struct LockInfo {
    pub unit: WorkUnitId,
    pub path: PathBuf,
    pub record: LockRecord,
    pub status: LockStatus,
    /// Heartbeat age at the time of listing.
    pub age: chrono::Duration,
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (owner: {}, heartbeat {} ago{})",
            self.unit,
            self.record.owner(),
            format_age(self.age),
            if self.status == LockStatus::Stale {
                ", STALE"
            } else {
                ""
            }
        )
    }
}

/// Reads and writes per-work-unit lock files under one root.
#[derive(Debug, Clone)]
pub struct LockStore<C: Clock = SystemClock> {
    ctx: RootContext,
    policy: StalenessPolicy,
    clock: C,
}

impl LockStore<SystemClock> {
    pub fn new(ctx: RootContext, policy: StalenessPolicy) -> Self {
        Self::with_clock(ctx, policy, SystemClock)
    }
}

impl<C: Clock> LockStore<C> {
    pub fn with_clock(ctx: RootContext, policy: StalenessPolicy, clock: C) -> Self {
        Self { ctx, policy, clock }
    }

    pub fn policy(&self) -> &StalenessPolicy {
        &self.policy
    }

    pub fn context(&self) -> &RootContext {
        &self.ctx
    }

    pub fn lock_path(&self, unit: &WorkUnitId) -> PathBuf {
        self.ctx.lock_path(unit)
    }

    /// Try to take the lock on `unit` for `holder`.
    ///
    /// A stale lock is reported, never reclaimed: the caller must decide to
    /// `force_release` it and try again.
    ///
    /// # Returns
    ///
    /// * `Ok(AcquireOutcome)` - Locked, Conflict, or StaleLockDetected
    /// * `Err(PackError::CorruptLock)` - An existing lock file cannot be parsed
    /// * `Err(PackError::Io)` - The lock file could not be read or created
    pub fn acquire(&self, unit: &WorkUnitId, holder: &HolderIdentity) -> Result<AcquireOutcome> {
        let path = self.lock_path(unit);

        if let Some(existing) = LockRecord::read_optional(&path)? {
            return Ok(self.outcome_for_existing(unit, existing));
        }

        let record = LockRecord::new(holder, self.clock.now());
        if atomic_create(&path, record.to_json()?.as_bytes())? {
            tracing::info!(unit = %unit, holder = %holder, "lock acquired");
            return Ok(AcquireOutcome::Locked(record));
        }

        // Lost the create race; report whoever won.
        match LockRecord::read_optional(&path)? {
            Some(existing) => Ok(self.outcome_for_existing(unit, existing)),
            None => Err(PackError::UserError(format!(
                "lock on work unit '{}' changed while acquiring; try again",
                unit
            ))),
        }
    }

    fn outcome_for_existing(&self, unit: &WorkUnitId, existing: LockRecord) -> AcquireOutcome {
        match classify(&existing, self.clock.now(), &self.policy) {
            LockStatus::Active => {
                tracing::debug!(unit = %unit, holder = %existing.owner(), "lock held elsewhere");
                AcquireOutcome::Conflict(existing)
            }
            LockStatus::Stale => {
                tracing::warn!(
                    unit = %unit,
                    holder = %existing.owner(),
                    last_heartbeat = %existing.last_heartbeat_at,
                    "stale lock detected"
                );
                AcquireOutcome::StaleLockDetected(existing)
            }
        }
    }

    /// Remove the lock file. Releasing an unlocked unit is a no-op.
    pub fn release(&self, unit: &WorkUnitId) -> Result<()> {
        let path = self.lock_path(unit);
        if remove_if_exists(&path)? {
            tracing::info!(unit = %unit, "lock released");
        }
        Ok(())
    }

    /// Remove the lock file regardless of holder or staleness.
    ///
    /// Returns the removed record when it was readable, for audit output.
    pub fn force_release(&self, unit: &WorkUnitId) -> Result<Option<LockRecord>> {
        let path = self.lock_path(unit);
        let previous = match LockRecord::read_optional(&path) {
            Ok(record) => record,
            Err(PackError::CorruptLock { reason, .. }) => {
                tracing::warn!(unit = %unit, %reason, "force-releasing unreadable lock file");
                None
            }
            Err(e) => return Err(e),
        };

        if remove_if_exists(&path)? {
            tracing::warn!(
                unit = %unit,
                previous_holder = %previous.as_ref().map(|r| r.owner()).unwrap_or_default(),
                "lock force-released"
            );
        }
        Ok(previous)
    }

    /// Refresh the heartbeat if `holder` still owns the lock.
    ///
    /// The whole record is rewritten through an atomic replace. If the lock is
    /// gone or owned by someone else, nothing is written.
    pub fn update_heartbeat(
        &self,
        unit: &WorkUnitId,
        holder: &HolderIdentity,
    ) -> Result<HeartbeatOutcome> {
        let path = self.lock_path(unit);
        let current = LockRecord::read_optional(&path)?;

        match current {
            Some(record) if record.is_held_by(holder) => {
                let refreshed = record.with_heartbeat(self.clock.now());
                atomic_write_file(&path, &refreshed.to_json()?)?;
                tracing::debug!(unit = %unit, "heartbeat refreshed");
                Ok(HeartbeatOutcome::Refreshed(refreshed))
            }
            other => Ok(HeartbeatOutcome::NotHolder { current: other }),
        }
    }

    /// Read and classify the lock on a single unit.
    pub fn status(&self, unit: &WorkUnitId) -> Result<UnitLockState> {
        match LockRecord::read_optional(self.lock_path(unit))? {
            None => Ok(UnitLockState::Free),
            Some(record) => {
                let status = classify(&record, self.clock.now(), &self.policy);
                Ok(UnitLockState::Held { record, status })
            }
        }
    }

    /// Enumerate every lock under this store's root.
    pub fn list_all(&self) -> Result<Vec<LockInfo>> {
        list_all(&self.ctx.root, &self.policy, self.clock.now())
    }
}

/// Enumerate every work unit lock file directly under `root`.
///
/// Pure read. Unreadable lock files are logged and skipped; a missing root
/// yields an empty list.
pub fn list_all(
    root: &Path,
    policy: &StalenessPolicy,
    now: DateTime<FixedOffset>,
) -> Result<Vec<LockInfo>> {
    let mut locks = Vec::new();

    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(locks),
        Err(e) => {
            return Err(PackError::Io(format!(
                "failed to read work unit root '{}': {}",
                root.display(),
                e
            )));
        }
    };

    for entry in entries {
        let entry = entry
            .map_err(|e| PackError::Io(format!("failed to read work unit root entry: {}", e)))?;

        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }

        let Some(unit) = dir
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| WorkUnitId::new(n).ok())
        else {
            continue;
        };

        let path = dir.join(LOCK_FILE);
        let record = match LockRecord::read_optional(&path) {
            Ok(Some(record)) => record,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable lock file");
                continue;
            }
        };

        let status = classify(&record, now, policy);
        let age = record.heartbeat_age(now);
        locks.push(LockInfo {
            unit,
            path,
            record,
            status,
            age,
        });
    }

    locks.sort_by(|a, b| a.unit.cmp(&b.unit));
    Ok(locks)
}

fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(PackError::Io(format!(
            "failed to remove lock file '{}': {}",
            path.display(),
            e
        ))),
    }
}
