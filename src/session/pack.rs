//! A locked, resumable packing session.

use super::machine::WorkSession;
use super::manifest::Manifest;
use super::summary::SessionSummary;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::context::{RootContext, WorkUnitId};
use crate::error::Result;
use crate::locks::{HolderIdentity, LockGuard, LockStore};
use crate::snapshot::SnapshotStore;

/// Lock held, heartbeat running, state machine resumed.
///
/// Dropping the session releases the lock the same way [`PackSession::close`]
/// does, logging instead of returning errors.
#[derive(Debug)]
pub struct PackSession<C: Clock = SystemClock> {
    lock: LockGuard<C>,
    work: WorkSession<C>,
}

impl PackSession<SystemClock> {
    /// Open a session as the current process using `config`.
    pub fn open(
        ctx: &RootContext,
        config: &Config,
        unit: WorkUnitId,
        manifest: Manifest,
    ) -> Result<Self> {
        let locks = LockStore::new(ctx.clone(), config.staleness_policy());
        Self::open_with(locks, HolderIdentity::current(config), unit, manifest, SystemClock)
    }
}

impl<C: Clock> PackSession<C> {
    /// Acquire the unit's lock for `holder`, then resume its state.
    ///
    /// # Returns
    ///
    /// * `Ok(PackSession)` - Ready to pack
    /// * `Err(PackError::LockConflict)` / `Err(PackError::StaleLockDetected)` - Not acquired
    /// * `Err(PackError::CorruptState)` - Lock released again; quarantine the snapshot first
    pub fn open_with(
        locks: LockStore<C>,
        holder: HolderIdentity,
        unit: WorkUnitId,
        manifest: Manifest,
        clock: C,
    ) -> Result<Self> {
        let snapshots = SnapshotStore::new(locks.context().clone());
        let lock = LockGuard::acquire(locks, unit.clone(), holder)?;
        let work = WorkSession::resume(unit, manifest, snapshots, clock)?;
        Ok(Self { lock, work })
    }

    pub fn work(&self) -> &WorkSession<C> {
        &self.work
    }

    pub fn work_mut(&mut self) -> &mut WorkSession<C> {
        &mut self.work
    }

    pub fn lock(&self) -> &LockGuard<C> {
        &self.lock
    }

    /// Stop the heartbeat and release the lock. Progress stays on disk.
    pub fn close(self) -> Result<()> {
        let Self { lock, work } = self;
        drop(work);
        lock.release()
    }

    /// Write the session summary, then release the lock.
    pub fn finish(self) -> Result<SessionSummary> {
        let Self { lock, work } = self;
        let summary = work.finish()?;
        lock.release()?;
        Ok(summary)
    }
}
