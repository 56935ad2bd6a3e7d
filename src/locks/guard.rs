//! RAII guard for a held work unit lock.

use super::heartbeat::{HeartbeatHandle, HeartbeatPublisher};
use super::holder::HolderIdentity;
use super::record::LockRecord;
use super::store::LockStore;
use crate::clock::Clock;
use crate::context::WorkUnitId;
use crate::error::Result;

/// A held lock together with its running heartbeat.
///
/// Releasing (or dropping) the guard cancels the heartbeat first and then
/// removes the lock file.
///
/// Unlike [`LockStore::release`], which removes the file unconditionally, the
/// guard re-reads the lock first and leaves it in place when the record names
/// a different holder. A station whose lock was force-released and taken over
/// therefore cannot delete the new holder's claim when its session ends.
#[derive(Debug)]
pub struct LockGuard<C: Clock> {
    store: LockStore<C>,
    unit: WorkUnitId,
    holder: HolderIdentity,
    record: LockRecord,
    heartbeat: Option<HeartbeatHandle>,
    released: bool,
}

impl<C: Clock> LockGuard<C> {
    /// Acquire the lock and start its heartbeat.
    ///
    /// # Returns
    ///
    /// * `Ok(LockGuard)` - Lock held, heartbeat running
    /// * `Err(PackError::LockConflict)` - Held by a live holder
    /// * `Err(PackError::StaleLockDetected)` - Held by a silent holder; force-release first
    pub fn acquire(store: LockStore<C>, unit: WorkUnitId, holder: HolderIdentity) -> Result<Self> {
        let record = store.acquire(&unit, &holder)?.into_result(&unit)?;

        let heartbeat = match HeartbeatPublisher::new(store.clone(), unit.clone(), holder.clone())
            .start()
        {
            Ok(handle) => handle,
            Err(e) => {
                let _ = store.release(&unit);
                return Err(e);
            }
        };

        Ok(Self {
            store,
            unit,
            holder,
            record,
            heartbeat: Some(heartbeat),
            released: false,
        })
    }

    pub fn unit(&self) -> &WorkUnitId {
        &self.unit
    }

    /// The record as written at acquisition.
    pub fn record(&self) -> &LockRecord {
        &self.record
    }

    pub fn heartbeat(&self) -> Option<&HeartbeatHandle> {
        self.heartbeat.as_ref()
    }

    /// Whether the heartbeat found the lock taken over by someone else.
    pub fn lost_ownership(&self) -> bool {
        self.heartbeat.as_ref().is_some_and(|h| h.lost_ownership())
    }

    /// Cancel the heartbeat and release the lock, reporting errors.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<()> {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.cancel();
        }

        match self.store.status(&self.unit) {
            Ok(super::UnitLockState::Held { record, .. }) if !record.is_held_by(&self.holder) => {
                tracing::warn!(
                    unit = %self.unit,
                    current_holder = %record,
                    "not releasing lock now held by another station"
                );
                Ok(())
            }
            _ => self.store.release(&self.unit),
        }
    }
}

impl<C: Clock> Drop for LockGuard<C> {
    fn drop(&mut self) {
        if !self.released
            && let Err(e) = self.release_inner()
        {
            tracing::warn!(unit = %self.unit, error = %e, "failed to release lock");
        }
    }
}
