//! Periodic heartbeat refresh for a held lock.
//!
//! The publisher runs on its own thread and only ever touches the lock file.
//! It waits on a cancellation channel with the heartbeat interval as timeout:
//! a timeout is a tick, a message or a dropped sender is cancellation. Tick
//! failures are logged and retried on the next tick.

use super::holder::HolderIdentity;
use super::store::{HeartbeatOutcome, LockStore};
use crate::clock::Clock;
use crate::context::WorkUnitId;
use crate::error::{PackError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};

/// Outcome of one heartbeat tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickResult {
    Refreshed,
    NotHolder,
    Failed,
}

#[derive(Debug, Default)]
struct HeartbeatStats {
    ticks: AtomicU64,
    failures: AtomicU64,
    lost_ownership: AtomicBool,
}

/// Refreshes one unit's lock heartbeat on behalf of one holder.
#[derive(Debug, Clone)]
pub struct HeartbeatPublisher<C: Clock> {
    store: LockStore<C>,
    unit: WorkUnitId,
    holder: HolderIdentity,
    stats: Arc<HeartbeatStats>,
}

impl<C: Clock> HeartbeatPublisher<C> {
    pub fn new(store: LockStore<C>, unit: WorkUnitId, holder: HolderIdentity) -> Self {
        Self {
            store,
            unit,
            holder,
            stats: Arc::new(HeartbeatStats::default()),
        }
    }

    /// Perform a single refresh. Never returns an error: failures are logged.
    pub fn tick(&self) -> TickResult {
        self.stats.ticks.fetch_add(1, Ordering::Relaxed);

        match self.store.update_heartbeat(&self.unit, &self.holder) {
            Ok(HeartbeatOutcome::Refreshed(_)) => {
                if self.stats.lost_ownership.swap(false, Ordering::Relaxed) {
                    tracing::info!(unit = %self.unit, "lock ownership regained");
                }
                TickResult::Refreshed
            }
            Ok(HeartbeatOutcome::NotHolder { current }) => {
                if !self.stats.lost_ownership.swap(true, Ordering::Relaxed) {
                    tracing::warn!(
                        unit = %self.unit,
                        current_holder = %current.map(|r| r.to_string()).unwrap_or_else(|| "nobody".to_string()),
                        "heartbeat skipped: this station no longer holds the lock"
                    );
                }
                TickResult::NotHolder
            }
            Err(e) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(unit = %self.unit, error = %e, "heartbeat refresh failed, will retry");
                TickResult::Failed
            }
        }
    }

    /// Start ticking in the background every `heartbeat_interval`.
    pub fn start(self) -> Result<HeartbeatHandle> {
        let interval = self.store.policy().heartbeat_interval;
        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
        let stats = Arc::clone(&self.stats);
        let unit = self.unit.clone();

        let thread = thread::Builder::new()
            .name(format!("heartbeat-{}", self.unit))
            .spawn(move || {
                loop {
                    match cancel_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            self.tick();
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::debug!(unit = %self.unit, "heartbeat stopped");
            })
            .map_err(|e| PackError::Io(format!("failed to start heartbeat thread: {}", e)))?;

        tracing::debug!(unit = %unit, interval_secs = interval.as_secs(), "heartbeat started");
        Ok(HeartbeatHandle {
            cancel: Some(cancel_tx),
            thread: Some(thread),
            stats,
        })
    }
}

/// Cancellation handle for a running heartbeat. Dropping it cancels too.
#[derive(Debug)]
pub struct HeartbeatHandle {
    cancel: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
    stats: Arc<HeartbeatStats>,
}

impl HeartbeatHandle {
    /// Stop the heartbeat and wait for an in-flight tick to finish.
    pub fn cancel(mut self) {
        self.stop();
    }

    /// Number of ticks performed so far.
    pub fn ticks(&self) -> u64 {
        self.stats.ticks.load(Ordering::Relaxed)
    }

    /// Number of ticks that failed with an I/O error.
    pub fn failures(&self) -> u64 {
        self.stats.failures.load(Ordering::Relaxed)
    }

    /// Whether the last tick found the lock owned by someone else (or gone).
    pub fn lost_ownership(&self) -> bool {
        self.stats.lost_ownership.load(Ordering::Relaxed)
    }

    fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::warn!("heartbeat thread panicked");
        }
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
