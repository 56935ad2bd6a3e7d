//! Locking subsystem for packguard.
//!
//! Each work unit has at most one lock file, `{root}/{unit}/session.lock`,
//! claiming it for one station. Several stations share the root over a
//! network filesystem and there is no lock server, so liveness is proven by
//! heartbeats: the holder rewrites `last_heartbeat_at` every heartbeat
//! interval, and a lock whose heartbeat is older than the stale timeout is
//! presumed abandoned.
//!
//! # Lock Files
//!
//! Lock files contain a JSON [`LockRecord`]: holder host, user and pid,
//! acquisition and heartbeat timestamps (RFC 3339 with offset), and optional
//! worker id/name. They are plain text so an operator can inspect them.
//!
//! # Stale Locks
//!
//! Acquiring a unit whose lock is stale does not take it over. The caller gets
//! [`AcquireOutcome::StaleLockDetected`] and must explicitly
//! [`LockStore::force_release`] before retrying, after confirming the other
//! station is really gone.
//!
//! # RAII Guards
//!
//! [`LockGuard`] owns a held lock and its [`HeartbeatHandle`]. Dropping it
//! cancels the heartbeat and releases the lock; failures during drop are
//! logged but never panic.

mod guard;
mod heartbeat;
mod holder;
mod record;
mod staleness;
mod store;


pub use guard::LockGuard;
pub use heartbeat::{HeartbeatHandle, HeartbeatPublisher, TickResult};
pub use holder::HolderIdentity;
pub use record::{LockRecord, format_age};
pub use staleness::{LockStatus, StalenessPolicy, classify};
pub use store::{
    AcquireOutcome, HeartbeatOutcome, LockInfo, LockStore, UnitLockState, list_all,
};
