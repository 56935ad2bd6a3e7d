//! Error types for packguard.
//!
//! Uses thiserror for derive macros and provides operator-actionable messages:
//! lock failures name the holder, scan failures name the order and item.

use crate::exit_codes;
use crate::locks::LockRecord;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for packguard operations.
#[derive(Error, Debug)]
pub enum PackError {
    /// User provided invalid arguments or the system is in an invalid state.
    #[error("{0}")]
    UserError(String),

    /// A filesystem operation failed.
    #[error("{0}")]
    Io(String),

    /// The work unit is held by someone whose heartbeat is still fresh.
    #[error("work unit '{unit}' is locked by {holder}")]
    LockConflict { unit: String, holder: Box<LockRecord> },

    /// The work unit is held by someone whose heartbeat has expired.
    #[error(
        "work unit '{unit}' has a stale lock from {holder}\n\
         If that station is no longer packing, force-release the lock and try again."
    )]
    StaleLockDetected { unit: String, holder: Box<LockRecord> },

    /// A lock file exists but its contents could not be parsed.
    #[error("lock file '{}' is unreadable: {reason}", .path.display())]
    CorruptLock { path: PathBuf, reason: String },

    /// The persisted state file could not be parsed.
    #[error("state file '{}' is corrupt: {reason}", .path.display())]
    CorruptState { path: PathBuf, reason: String },

    /// Order id not present in the packing list.
    #[error("order '{0}' is not part of this packing list")]
    UnknownIdentifier(String),

    /// Order already packed.
    #[error("order '{0}' is already completed")]
    AlreadyCompleted(String),

    /// Item scanned with no order in progress.
    #[error("no order is in progress; scan an order first")]
    NoActiveOrder,

    /// Item not part of the active order.
    #[error("item '{item}' is not part of order '{order}'")]
    UnexpectedItem { order: String, item: String },

    /// Item would be packed beyond its required quantity.
    #[error("item '{item}' in order '{order}' is already fully packed ({required} required)")]
    QuantityExceeded {
        order: String,
        item: String,
        required: u32,
    },

    /// A mutation could not be persisted; the in-memory state was not changed.
    #[error("failed to save state for work unit '{unit}': {reason}")]
    SnapshotWrite { unit: String, reason: String },
}

impl PackError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            PackError::UserError(_) => exit_codes::USER_ERROR,
            PackError::UnknownIdentifier(_)
            | PackError::AlreadyCompleted(_)
            | PackError::NoActiveOrder
            | PackError::UnexpectedItem { .. }
            | PackError::QuantityExceeded { .. } => exit_codes::VALIDATION_FAILURE,
            PackError::Io(_) | PackError::CorruptState { .. } | PackError::SnapshotWrite { .. } => {
                exit_codes::STATE_FAILURE
            }
            PackError::LockConflict { .. }
            | PackError::StaleLockDetected { .. }
            | PackError::CorruptLock { .. } => exit_codes::LOCK_FAILURE,
        }
    }

    /// Whether this is a per-scan rejection after which the session continues.
    pub fn is_scan_rejection(&self) -> bool {
        self.exit_code() == exit_codes::VALIDATION_FAILURE
    }
}

/// Result type alias for packguard operations.
pub type Result<T> = std::result::Result<T, PackError>;
