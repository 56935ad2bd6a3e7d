//! Exit code constants for the packguard CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid state)
//! - 2: Scan validation failure (unknown order, unexpected item, over-scan)
//! - 3: State storage failure (corrupt or unwritable snapshot)
//! - 4: Lock failure (held elsewhere, stale, unreadable)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid configuration, or invalid state.
pub const USER_ERROR: i32 = 1;

/// A scan or order transition was rejected by the state machine.
pub const VALIDATION_FAILURE: i32 = 2;

/// The persisted snapshot could not be read, parsed, or written.
pub const STATE_FAILURE: i32 = 3;

/// The work unit lock could not be acquired.
pub const LOCK_FAILURE: i32 = 4;
