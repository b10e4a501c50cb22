//! Exit code constants for the tierwatch CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, malformed task, invalid state transition)
//! - 2: Store failure (state could not be read or written)
//! - 3: Lock contention on the state directory
//! - 4: Escalation needed (capacity exhausted, bridge unreachable)
//! - 5: Supervision failure (relaunch attempts exhausted)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, malformed task, or invalid state transition.
pub const USER_ERROR: i32 = 1;

/// Durable store could not be read or written.
pub const STORE_FAILURE: i32 = 2;

/// Another process holds the state directory lock.
pub const LOCK_FAILURE: i32 = 3;

/// The outcome needs a human decision (cascade exhausted, bridge down).
pub const ESCALATION: i32 = 4;

/// The supervised process could not be brought back.
pub const SUPERVISION_FAILURE: i32 = 5;
