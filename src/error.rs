//! Error types for tierwatch.
//!
//! Uses thiserror for derive macros. The first six variants are the dispatch
//! and supervision taxonomy; the rest are plumbing failures.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for tierwatch operations.
#[derive(Error, Debug)]
pub enum TierwatchError {
    /// No account in the pool can take the task right now.
    #[error("no pool capacity: {0}")]
    CapacityExhausted(String),

    /// The fast executor has no credits left.
    #[error("fast executor credits exhausted: {0}")]
    ExecutorCreditsExhausted(String),

    /// A tier ran the task and it failed.
    #[error("{tier} execution failed: {message}")]
    ExecutionError { tier: String, message: String },

    /// The last-resort bridge could not be reached.
    #[error("last-resort bridge unavailable: {0}")]
    BridgeUnavailable(String),

    /// Every relaunch attempt failed; an operator has to step in.
    #[error("restart failed after {attempts} relaunch attempts; manual intervention required")]
    RestartFailed { attempts: usize },

    /// Task submission was rejected before dispatch.
    #[error("malformed task: {0}")]
    MalformedTask(String),

    /// Configuration could not be loaded or is invalid.
    #[error("config error: {0}")]
    Config(String),

    /// The durable store failed to read or write state.
    #[error("store error: {0}")]
    Store(String),

    /// Referenced task does not exist.
    #[error("task '{0}' not found")]
    TaskNotFound(String),

    /// The requested operation does not apply to the task's current status.
    #[error("cannot {action} task '{id}' while it is {status}")]
    InvalidTransition {
        id: String,
        status: String,
        action: String,
    },

    /// State directory lock is held elsewhere.
    #[error("lock acquisition failed: {0}")]
    Lock(String),

    /// Supervision could not be set up (threads, the watched command).
    #[error("supervision error: {0}")]
    Supervisor(String),
}

impl TierwatchError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            TierwatchError::MalformedTask(_)
            | TierwatchError::Config(_)
            | TierwatchError::TaskNotFound(_)
            | TierwatchError::InvalidTransition { .. } => exit_codes::USER_ERROR,
            TierwatchError::Store(_) => exit_codes::STORE_FAILURE,
            TierwatchError::Lock(_) => exit_codes::LOCK_FAILURE,
            TierwatchError::CapacityExhausted(_)
            | TierwatchError::ExecutorCreditsExhausted(_)
            | TierwatchError::ExecutionError { .. }
            | TierwatchError::BridgeUnavailable(_) => exit_codes::ESCALATION,
            TierwatchError::RestartFailed { .. } | TierwatchError::Supervisor(_) => {
                exit_codes::SUPERVISION_FAILURE
            }
        }
    }

    /// Whether the dispatcher should turn this failure into the next cascade step.
    pub fn is_cascade_signal(&self) -> bool {
        matches!(
            self,
            TierwatchError::CapacityExhausted(_)
                | TierwatchError::ExecutorCreditsExhausted(_)
                | TierwatchError::ExecutionError { .. }
                | TierwatchError::BridgeUnavailable(_)
        )
    }

    /// Short stable label for logs and audit records.
    pub fn as_label(&self) -> &'static str {
        match self {
            TierwatchError::CapacityExhausted(_) => "capacity_exhausted",
            TierwatchError::ExecutorCreditsExhausted(_) => "executor_credits_exhausted",
            TierwatchError::ExecutionError { .. } => "execution_error",
            TierwatchError::BridgeUnavailable(_) => "bridge_unavailable",
            TierwatchError::RestartFailed { .. } => "restart_failed",
            TierwatchError::MalformedTask(_) => "malformed_task",
            TierwatchError::Config(_) => "config",
            TierwatchError::Store(_) => "store",
            TierwatchError::TaskNotFound(_) => "task_not_found",
            TierwatchError::InvalidTransition { .. } => "invalid_transition",
            TierwatchError::Lock(_) => "lock",
            TierwatchError::Supervisor(_) => "supervisor",
        }
    }
}

/// Result type alias for tierwatch operations.
pub type Result<T> = std::result::Result<T, TierwatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_errors_share_exit_code() {
        let errs = [
            TierwatchError::MalformedTask("empty title".to_string()),
            TierwatchError::TaskNotFound("T-1".to_string()),
            TierwatchError::Config("bad yaml".to_string()),
        ];
        for err in errs {
            assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
        }
    }

    #[test]
    fn restart_failed_is_supervision_failure() {
        let err = TierwatchError::RestartFailed { attempts: 3 };
        assert_eq!(err.exit_code(), exit_codes::SUPERVISION_FAILURE);
        assert!(!err.is_cascade_signal());
    }

    #[test]
    fn tier_failures_cascade() {
        assert!(TierwatchError::CapacityExhausted("full".into()).is_cascade_signal());
        assert!(TierwatchError::ExecutorCreditsExhausted("429".into()).is_cascade_signal());
        assert!(
            TierwatchError::ExecutionError {
                tier: "fast".into(),
                message: "boom".into()
            }
            .is_cascade_signal()
        );
        assert!(!TierwatchError::MalformedTask("x".into()).is_cascade_signal());
    }

    #[test]
    fn error_messages_are_descriptive() {
        let err = TierwatchError::InvalidTransition {
            id: "T-1".into(),
            status: "running".into(),
            action: "approve".into(),
        };
        assert_eq!(
            err.to_string(),
            "cannot approve task 'T-1' while it is running"
        );

        let err = TierwatchError::RestartFailed { attempts: 2 };
        assert_eq!(
            err.to_string(),
            "restart failed after 2 relaunch attempts; manual intervention required"
        );
    }
}
