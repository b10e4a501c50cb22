//! Tier 2 and tier 3 collaborators and the timeout wrapper around them.

use crate::error::{Result, TierwatchError};
use crate::task::{Task, Tier};
use std::sync::mpsc;
use std::time::Duration;

/// Tier 2: fast, credit-limited execution.
pub trait FastExecutor: Send + Sync {
    /// Cheap pre-check. `false` skips the call entirely.
    fn has_credits(&self) -> bool;

    /// Run the task and return its result text.
    ///
    /// Implementations must stop work by `timeout`. The dispatcher moves on
    /// to the next tier once it passes, so work still running after that
    /// could run the task twice.
    ///
    /// Fails with `ExecutorCreditsExhausted` when credits ran out mid-call and
    /// `ExecutionError` for anything else.
    fn execute(&self, task: &Task, timeout: Duration) -> Result<String>;
}

/// Tier 3: the human-gated last-resort path.
pub trait LastResortBridge: Send + Sync {
    /// Hand the task over. `BridgeUnavailable` when the gateway is unreachable.
    ///
    /// Implementations must stop work by `timeout`; a timed-out task is
    /// requeued and may be delegated again.
    fn delegate(&self, task: &Task, timeout: Duration) -> Result<String>;
}

/// Stand-in when no tier-2 executor is configured; always out of credits.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFastExecutor;

impl FastExecutor for NoFastExecutor {
    fn has_credits(&self) -> bool {
        false
    }

    fn execute(&self, _task: &Task, _timeout: Duration) -> Result<String> {
        Err(TierwatchError::ExecutorCreditsExhausted(
            "no fast executor configured".to_string(),
        ))
    }
}

/// Stand-in when no bridge is configured; always unreachable.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBridge;

impl LastResortBridge for NoBridge {
    fn delegate(&self, _task: &Task, _timeout: Duration) -> Result<String> {
        Err(TierwatchError::BridgeUnavailable(
            "no last-resort bridge configured".to_string(),
        ))
    }
}

/// Run `job` on its own thread and give up after `timeout`.
///
/// A job that overruns is abandoned, not cancelled; its thread finishes in
/// the background and its result is dropped. Jobs are expected to honor
/// `timeout` themselves, as [`super::CommandExecutor`] does by killing its
/// child.
pub(crate) fn run_bounded<T, F>(tier: Tier, timeout: Duration, job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name(format!("tier-{}", tier.number()))
        .spawn(move || {
            let _ = tx.send(job());
        })
        .map_err(|e| TierwatchError::ExecutionError {
            tier: tier.to_string(),
            message: format!("failed to start worker: {}", e),
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(TierwatchError::ExecutionError {
            tier: tier.to_string(),
            message: format!("timed out after {}ms", timeout.as_millis()),
        }),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(TierwatchError::ExecutionError {
            tier: tier.to_string(),
            message: "worker exited without a result".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_job_returns_result() {
        let value = run_bounded(Tier::Fast, Duration::from_secs(1), || Ok(7)).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn bounded_job_times_out() {
        let err = run_bounded(Tier::Fast, Duration::from_millis(20), || {
            std::thread::sleep(Duration::from_millis(500));
            Ok(())
        })
        .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn panicking_job_is_execution_error() {
        let err = run_bounded::<(), _>(Tier::LastResort, Duration::from_secs(1), || {
            panic!("worker blew up")
        })
        .unwrap_err();
        assert!(matches!(err, TierwatchError::ExecutionError { .. }));
    }

    #[test]
    fn placeholders_signal_cascade() {
        assert!(!NoFastExecutor.has_credits());
        let task = Task::new(
            crate::task::TaskId::new("T-1"),
            "t",
            None,
            None,
            chrono::Utc::now(),
        )
        .unwrap();
        let err = NoBridge.delegate(&task, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, TierwatchError::BridgeUnavailable(_)));
    }
}
