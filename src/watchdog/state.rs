//! Watchdog states and the events the watchdog publishes.

use super::detect::LoopReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Current assessment of the supervised agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WatchdogState {
    Active,
    Stalled,
    Looping,
    Crashed,
    Recovering,
    Paused,
}

impl WatchdogState {
    /// States in which `feed` records nothing.
    pub fn ignores_output(self) -> bool {
        matches!(
            self,
            WatchdogState::Paused | WatchdogState::Recovering | WatchdogState::Crashed
        )
    }
}

impl fmt::Display for WatchdogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WatchdogState::Active => "ACTIVE",
            WatchdogState::Stalled => "STALLED",
            WatchdogState::Looping => "LOOPING",
            WatchdogState::Crashed => "CRASHED",
            WatchdogState::Recovering => "RECOVERING",
            WatchdogState::Paused => "PAUSED",
        };
        f.write_str(s)
    }
}

/// Why a kill-and-restart was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KillReason {
    /// A loop outlived `kill_timeout_ms`.
    LoopTimeout,
    /// A stall outlived every auto-continue nudge.
    MaxRetriesExceeded,
}

impl fmt::Display for KillReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KillReason::LoopTimeout => f.write_str("loop outlived the kill timeout"),
            KillReason::MaxRetriesExceeded => f.write_str("auto-continue retries exhausted"),
        }
    }
}

/// Published on every transition and intervention.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WatchdogEvent {
    StateChanged {
        from: WatchdogState,
        to: WatchdogState,
        at: DateTime<Utc>,
    },
    LoopDetected(LoopReport),
    StallDetected {
        silent_for_ms: u64,
    },
    AutoContinueSent {
        attempt: u32,
    },
    CrashDetected,
    KillAndRestart {
        reason: KillReason,
    },
    ProcessRestarted {
        command: String,
    },
    RestartFailed {
        attempts: usize,
    },
    Paused,
    Resumed,
}

impl WatchdogEvent {
    /// One line for the operator.
    pub fn message(&self) -> String {
        match self {
            WatchdogEvent::StateChanged { from, to, .. } => {
                format!("Watchdog: {} -> {}", from, to)
            }
            WatchdogEvent::LoopDetected(report) => format!(
                "Watchdog: loop detected, {} similar messages ({}% of window)",
                report.repeat_count, report.dominance_pct
            ),
            WatchdogEvent::StallDetected { silent_for_ms } => format!(
                "Watchdog: agent stalled, no output for {}",
                crate::clock::human_duration(*silent_for_ms)
            ),
            WatchdogEvent::AutoContinueSent { attempt } => {
                format!("Watchdog: auto-continue #{} sent", attempt)
            }
            WatchdogEvent::CrashDetected => {
                "Watchdog: agent process not found, starting recovery".to_string()
            }
            WatchdogEvent::KillAndRestart { reason } => {
                format!("Watchdog: killing and restarting agent ({})", reason)
            }
            WatchdogEvent::ProcessRestarted { command } => {
                format!("Watchdog: agent restarted with `{}`", command)
            }
            WatchdogEvent::RestartFailed { attempts } => format!(
                "Watchdog: all {} relaunch attempts failed; manual intervention required",
                attempts
            ),
            WatchdogEvent::Paused => "Watchdog: paused".to_string(),
            WatchdogEvent::Resumed => "Watchdog: resumed".to_string(),
        }
    }
}
