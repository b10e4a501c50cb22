//! Bounded audit trail of watchdog actions.

use super::state::WatchdogState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// What a history entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryAction {
    Started,
    Stopped,
    StateChanged,
    LoopDetected,
    LoopCleared,
    StallDetected,
    AutoContinue,
    CrashDetected,
    KillAndRestart,
    ProcessRestarted,
    RestartFailed,
    Paused,
    Resumed,
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HistoryAction::Started => "STARTED",
            HistoryAction::Stopped => "STOPPED",
            HistoryAction::StateChanged => "STATE_CHANGED",
            HistoryAction::LoopDetected => "LOOP_DETECTED",
            HistoryAction::LoopCleared => "LOOP_CLEARED",
            HistoryAction::StallDetected => "STALL_DETECTED",
            HistoryAction::AutoContinue => "AUTO_CONTINUE",
            HistoryAction::CrashDetected => "CRASH_DETECTED",
            HistoryAction::KillAndRestart => "KILL_AND_RESTART",
            HistoryAction::ProcessRestarted => "PROCESS_RESTARTED",
            HistoryAction::RestartFailed => "RESTART_FAILED",
            HistoryAction::Paused => "PAUSED",
            HistoryAction::Resumed => "RESUMED",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub action: HistoryAction,
    /// State at the time the entry was written.
    pub state: WatchdogState,
    pub details: Value,
}

/// Append-only log; once it grows past `cap` only the newest `keep` remain.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<HistoryEntry>,
    cap: usize,
    keep: usize,
}

impl History {
    pub fn new(cap: usize, keep: usize) -> Self {
        Self {
            entries: Vec::new(),
            cap,
            keep: keep.min(cap),
        }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
        if self.entries.len() > self.cap {
            let drop = self.entries.len() - self.keep;
            self.entries.drain(..drop);
        }
    }

    /// The newest `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<HistoryEntry> {
        let start = self.entries.len().saturating_sub(n);
        self.entries[start..].to_vec()
    }

    pub fn all(&self) -> Vec<HistoryEntry> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
