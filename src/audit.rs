//! Append-only audit trail of dispatcher decisions.
//!
//! Records are NDJSON (one JSON object per line) in
//! `<state_dir>/events.ndjson`:
//!
//! - `ts`: RFC3339 timestamp
//! - `action`: the decision taken (submit, assign, escalate, approve, ...)
//! - `actor`: `user@HOST` of the process that took it
//! - `task`: task id, when the decision concerns one task
//! - `details`: freeform object with action-specific fields
//!
//! The trail is for humans and post-mortems. Pool and task state live in the
//! store; nothing ever reads the trail back to make decisions.

use crate::error::{Result, TierwatchError};
use crate::store::owner_string;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Decisions recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Task accepted and stored.
    Submit,
    /// Tier 1 slot acquired.
    Assign,
    /// Tier 2 ran the task (see `details.outcome`).
    Execute,
    /// Task parked as pending approval.
    Escalate,
    Approve,
    Reject,
    /// Task handed to the last-resort bridge.
    Delegate,
    /// Bridge failed; task moved to the retry queue.
    Requeue,
    /// Tier 1 work reported finished.
    Complete,
    /// Retry queue drained (see `details.placed`).
    Drain,
    PoolPause,
    PoolResume,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditAction::Submit => "submit",
            AuditAction::Assign => "assign",
            AuditAction::Execute => "execute",
            AuditAction::Escalate => "escalate",
            AuditAction::Approve => "approve",
            AuditAction::Reject => "reject",
            AuditAction::Delegate => "delegate",
            AuditAction::Requeue => "requeue",
            AuditAction::Complete => "complete",
            AuditAction::Drain => "drain",
            AuditAction::PoolPause => "pool_pause",
            AuditAction::PoolResume => "pool_resume",
        };
        f.write_str(s)
    }
}

/// One audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub ts: DateTime<Utc>,
    pub action: AuditAction,
    pub actor: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,

    pub details: Value,
}

impl AuditEvent {
    pub fn new(action: AuditAction, ts: DateTime<Utc>) -> Self {
        Self {
            ts,
            action,
            actor: owner_string(),
            task: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task = Some(task_id.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| TierwatchError::Store(format!("failed to serialize audit event: {}", e)))
    }
}

/// Writer for the NDJSON trail. A log without a path discards records.
#[derive(Debug, Default)]
pub struct AuditLog {
    path: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl AuditLog {
    /// Trail at `<state_dir>/events.ndjson`.
    pub fn in_dir<P: AsRef<Path>>(state_dir: P) -> Self {
        Self::at(state_dir.as_ref().join("events.ndjson"))
    }

    pub fn at(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            write_lock: Mutex::new(()),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one record, creating the file and its directory on first use.
    pub fn append(&self, event: &AuditEvent) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let line = event.to_ndjson_line()?;

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());

        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
            && !dir.exists()
        {
            fs::create_dir_all(dir).map_err(|e| {
                TierwatchError::Store(format!(
                    "failed to create audit directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                TierwatchError::Store(format!(
                    "failed to open audit log '{}': {}",
                    path.display(),
                    e
                ))
            })?;

        writeln!(file, "{}", line).map_err(|e| {
            TierwatchError::Store(format!(
                "failed to write audit log '{}': {}",
                path.display(),
                e
            ))
        })?;
        file.sync_data().map_err(|e| {
            TierwatchError::Store(format!(
                "failed to sync audit log '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Append and downgrade failures to a warning.
    ///
    /// Dispatch decisions are already durable in the store by the time they
    /// are audited, so a broken trail must not fail the operation.
    pub fn record(&self, event: AuditEvent) {
        if let Err(e) = self.append(&event) {
            tracing::warn!(action = %event.action, error = %e, "audit append failed");
        }
    }

    /// Read every record back. Malformed lines are skipped.
    pub fn read_all(&self) -> Result<Vec<AuditEvent>> {
        let Some(path) = &self.path else {
            return Ok(Vec::new());
        };
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(TierwatchError::Store(format!(
                    "failed to read audit log '{}': {}",
                    path.display(),
                    e
                )));
            }
        };
        Ok(content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_event_builder() {
        let event = AuditEvent::new(AuditAction::Escalate, Utc::now())
            .with_task("T-1")
            .with_details(json!({"reason": "credits exhausted"}));

        assert_eq!(event.task.as_deref(), Some("T-1"));
        assert_eq!(event.details["reason"], "credits exhausted");
        assert!(event.actor.contains('@'));
    }

    #[test]
    fn test_ndjson_line_is_single_line() {
        let event = AuditEvent::new(AuditAction::Submit, Utc::now())
            .with_details(json!({"title": "multi\nline"}));
        let line = event.to_ndjson_line().unwrap();
        assert!(!line.contains('\n'));
        assert!(line.contains("\"action\":\"submit\""));
    }

    #[test]
    fn test_append_and_read_back() {
        let temp = TempDir::new().unwrap();
        let log = AuditLog::in_dir(temp.path().join("state"));

        log.append(&AuditEvent::new(AuditAction::Submit, Utc::now()).with_task("T-1"))
            .unwrap();
        log.append(&AuditEvent::new(AuditAction::Assign, Utc::now()).with_task("T-1"))
            .unwrap();

        let events = log.read_all().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].action, AuditAction::Assign);

        let raw = fs::read_to_string(log.path().unwrap()).unwrap();
        assert_eq!(raw.lines().count(), 2);
    }

    #[test]
    fn test_disabled_log_discards() {
        let log = AuditLog::disabled();
        log.append(&AuditEvent::new(AuditAction::Drain, Utc::now()))
            .unwrap();
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_action_display_matches_serde() {
        for action in [AuditAction::PoolPause, AuditAction::Requeue, AuditAction::Delegate] {
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action));
        }
    }
}
