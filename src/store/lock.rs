//! Exclusive lock files for cross-process store access.
//!
//! A lock is a file created with `create_new` semantics, so only one process
//! can hold it at a time. The file carries JSON metadata naming the holder:
//!
//! ```text
//! { "owner": "ops@build-01", "pid": 4242, "created_at": "...", "action": "update_usage" }
//! ```
//!
//! The lock is released when its [`LockGuard`] is dropped. A lock older than
//! the stale threshold is assumed to belong to a crashed process and is
//! broken with a warning.

use crate::error::{Result, TierwatchError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Metadata stored inside a lock file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockMetadata {
    /// Holder, as `user@HOST`.
    pub owner: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    pub created_at: DateTime<Utc>,

    /// Store operation being performed.
    pub action: String,
}

impl LockMetadata {
    pub fn new(action: &str) -> Self {
        Self {
            owner: owner_string(),
            pid: Some(std::process::id()),
            created_at: Utc::now(),
            action: action.to_string(),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            TierwatchError::Lock(format!(
                "failed to read lock file '{}': {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            TierwatchError::Lock(format!(
                "failed to parse lock file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    pub fn age(&self) -> Duration {
        Utc::now().signed_duration_since(self.created_at)
    }

    pub fn is_stale(&self, stale_after: std::time::Duration) -> bool {
        self.age().num_milliseconds() > stale_after.as_millis() as i64
    }
}

/// RAII guard for a lock file. Dropping it deletes the file.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release lock");
        }
    }
}

/// Acquire `lock_path`, retrying until `wait` elapses.
///
/// # Returns
///
/// * `Ok(LockGuard)` - Lock held until the guard is dropped
/// * `Err(TierwatchError::Lock)` - Another holder kept the lock for the whole wait
pub fn acquire_lock(
    lock_path: &Path,
    action: &str,
    wait: std::time::Duration,
    stale_after: std::time::Duration,
) -> Result<LockGuard> {
    if let Some(parent) = lock_path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            TierwatchError::Lock(format!(
                "failed to create lock directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let started = Instant::now();
    loop {
        match try_create(lock_path, action) {
            Ok(guard) => return Ok(guard),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                if let Ok(existing) = LockMetadata::from_file(lock_path)
                    && existing.is_stale(stale_after)
                {
                    tracing::warn!(
                        path = %lock_path.display(),
                        owner = %existing.owner,
                        action = %existing.action,
                        "breaking stale lock"
                    );
                    let _ = fs::remove_file(lock_path);
                    continue;
                }
                if started.elapsed() >= wait {
                    return Err(held_error(lock_path));
                }
                std::thread::sleep(std::time::Duration::from_millis(10));
            }
            Err(e) => {
                return Err(TierwatchError::Lock(format!(
                    "failed to acquire lock '{}': {}",
                    lock_path.display(),
                    e
                )));
            }
        }
    }
}

fn try_create(lock_path: &Path, action: &str) -> std::io::Result<LockGuard> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(lock_path)?;
    let guard = LockGuard {
        path: lock_path.to_path_buf(),
    };

    let json = serde_json::to_string_pretty(&LockMetadata::new(action))
        .map_err(std::io::Error::other)?;
    file.write_all(json.as_bytes())?;
    file.sync_all()?;
    Ok(guard)
}

fn held_error(lock_path: &Path) -> TierwatchError {
    match LockMetadata::from_file(lock_path) {
        Ok(meta) => TierwatchError::Lock(format!(
            "'{}' is held by {} (pid {}) for {}",
            lock_path.display(),
            meta.owner,
            meta.pid.map(|p| p.to_string()).unwrap_or_else(|| "?".to_string()),
            meta.action
        )),
        Err(_) => TierwatchError::Lock(format!("'{}' is held by another process", lock_path.display())),
    }
}

/// `user@HOST` string used for lock metadata and audit records.
pub fn owner_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}
