//! Durable state for the pool and the dispatcher.
//!
//! The [`Store`] trait is the single persistence seam. Account counters are
//! only ever changed through [`Store::update_usage`] and task records through
//! [`Store::update`], both read-modify-write operations that run under the
//! store's own exclusion, so concurrent callers cannot lose each other's
//! writes.
//!
//! Two implementations ship:
//! - [`MemoryStore`]: process-local, used by tests and ephemeral runs
//! - [`FileStore`]: JSON documents under the state directory, serialized
//!   across processes with an exclusive lock file

mod file;
mod lock;
mod memory;


pub use file::FileStore;
pub use lock::{LockGuard, LockMetadata, acquire_lock, owner_string};
pub use memory::MemoryStore;

use crate::error::{Result, TierwatchError};
use crate::pool::Slot;
use crate::task::{Task, TaskId, TaskStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Durable per-account usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountUsage {
    pub daily_used: u32,
    /// Paused on its own by an operator. Pool-wide holds live in
    /// [`UsageSnapshot::pause_holds`] and never touch this flag.
    pub paused: bool,
    /// Slots held by in-flight work, so `complete` from another process can
    /// release them.
    pub active_slots: Vec<Slot>,
}

/// Everything the pool persists between restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageSnapshot {
    /// Day the counters belong to (`YYYY-MM-DD` under the reset boundary).
    pub date_key: String,
    pub accounts: BTreeMap<String, AccountUsage>,
    /// Tasks handed to the last-resort bridge today.
    pub last_resort_delegations: u32,
    /// Named reasons the whole pool is held paused (`thermal`, `recovery`,
    /// `operator`). Kept here so a later process can lift them.
    pub pause_holds: BTreeSet<String>,
}

/// Persistence collaborator for the pool's usage and the dispatcher's tasks.
pub trait Store: Send + Sync {
    /// Current usage snapshot (empty on first run).
    fn load_usage(&self) -> Result<UsageSnapshot>;

    /// Apply `f` to the stored usage and persist the result atomically.
    fn update_usage(&self, f: &mut dyn FnMut(&mut UsageSnapshot)) -> Result<UsageSnapshot>;

    /// Insert a new task record. Fails if the id already exists.
    fn add(&self, task: &Task) -> Result<()>;

    /// Apply `f` to an existing task and persist it atomically.
    ///
    /// Returns `TaskNotFound` for unknown ids. Callers are responsible for
    /// checking the current status inside `f`; see [`Store::update_status`].
    fn update(&self, id: &TaskId, f: &mut dyn FnMut(&mut Task) -> Result<()>) -> Result<Task>;

    fn get(&self, id: &TaskId) -> Result<Option<Task>>;

    /// Tasks waiting on a decision or a retry, oldest first.
    fn get_pending(&self) -> Result<Vec<Task>>;

    /// Every stored task, oldest first.
    fn list(&self) -> Result<Vec<Task>>;

    /// Move a task to `status`, optionally recording a result.
    ///
    /// Terminal tasks are immutable: any change to a `completed` or `failed`
    /// task fails with `InvalidTransition`, including a repeat of its status.
    fn update_status(&self, id: &TaskId, status: TaskStatus, result: Option<&str>) -> Result<Task> {
        self.update(id, &mut |task| {
            if task.status.is_terminal() {
                return Err(TierwatchError::InvalidTransition {
                    id: task.id.to_string(),
                    status: task.status.to_string(),
                    action: format!("move to {}", status),
                });
            }
            task.status = status;
            if let Some(result) = result {
                task.result = Some(result.to_string());
            }
            Ok(())
        })
    }
}

/// Whether a task belongs in [`Store::get_pending`].
pub(crate) fn is_pending(task: &Task) -> bool {
    matches!(
        task.status,
        TaskStatus::Pending | TaskStatus::PendingApproval
    )
}

/// Stable ordering used by `get_pending` and `list`.
pub(crate) fn sort_oldest_first(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}

pub(crate) fn duplicate_task(id: &TaskId) -> TierwatchError {
    TierwatchError::Store(format!("task '{}' already exists", id))
}
