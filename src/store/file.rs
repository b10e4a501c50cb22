//! File-backed [`Store`] implementation.
//!
//! Layout under the state directory:
//!
//! ```text
//! <state_dir>/
//! ├── usage.json   # UsageSnapshot
//! ├── tasks.json   # id -> Task
//! └── store.lock   # present while a write is in progress
//! ```

use super::lock::acquire_lock;
use super::{Store, UsageSnapshot, duplicate_task, is_pending, sort_oldest_first};
use crate::error::{Result, TierwatchError};
use crate::fs::{atomic_write_json, read_json_or_default};
use crate::task::{Task, TaskId};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

type TaskMap = BTreeMap<TaskId, Task>;

/// Store that survives process restarts.
///
/// Writes are serialized within the process by a mutex and across processes
/// by `store.lock`. Reads see whole documents only, since every write is an
/// atomic rename.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    write_guard: Mutex<()>,
    lock_wait: Duration,
    lock_stale_after: Duration,
}

impl FileStore {
    /// Open (or create) a store rooted at `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| {
            TierwatchError::Store(format!(
                "failed to create state directory '{}': {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self {
            dir,
            write_guard: Mutex::new(()),
            lock_wait: Duration::from_secs(5),
            lock_stale_after: Duration::from_secs(60),
        })
    }

    pub fn with_lock_timing(mut self, wait: Duration, stale_after: Duration) -> Self {
        self.lock_wait = wait;
        self.lock_stale_after = stale_after;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn usage_path(&self) -> PathBuf {
        self.dir.join("usage.json")
    }

    fn tasks_path(&self) -> PathBuf {
        self.dir.join("tasks.json")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join("store.lock")
    }

    /// Run `f` while holding both the in-process and the on-disk lock.
    fn exclusive<T>(&self, action: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let _local = self
            .write_guard
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        let _file = acquire_lock(
            &self.lock_path(),
            action,
            self.lock_wait,
            self.lock_stale_after,
        )?;
        f()
    }

    fn read_tasks(&self) -> Result<TaskMap> {
        read_json_or_default(self.tasks_path())
    }
}

impl Store for FileStore {
    fn load_usage(&self) -> Result<UsageSnapshot> {
        read_json_or_default(self.usage_path())
    }

    fn update_usage(&self, f: &mut dyn FnMut(&mut UsageSnapshot)) -> Result<UsageSnapshot> {
        self.exclusive("update_usage", || {
            let mut usage: UsageSnapshot = read_json_or_default(self.usage_path())?;
            f(&mut usage);
            atomic_write_json(self.usage_path(), &usage)?;
            Ok(usage)
        })
    }

    fn add(&self, task: &Task) -> Result<()> {
        self.exclusive("add", || {
            let mut tasks = self.read_tasks()?;
            if tasks.contains_key(&task.id) {
                return Err(duplicate_task(&task.id));
            }
            tasks.insert(task.id.clone(), task.clone());
            atomic_write_json(self.tasks_path(), &tasks)
        })
    }

    fn update(&self, id: &TaskId, f: &mut dyn FnMut(&mut Task) -> Result<()>) -> Result<Task> {
        self.exclusive("update", || {
            let mut tasks = self.read_tasks()?;
            let task = tasks
                .get_mut(id)
                .ok_or_else(|| TierwatchError::TaskNotFound(id.to_string()))?;
            f(task)?;
            let updated = task.clone();
            atomic_write_json(self.tasks_path(), &tasks)?;
            Ok(updated)
        })
    }

    fn get(&self, id: &TaskId) -> Result<Option<Task>> {
        Ok(self.read_tasks()?.remove(id))
    }

    fn get_pending(&self) -> Result<Vec<Task>> {
        let mut pending: Vec<Task> = self
            .read_tasks()?
            .into_values()
            .filter(is_pending)
            .collect();
        sort_oldest_first(&mut pending);
        Ok(pending)
    }

    fn list(&self) -> Result<Vec<Task>> {
        let mut all: Vec<Task> = self.read_tasks()?.into_values().collect();
        sort_oldest_first(&mut all);
        Ok(all)
    }
}
