//! In-memory [`Store`] implementation.

use super::{Store, UsageSnapshot, duplicate_task, is_pending, sort_oldest_first};
use crate::error::{Result, TierwatchError};
use crate::task::{Task, TaskId};
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Inner {
    usage: UsageSnapshot,
    tasks: BTreeMap<TaskId, Task>,
}

/// Process-local store. State is lost when the value is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

impl Store for MemoryStore {
    fn load_usage(&self) -> Result<UsageSnapshot> {
        Ok(self.lock().usage.clone())
    }

    fn update_usage(&self, f: &mut dyn FnMut(&mut UsageSnapshot)) -> Result<UsageSnapshot> {
        let mut inner = self.lock();
        f(&mut inner.usage);
        Ok(inner.usage.clone())
    }

    fn add(&self, task: &Task) -> Result<()> {
        let mut inner = self.lock();
        if inner.tasks.contains_key(&task.id) {
            return Err(duplicate_task(&task.id));
        }
        inner.tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    fn update(&self, id: &TaskId, f: &mut dyn FnMut(&mut Task) -> Result<()>) -> Result<Task> {
        let mut inner = self.lock();
        let stored = inner
            .tasks
            .get_mut(id)
            .ok_or_else(|| TierwatchError::TaskNotFound(id.to_string()))?;

        // Mutate a copy so a failed closure leaves the record untouched.
        let mut draft = stored.clone();
        f(&mut draft)?;
        *stored = draft.clone();
        Ok(draft)
    }

    fn get(&self, id: &TaskId) -> Result<Option<Task>> {
        Ok(self.lock().tasks.get(id).cloned())
    }

    fn get_pending(&self) -> Result<Vec<Task>> {
        let mut pending: Vec<Task> = self
            .lock()
            .tasks
            .values()
            .filter(|t| is_pending(t))
            .cloned()
            .collect();
        sort_oldest_first(&mut pending);
        Ok(pending)
    }

    fn list(&self) -> Result<Vec<Task>> {
        let mut all: Vec<Task> = self.lock().tasks.values().cloned().collect();
        sort_oldest_first(&mut all);
        Ok(all)
    }
}
