//! Cascading dispatcher: tries the pool, then the fast executor, then parks
//! the task for a human decision.
//!
//! # Tiers
//!
//! 1. **Pool**: `AccountPool::acquire`. Success leaves the task `running`
//!    until [`Dispatcher::complete`] is called.
//! 2. **Fast**: a credit-limited executor run synchronously under
//!    `fast_timeout_ms`. Credits exhausted and execution errors both cascade
//!    but are logged differently.
//! 3. **Last resort**: the task is stored as `pending_approval` and the call
//!    returns. [`Dispatcher::approve`] hands it to the bridge under
//!    `bridge_timeout_ms`; [`Dispatcher::reject`] sends it back to tier 1.
//!
//! A bridge failure never drops a task: it goes back to `pending` and onto
//! the retry queue, which [`Dispatcher::drain`] feeds into tier 1 whenever
//! capacity comes back.
//!
//! Dispatch is idempotent. A task that is already `running` or
//! `pending_approval` is reported as such and never executed twice.

mod command;
mod fault;
mod stats;
mod tiers;


pub use command::{CommandExecutor, EXIT_TEMPFAIL};
pub use fault::FaultInjector;
pub use stats::{DispatchStats, TierCounters};
pub use tiers::{FastExecutor, LastResortBridge, NoBridge, NoFastExecutor};

use crate::audit::{AuditAction, AuditEvent, AuditLog};
use crate::clock::Clock;
use crate::config::DispatchConfig;
use crate::error::{Result, TierwatchError};
use crate::notify::{Notifier, NullNotifier};
use crate::pool::{AccountPool, AcquireOutcome, Slot};
use crate::store::Store;
use crate::task::{Priority, Task, TaskId, TaskStatus, Tier};
use serde_json::json;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// What happened to a task on this call.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Holding a pool slot; report back through `complete`.
    Assigned { task: TaskId, account_id: String },
    /// Ran to completion on tier 2 or 3.
    Completed {
        task: TaskId,
        tier: Tier,
        result: String,
    },
    /// Waiting for an operator to approve or reject.
    PendingApproval { task: TaskId },
    /// The bridge failed; the task waits on the retry queue.
    Requeued { task: TaskId, reason: String },
    /// The task is already running or awaiting approval; nothing was done.
    AlreadyInProgress { task: TaskId, status: TaskStatus },
}

impl DispatchOutcome {
    pub fn task_id(&self) -> &TaskId {
        match self {
            DispatchOutcome::Assigned { task, .. }
            | DispatchOutcome::Completed { task, .. }
            | DispatchOutcome::PendingApproval { task }
            | DispatchOutcome::Requeued { task, .. }
            | DispatchOutcome::AlreadyInProgress { task, .. } => task,
        }
    }

    /// Whether an operator has to act before the task can move on.
    pub fn needs_human(&self) -> bool {
        matches!(self, DispatchOutcome::PendingApproval { .. })
    }
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchOutcome::Assigned { task, account_id } => {
                write!(f, "Task {} assigned to account {}", task, account_id)
            }
            DispatchOutcome::Completed { task, tier, .. } => {
                write!(f, "Task {} completed on the {} tier", task, tier)
            }
            DispatchOutcome::PendingApproval { task } => write!(
                f,
                "Task {} is pending approval (approve or reject it to continue)",
                task
            ),
            DispatchOutcome::Requeued { task, reason } => {
                write!(f, "Task {} requeued for retry: {}", task, reason)
            }
            DispatchOutcome::AlreadyInProgress { task, status } => {
                write!(f, "Task {} is already {}", task, status)
            }
        }
    }
}

/// How a tier-1 task ended, as reported by whoever ran it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded(Option<String>),
    Failed(String),
}

/// Result of one retry-queue drain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainReport {
    /// Tasks placed on the pool, with the account that took them.
    pub placed: Vec<(TaskId, String)>,
    /// Tasks still waiting.
    pub remaining: usize,
}

/// The cascading dispatcher. Share it behind an `Arc`.
pub struct Dispatcher {
    pool: Arc<AccountPool>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    fast: Arc<dyn FastExecutor>,
    bridge: Arc<dyn LastResortBridge>,
    notifier: Arc<dyn Notifier>,
    audit: AuditLog,
    fault: FaultInjector,
    fast_timeout: Duration,
    bridge_timeout: Duration,
    retry_queue: Mutex<VecDeque<TaskId>>,
    forced_tier: Mutex<Option<Tier>>,
    in_flight: Mutex<HashSet<TaskId>>,
    stats: Mutex<DispatchStats>,
    seq: AtomicU32,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poison| poison.into_inner())
}

/// Marks a task as being dispatched by this process until dropped.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<TaskId>>,
    id: TaskId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        lock(self.set).remove(&self.id);
    }
}

impl Dispatcher {
    /// Build a dispatcher with no tier-2 executor and no bridge.
    ///
    /// Tasks left `pending` in the store (requeued before a restart) are
    /// loaded onto the retry queue.
    pub fn new(pool: Arc<AccountPool>, store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Result<Self> {
        let defaults = DispatchConfig::default();
        let queued: VecDeque<TaskId> = store
            .get_pending()?
            .into_iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .map(|t| t.id)
            .collect();
        if !queued.is_empty() {
            tracing::info!(count = queued.len(), "reloaded retry queue");
        }

        Ok(Self {
            pool,
            store,
            clock,
            fast: Arc::new(NoFastExecutor),
            bridge: Arc::new(NoBridge),
            notifier: Arc::new(NullNotifier),
            audit: AuditLog::disabled(),
            fault: FaultInjector::disabled(),
            fast_timeout: Duration::from_millis(defaults.fast_timeout_ms),
            bridge_timeout: Duration::from_millis(defaults.bridge_timeout_ms),
            retry_queue: Mutex::new(queued),
            forced_tier: Mutex::new(None),
            in_flight: Mutex::new(HashSet::new()),
            stats: Mutex::new(DispatchStats::default()),
            seq: AtomicU32::new(0),
        })
    }

    /// Apply timeouts and the fault-injection rate from config.
    pub fn with_config(mut self, config: &DispatchConfig) -> Self {
        self.fast_timeout = Duration::from_millis(config.fast_timeout_ms);
        self.bridge_timeout = Duration::from_millis(config.bridge_timeout_ms);
        self.fault = FaultInjector::new(config.fault_injection_rate);
        self
    }

    pub fn with_fast_executor(mut self, fast: Arc<dyn FastExecutor>) -> Self {
        self.fast = fast;
        self
    }

    pub fn with_bridge(mut self, bridge: Arc<dyn LastResortBridge>) -> Self {
        self.bridge = bridge;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_fault_injector(mut self, fault: FaultInjector) -> Self {
        self.fault = fault;
        self
    }

    pub fn pool(&self) -> &Arc<AccountPool> {
        &self.pool
    }

    /// Create a task and dispatch it.
    pub fn submit(
        &self,
        title: &str,
        domain_hint: Option<&str>,
        priority: Option<Priority>,
    ) -> Result<DispatchOutcome> {
        let now = self.clock.now();
        let id = TaskId::generate(now, self.seq.fetch_add(1, Ordering::Relaxed));
        let forced = lock(&self.forced_tier).take();

        let task = Task::new(id, title, domain_hint, priority, now)?
            .with_force_override(forced == Some(Tier::LastResort));
        self.store.add(&task)?;
        tracing::info!(task = %task.id, domain = %task.domain, forced = ?forced, "task submitted");
        self.audit.record(
            AuditEvent::new(AuditAction::Submit, now)
                .with_task(task.id.as_str())
                .with_details(json!({
                    "title": task.title,
                    "domain": task.domain,
                    "priority": task.priority,
                    "forced_tier": forced.map(|t| t.number()),
                })),
        );

        let start = match forced {
            Some(Tier::Fast) => Tier::Fast,
            _ => Tier::Pool,
        };
        self.dispatch_from(&task.id, start)
    }

    /// Route the next submitted task to `tier` instead of the normal cascade.
    ///
    /// `Fast` skips the pool; `LastResort` sets `force_override`, which hands
    /// the task straight to the bridge. `Pool` clears any pending override.
    pub fn force_next_task_to(&self, tier: Tier) {
        *lock(&self.forced_tier) = match tier {
            Tier::Pool => None,
            other => Some(other),
        };
        tracing::info!(%tier, "next task forced");
    }

    /// Dispatch a stored `pending` task through the cascade from tier 1.
    pub fn dispatch(&self, id: &TaskId) -> Result<DispatchOutcome> {
        self.dispatch_from(id, Tier::Pool)
    }

    fn dispatch_from(&self, id: &TaskId, start: Tier) -> Result<DispatchOutcome> {
        let Some(_guard) = self.claim(id) else {
            return Ok(DispatchOutcome::AlreadyInProgress {
                task: id.clone(),
                status: TaskStatus::Running,
            });
        };

        let task = self.load(id)?;
        match task.status {
            TaskStatus::Pending => {}
            TaskStatus::Running | TaskStatus::PendingApproval => {
                tracing::debug!(task = %id, status = %task.status, "dispatch skipped");
                return Ok(DispatchOutcome::AlreadyInProgress {
                    task: id.clone(),
                    status: task.status,
                });
            }
            TaskStatus::Completed | TaskStatus::Failed => {
                return Err(invalid(&task, "dispatch"));
            }
        }

        let outcome = self.cascade(task, start)?;
        self.notifier.notify(&outcome.to_string());
        Ok(outcome)
    }

    fn cascade(&self, task: Task, start: Tier) -> Result<DispatchOutcome> {
        if task.force_override {
            tracing::info!(task = %task.id, "force override; delegating to last resort");
            return self.delegate(task);
        }

        let mut reasons: Vec<String> = Vec::new();

        if start == Tier::Pool {
            match self.try_pool(&task)? {
                Ok(slot) => return self.assigned(&task, slot),
                Err(reason) => reasons.push(format!("pool: {}", reason)),
            }
        }

        match self.try_fast(&task)? {
            Ok(outcome) => return Ok(outcome),
            Err(reason) => reasons.push(format!("fast: {}", reason)),
        }

        self.escalate(&task, &reasons)
    }

    /// Tier 1. The inner `Err` is the reason the pool could not take the task.
    fn try_pool(&self, task: &Task) -> Result<std::result::Result<Slot, String>> {
        if self.fault.should_fail() {
            lock(&self.stats).synthetic_faults += 1;
            tracing::warn!(task = %task.id, "injected fault: treating pool as unavailable");
            return Ok(Err("injected fault".to_string()));
        }
        Ok(match self.pool.acquire(task)? {
            AcquireOutcome::Acquired(slot) => Ok(slot),
            AcquireOutcome::NoCapacity(reason) => Err(reason.to_string()),
        })
    }

    fn assigned(&self, task: &Task, slot: Slot) -> Result<DispatchOutcome> {
        let now = self.clock.now();
        let stored = self.store.update(&task.id, &mut |t| {
            // Another process may have placed it since we loaded it.
            if t.status != TaskStatus::Pending {
                return Err(invalid(t, "assign"));
            }
            t.status = TaskStatus::Running;
            t.tier = Some(Tier::Pool);
            t.account_id = Some(slot.account_id.clone());
            t.updated_at = Some(now);
            Ok(())
        });
        if let Err(e) = stored {
            // Do not leak the slot if the task record cannot follow.
            let _ = self.pool.release(&slot.account_id, &slot.task_ref);
            return Err(e);
        }

        lock(&self.stats).pool.assigned += 1;
        self.audit.record(
            AuditEvent::new(AuditAction::Assign, now)
                .with_task(task.id.as_str())
                .with_details(json!({ "account": slot.account_id })),
        );
        Ok(DispatchOutcome::Assigned {
            task: task.id.clone(),
            account_id: slot.account_id,
        })
    }

    /// Tier 2. The inner `Err` is the reason to keep cascading.
    fn try_fast(&self, task: &Task) -> Result<std::result::Result<DispatchOutcome, String>> {
        if !self.fast.has_credits() {
            tracing::info!(task = %task.id, "fast executor has no credits");
            return Ok(Err("credits exhausted".to_string()));
        }

        self.set_running(&task.id, Tier::Fast)?;
        lock(&self.stats).fast.assigned += 1;

        let fast = Arc::clone(&self.fast);
        let job = task.clone();
        let timeout = self.fast_timeout;
        let result = tiers::run_bounded(Tier::Fast, timeout, move || fast.execute(&job, timeout));

        match result {
            Ok(output) => {
                let done = self
                    .store
                    .update_status(&task.id, TaskStatus::Completed, Some(&output))?;
                lock(&self.stats).fast.completed += 1;
                self.audit.record(
                    AuditEvent::new(AuditAction::Execute, self.clock.now())
                        .with_task(task.id.as_str())
                        .with_details(json!({ "outcome": "completed" })),
                );
                Ok(Ok(DispatchOutcome::Completed {
                    task: done.id,
                    tier: Tier::Fast,
                    result: output,
                }))
            }
            Err(e) => {
                self.set_pending(&task.id)?;
                match &e {
                    TierwatchError::ExecutorCreditsExhausted(msg) => {
                        tracing::info!(task = %task.id, reason = %msg, "fast executor out of credits");
                    }
                    other => {
                        lock(&self.stats).fast.failed += 1;
                        tracing::warn!(task = %task.id, error = %other, "fast executor failed");
                    }
                }
                self.audit.record(
                    AuditEvent::new(AuditAction::Execute, self.clock.now())
                        .with_task(task.id.as_str())
                        .with_details(json!({ "outcome": e.as_label(), "error": e.to_string() })),
                );
                Ok(Err(e.to_string()))
            }
        }
    }

    /// Tier 3 entry: park the task for a human decision.
    fn escalate(&self, task: &Task, reasons: &[String]) -> Result<DispatchOutcome> {
        let now = self.clock.now();
        let summary = reasons.join("; ");
        self.store.update(&task.id, &mut |t| {
            if t.status.is_terminal() {
                return Err(invalid(t, "escalate"));
            }
            t.status = TaskStatus::PendingApproval;
            t.tier = Some(Tier::LastResort);
            t.account_id = None;
            t.result = Some(format!("escalated: {}", summary));
            t.updated_at = Some(now);
            Ok(())
        })?;

        lock(&self.stats).escalated += 1;
        tracing::info!(task = %task.id, reasons = %summary, "task pending approval");
        self.audit.record(
            AuditEvent::new(AuditAction::Escalate, now)
                .with_task(task.id.as_str())
                .with_details(json!({ "reasons": reasons })),
        );
        Ok(DispatchOutcome::PendingApproval {
            task: task.id.clone(),
        })
    }

    /// Approve a pending task and hand it to the bridge.
    pub fn approve(&self, id: &TaskId) -> Result<DispatchOutcome> {
        let Some(_guard) = self.claim(id) else {
            return Ok(DispatchOutcome::AlreadyInProgress {
                task: id.clone(),
                status: TaskStatus::Running,
            });
        };
        let task = self.load(id)?;
        if task.status != TaskStatus::PendingApproval {
            return Err(invalid(&task, "approve"));
        }

        self.audit.record(
            AuditEvent::new(AuditAction::Approve, self.clock.now()).with_task(id.as_str()),
        );
        let outcome = self.delegate(task)?;
        self.notifier.notify(&outcome.to_string());
        Ok(outcome)
    }

    /// Reject a pending task: it re-enters the cascade at tier 1.
    pub fn reject(&self, id: &TaskId) -> Result<DispatchOutcome> {
        {
            let Some(_guard) = self.claim(id) else {
                return Ok(DispatchOutcome::AlreadyInProgress {
                    task: id.clone(),
                    status: TaskStatus::Running,
                });
            };
            let task = self.load(id)?;
            if task.status != TaskStatus::PendingApproval {
                return Err(invalid(&task, "reject"));
            }

            let now = self.clock.now();
            self.store.update(id, &mut |t| {
                t.status = TaskStatus::Pending;
                t.tier = None;
                t.force_override = false;
                t.updated_at = Some(now);
                Ok(())
            })?;
            tracing::info!(task = %id, "task rejected; re-entering cascade");
            self.audit
                .record(AuditEvent::new(AuditAction::Reject, now).with_task(id.as_str()));
        }
        self.dispatch(id)
    }

    /// Send a task to the bridge. Failure requeues instead of dropping it.
    fn delegate(&self, task: Task) -> Result<DispatchOutcome> {
        self.set_running(&task.id, Tier::LastResort)?;
        lock(&self.stats).last_resort.assigned += 1;
        self.pool.record_last_resort_delegation()?;

        let bridge = Arc::clone(&self.bridge);
        let job = task.clone();
        let timeout = self.bridge_timeout;
        let result =
            tiers::run_bounded(Tier::LastResort, timeout, move || bridge.delegate(&job, timeout));

        match result {
            Ok(output) => {
                self.store
                    .update_status(&task.id, TaskStatus::Completed, Some(&output))?;
                lock(&self.stats).last_resort.completed += 1;
                self.audit.record(
                    AuditEvent::new(AuditAction::Delegate, self.clock.now())
                        .with_task(task.id.as_str())
                        .with_details(json!({ "outcome": "completed" })),
                );
                Ok(DispatchOutcome::Completed {
                    task: task.id,
                    tier: Tier::LastResort,
                    result: output,
                })
            }
            Err(e) => {
                lock(&self.stats).last_resort.failed += 1;
                tracing::warn!(task = %task.id, error = %e, "bridge failed; requeueing");
                self.requeue(&task.id, &e)?;
                Ok(DispatchOutcome::Requeued {
                    task: task.id,
                    reason: e.to_string(),
                })
            }
        }
    }

    fn requeue(&self, id: &TaskId, cause: &TierwatchError) -> Result<()> {
        let now = self.clock.now();
        self.store.update(id, &mut |t| {
            if t.status.is_terminal() {
                return Err(invalid(t, "requeue"));
            }
            t.status = TaskStatus::Pending;
            t.tier = None;
            t.account_id = None;
            t.result = Some(format!("requeued: {}", cause));
            t.updated_at = Some(now);
            Ok(())
        })?;

        {
            let mut queue = lock(&self.retry_queue);
            if !queue.contains(id) {
                queue.push_back(id.clone());
            }
        }
        lock(&self.stats).requeued += 1;
        self.audit.record(
            AuditEvent::new(AuditAction::Requeue, now)
                .with_task(id.as_str())
                .with_details(json!({ "error": cause.to_string(), "kind": cause.as_label() })),
        );
        Ok(())
    }

    /// Report that a tier-1 task finished. Releases its slot and drains the
    /// retry queue, since capacity just came back.
    pub fn complete(&self, id: &TaskId, outcome: TaskOutcome) -> Result<Task> {
        let task = self.load(id)?;
        if task.status != TaskStatus::Running {
            return Err(invalid(&task, "complete"));
        }

        if let Some(account_id) = &task.account_id {
            self.pool.release(account_id, id)?;
        }

        let now = self.clock.now();
        let (status, result) = match &outcome {
            TaskOutcome::Succeeded(result) => (TaskStatus::Completed, result.clone()),
            TaskOutcome::Failed(reason) => (TaskStatus::Failed, Some(reason.clone())),
        };
        // Another process may have finished it since we loaded it.
        let done = self.store.update(id, &mut |t| {
            if t.status != TaskStatus::Running {
                return Err(invalid(t, "complete"));
            }
            t.status = status;
            if let Some(result) = &result {
                t.result = Some(result.clone());
            }
            t.updated_at = Some(now);
            Ok(())
        })?;

        {
            let mut stats = lock(&self.stats);
            let counters = stats.tier_mut(task.tier.unwrap_or(Tier::Pool));
            match status {
                TaskStatus::Completed => counters.completed += 1,
                _ => counters.failed += 1,
            }
        }
        tracing::info!(task = %id, %status, "task finished");
        self.audit.record(
            AuditEvent::new(AuditAction::Complete, now)
                .with_task(id.as_str())
                .with_details(json!({ "status": status, "account": task.account_id })),
        );
        self.notifier
            .notify(&format!("Task {} finished: {}", id, status));

        self.drain()?;
        Ok(done)
    }

    /// Move queued tasks onto the pool until it runs out of capacity.
    pub fn drain(&self) -> Result<DrainReport> {
        let mut report = DrainReport::default();

        loop {
            let Some(id) = lock(&self.retry_queue).pop_front() else {
                break;
            };
            let Some(_guard) = self.claim(&id) else {
                continue;
            };

            let task = match self.store.get(&id)? {
                Some(t) if t.status == TaskStatus::Pending => t,
                _ => continue,
            };

            match self.try_pool(&task)? {
                Ok(slot) => {
                    let account = slot.account_id.clone();
                    match self.assigned(&task, slot) {
                        Ok(_) => report.placed.push((id, account)),
                        Err(TierwatchError::InvalidTransition { status, .. }) => {
                            tracing::debug!(task = %id, %status, "drain skipped; placed elsewhere");
                        }
                        Err(e) => return Err(e),
                    }
                }
                Err(reason) => {
                    tracing::debug!(task = %id, %reason, "drain stopped; no capacity");
                    lock(&self.retry_queue).push_front(id);
                    break;
                }
            }
        }

        report.remaining = lock(&self.retry_queue).len();
        if !report.placed.is_empty() {
            self.audit.record(
                AuditEvent::new(AuditAction::Drain, self.clock.now()).with_details(json!({
                    "placed": report.placed.iter().map(|(t, a)| json!({"task": t, "account": a})).collect::<Vec<_>>(),
                    "remaining": report.remaining,
                })),
            );
            self.notifier.notify(&format!(
                "Retry queue drained: {} placed, {} waiting",
                report.placed.len(),
                report.remaining
            ));
        }
        Ok(report)
    }

    /// Tasks waiting for an operator decision.
    pub fn pending_approvals(&self) -> Result<Vec<Task>> {
        Ok(self
            .store
            .get_pending()?
            .into_iter()
            .filter(|t| t.status == TaskStatus::PendingApproval)
            .collect())
    }

    /// Ids on the retry queue, front first.
    pub fn retry_queue(&self) -> Vec<TaskId> {
        lock(&self.retry_queue).iter().cloned().collect()
    }

    pub fn stats(&self) -> DispatchStats {
        lock(&self.stats).clone()
    }

    fn claim(&self, id: &TaskId) -> Option<InFlight<'_>> {
        if !lock(&self.in_flight).insert(id.clone()) {
            return None;
        }
        Some(InFlight {
            set: &self.in_flight,
            id: id.clone(),
        })
    }

    fn load(&self, id: &TaskId) -> Result<Task> {
        self.store
            .get(id)?
            .ok_or_else(|| TierwatchError::TaskNotFound(id.to_string()))
    }

    fn set_running(&self, id: &TaskId, tier: Tier) -> Result<()> {
        let now = self.clock.now();
        self.store.update(id, &mut |t| {
            if t.status == TaskStatus::Running || t.status.is_terminal() {
                return Err(invalid(t, "run"));
            }
            t.status = TaskStatus::Running;
            t.tier = Some(tier);
            t.updated_at = Some(now);
            Ok(())
        })?;
        Ok(())
    }

    fn set_pending(&self, id: &TaskId) -> Result<()> {
        let now = self.clock.now();
        self.store.update(id, &mut |t| {
            if t.status.is_terminal() {
                return Err(invalid(t, "reset"));
            }
            t.status = TaskStatus::Pending;
            t.tier = None;
            t.updated_at = Some(now);
            Ok(())
        })?;
        Ok(())
    }
}

fn invalid(task: &Task, action: &str) -> TierwatchError {
    TierwatchError::InvalidTransition {
        id: task.id.to_string(),
        status: task.status.to_string(),
        action: action.to_string(),
    }
}
