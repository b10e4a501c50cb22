//! Shared fakes for unit tests: a manual clock and scripted collaborators.

use crate::clock::Clock;
use crate::dispatch::{FastExecutor, LastResortBridge};
use crate::error::{Result, TierwatchError};
use crate::notify::Notifier;
use crate::task::Task;
use crate::watchdog::ProcessSupervisor;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poison| poison.into_inner())
}

/// Clock that only moves when told to. `sleep` advances it instantly.
pub(crate) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(crate) fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// 2026-03-01 09:00:00 UTC.
    pub(crate) fn morning() -> Self {
        Self::new(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap())
    }

    pub(crate) fn advance_ms(&self, ms: u64) {
        *lock(&self.now) += Duration::milliseconds(ms as i64);
    }

    pub(crate) fn set(&self, at: DateTime<Utc>) {
        *lock(&self.now) = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }

    fn sleep(&self, duration: std::time::Duration) {
        self.advance_ms(duration.as_millis() as u64);
    }
}

/// Process supervisor whose answers are scripted.
///
/// Relaunch results are consumed in order; once the script runs out every
/// relaunch succeeds. A successful relaunch makes the process alive again.
pub(crate) struct ScriptedSupervisor {
    alive: AtomicBool,
    relaunch_results: Mutex<VecDeque<bool>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSupervisor {
    pub(crate) fn new() -> Self {
        Self {
            alive: AtomicBool::new(true),
            relaunch_results: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_relaunch_results(self, results: &[bool]) -> Self {
        *lock(&self.relaunch_results) = results.iter().copied().collect();
        self
    }

    pub(crate) fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    /// Every call except liveness probes, in order.
    pub(crate) fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

impl ProcessSupervisor for ScriptedSupervisor {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn relaunch(&self, command: &str) -> bool {
        lock(&self.calls).push(format!("relaunch:{}", command));
        let ok = lock(&self.relaunch_results).pop_front().unwrap_or(true);
        if ok {
            self.set_alive(true);
        }
        ok
    }

    fn kill(&self) -> bool {
        lock(&self.calls).push("kill".to_string());
        self.set_alive(false);
        true
    }

    fn nudge(&self) -> bool {
        lock(&self.calls).push("nudge".to_string());
        true
    }
}

/// Tier-2 executor with scripted credits and results.
pub(crate) struct ScriptedExecutor {
    credits: AtomicBool,
    results: Mutex<VecDeque<Result<String>>>,
    delay: Option<std::time::Duration>,
    calls: AtomicUsize,
}

impl ScriptedExecutor {
    pub(crate) fn new() -> Self {
        Self {
            credits: AtomicBool::new(true),
            results: Mutex::new(VecDeque::new()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn without_credits() -> Self {
        let executor = Self::new();
        executor.set_credits(false);
        executor
    }

    pub(crate) fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn set_credits(&self, credits: bool) {
        self.credits.store(credits, Ordering::SeqCst);
    }

    pub(crate) fn push_result(&self, result: Result<String>) {
        lock(&self.results).push_back(result);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FastExecutor for ScriptedExecutor {
    fn has_credits(&self) -> bool {
        self.credits.load(Ordering::SeqCst)
    }

    fn execute(&self, task: &Task, _timeout: std::time::Duration) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        lock(&self.results)
            .pop_front()
            .unwrap_or_else(|| Ok(format!("fast: {}", task.title)))
    }
}

/// Tier-3 bridge with scripted results. Defaults to success.
pub(crate) struct ScriptedBridge {
    results: Mutex<VecDeque<Result<String>>>,
    delegated: Mutex<Vec<String>>,
}

impl ScriptedBridge {
    pub(crate) fn new() -> Self {
        Self {
            results: Mutex::new(VecDeque::new()),
            delegated: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn unreachable_once(self) -> Self {
        self.push_result(Err(TierwatchError::BridgeUnavailable(
            "gateway unreachable".to_string(),
        )));
        self
    }

    pub(crate) fn push_result(&self, result: Result<String>) {
        lock(&self.results).push_back(result);
    }

    /// Ids of tasks the bridge was asked to run.
    pub(crate) fn delegated(&self) -> Vec<String> {
        lock(&self.delegated).clone()
    }
}

impl LastResortBridge for ScriptedBridge {
    fn delegate(&self, task: &Task, _timeout: std::time::Duration) -> Result<String> {
        lock(&self.delegated).push(task.id.to_string());
        lock(&self.results)
            .pop_front()
            .unwrap_or_else(|| Ok(format!("bridge: {}", task.title)))
    }
}

/// Notifier that keeps every message.
#[derive(Default)]
pub(crate) struct MemoryNotifier {
    messages: Mutex<Vec<String>>,
}

impl MemoryNotifier {
    pub(crate) fn messages(&self) -> Vec<String> {
        lock(&self.messages).clone()
    }

    pub(crate) fn any_contains(&self, needle: &str) -> bool {
        lock(&self.messages).iter().any(|m| m.contains(needle))
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, message: &str) {
        lock(&self.messages).push(message.to_string());
    }
}
