//! Supervisory watchdog for a long-running agent process.
//!
//! The watchdog is fed the agent's output line by line and ticked
//! periodically. It tracks one [`WatchdogState`]:
//!
//! ```text
//! ACTIVE     --loop pattern found-------------> LOOPING
//! ACTIVE     --silent for stall_timeout-------> STALLED
//! LOOPING    --pattern breaks-----------------> ACTIVE
//! LOOPING    --loop lasts kill_timeout--------> RECOVERING (kill and restart)
//! STALLED    --output resumes-----------------> ACTIVE
//! STALLED    --auto-continue retries spent----> RECOVERING (kill and restart)
//! any        --liveness probe fails-----------> CRASHED -> RECOVERING
//! RECOVERING --relaunch verified--------------> ACTIVE
//! RECOVERING --every relaunch failed----------> CRASHED (needs intervention)
//! any        --pause--------------------------> PAUSED
//! PAUSED     --resume-------------------------> ACTIVE
//! ```
//!
//! Supervisor commands (probe, kill, relaunch, nudge) run without holding the
//! state lock, so `status()` stays responsive during a recovery. Every
//! transition and intervention is written to a bounded history and published
//! on the event bus.

mod detect;
mod history;
mod state;
mod supervisor;


pub use detect::{LoopReport, OutputSample, hash_message, normalize};
pub use history::{HistoryAction, HistoryEntry};
pub use state::{KillReason, WatchdogEvent, WatchdogState};
pub use supervisor::{CommandSupervisor, ProcessSupervisor};

use crate::bus::EventBus;
use crate::clock::{Clock, elapsed_ms, human_duration};
use crate::config::WatchdogConfig;
use crate::error::{Result, TierwatchError};
use crate::notify::{Notifier, NullNotifier};
use chrono::{DateTime, Utc};
use detect::{LoopRule, RingBuffer, detect_loop};
use history::History;
use serde::Serialize;
use serde_json::{Value, json};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Number of history entries included in [`WatchdogStatus`].
const RECENT_HISTORY: usize = 10;

/// Counters since the watchdog was built. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchdogStats {
    pub loops_detected: u64,
    pub stalls_detected: u64,
    pub crashes_detected: u64,
    pub auto_continues: u64,
    pub restarts: u64,
    pub total_interventions: u64,
    pub started_at: DateTime<Utc>,
}

/// Point-in-time view returned by [`Watchdog::status`].
#[derive(Debug, Clone, Serialize)]
pub struct WatchdogStatus {
    pub state: WatchdogState,
    pub running: bool,
    pub uptime: String,
    /// Time since the last output line, e.g. `"12s ago"`.
    pub last_output: String,
    pub buffer_len: usize,
    pub retry_count: u32,
    pub needs_intervention: bool,
    pub stats: WatchdogStats,
    pub recent_history: Vec<HistoryEntry>,
}

impl WatchdogStatus {
    pub fn message(&self) -> String {
        let mut lines = vec![
            format!(
                "Watchdog {}{} (up {}, last output {})",
                self.state,
                if self.running { "" } else { ", not running" },
                self.uptime,
                self.last_output
            ),
            format!(
                "  buffer {}  retries {}  loops {}  stalls {}  crashes {}  auto-continues {}",
                self.buffer_len,
                self.retry_count,
                self.stats.loops_detected,
                self.stats.stalls_detected,
                self.stats.crashes_detected,
                self.stats.auto_continues
            ),
        ];
        if self.needs_intervention {
            lines.push("  MANUAL INTERVENTION REQUIRED: relaunch failed; resume after fixing".to_string());
        }
        for entry in &self.recent_history {
            lines.push(format!(
                "  {} {:<18} [{}]",
                entry.timestamp.format("%H:%M:%S"),
                entry.action,
                entry.state
            ));
        }
        lines.join("\n")
    }
}

/// Work to do after the state lock is released.
enum Followup {
    None,
    Nudge { attempt: u32 },
    Kill,
}

struct Inner {
    state: WatchdogState,
    raw: RingBuffer<OutputSample>,
    hashes: RingBuffer<(String, DateTime<Utc>)>,
    last_output: DateTime<Utc>,
    loop_started: Option<DateTime<Utc>>,
    retry_count: u32,
    last_retry: Option<DateTime<Utc>>,
    needs_intervention: bool,
    stats: WatchdogStats,
    history: History,
    outbox: Vec<WatchdogEvent>,
}

impl Inner {
    fn set_state(&mut self, to: WatchdogState, now: DateTime<Utc>) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        tracing::info!(%from, %to, "watchdog state changed");
        self.record(
            HistoryAction::StateChanged,
            json!({ "from": from, "to": to }),
            now,
        );
        self.outbox
            .push(WatchdogEvent::StateChanged { from, to, at: now });
    }

    fn record(&mut self, action: HistoryAction, details: Value, now: DateTime<Utc>) {
        self.history.push(HistoryEntry {
            timestamp: now,
            action,
            state: self.state,
            details,
        });
    }

    fn reset_tracking(&mut self) {
        self.raw.clear();
        self.hashes.clear();
        self.loop_started = None;
        self.retry_count = 0;
        self.last_retry = None;
    }
}

/// The watchdog. Share it behind an `Arc`.
pub struct Watchdog {
    config: WatchdogConfig,
    rule: LoopRule,
    supervisor: Arc<dyn ProcessSupervisor>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    events: EventBus<WatchdogEvent>,
    inner: Mutex<Inner>,
    running: AtomicBool,
}

impl Watchdog {
    pub fn new(
        config: &WatchdogConfig,
        supervisor: Arc<dyn ProcessSupervisor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        let inner = Inner {
            state: WatchdogState::Active,
            raw: RingBuffer::new(config.buffer_size),
            hashes: RingBuffer::new(config.buffer_size),
            last_output: now,
            loop_started: None,
            retry_count: 0,
            last_retry: None,
            needs_intervention: false,
            stats: WatchdogStats {
                loops_detected: 0,
                stalls_detected: 0,
                crashes_detected: 0,
                auto_continues: 0,
                restarts: 0,
                total_interventions: 0,
                started_at: now,
            },
            history: History::new(config.history_cap, config.history_keep),
            outbox: Vec::new(),
        };
        Self {
            rule: LoopRule {
                window: chrono::Duration::milliseconds(config.loop_window_ms as i64),
                threshold: config.loop_threshold,
                similarity: config.similarity_threshold,
            },
            config: config.clone(),
            supervisor,
            clock,
            notifier: Arc::new(NullNotifier),
            events: EventBus::new(),
            inner: Mutex::new(inner),
            running: AtomicBool::new(false),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn events(&self) -> &EventBus<WatchdogEvent> {
        &self.events
    }

    pub fn state(&self) -> WatchdogState {
        self.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// Publish queued events. Must be called without holding the state lock.
    fn flush(&self, events: Vec<WatchdogEvent>) {
        for event in events {
            self.notifier.notify(&event.message());
            self.events.publish(&event);
        }
    }

    /// Record one line of agent output.
    ///
    /// Ignored while paused, recovering, or crashed. A loop that outlives
    /// `kill_timeout_ms` triggers kill-and-restart from inside this call.
    pub fn feed(&self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let now = self.clock.now();

        let (events, followup) = {
            let mut inner = self.lock();
            if inner.state.ignores_output() {
                return Ok(());
            }

            let sample = OutputSample::new(text, now);
            inner.hashes.push((sample.hash.clone(), now));
            inner.raw.push(sample);
            inner.last_output = now;

            if inner.state == WatchdogState::Stalled {
                inner.set_state(WatchdogState::Active, now);
                inner.retry_count = 0;
            }

            let report = detect_loop(&inner.hashes, &inner.raw, self.rule, now);
            let followup = match report {
                Some(report) if report.is_loop => self.on_loop(&mut inner, report, now),
                _ if inner.state == WatchdogState::Looping => {
                    inner.set_state(WatchdogState::Active, now);
                    inner.loop_started = None;
                    inner.retry_count = 0;
                    inner.record(HistoryAction::LoopCleared, json!({}), now);
                    tracing::info!("loop pattern broken; agent recovered");
                    Followup::None
                }
                _ => Followup::None,
            };
            (std::mem::take(&mut inner.outbox), followup)
        };

        self.flush(events);
        self.follow_up(followup)
    }

    fn on_loop(&self, inner: &mut Inner, report: LoopReport, now: DateTime<Utc>) -> Followup {
        if inner.state == WatchdogState::Looping {
            let started = inner.loop_started.unwrap_or(now);
            if elapsed_ms(started, now) >= self.config.kill_timeout_ms {
                return self.begin_kill(inner, KillReason::LoopTimeout, now);
            }
            return Followup::None;
        }

        inner.set_state(WatchdogState::Looping, now);
        inner.loop_started = Some(now);
        inner.stats.loops_detected += 1;
        inner.stats.total_interventions += 1;
        inner.record(
            HistoryAction::LoopDetected,
            json!({
                "repeat_count": report.repeat_count,
                "dominance_pct": report.dominance_pct,
                "sample": report.sample,
            }),
            now,
        );
        tracing::warn!(
            repeats = report.repeat_count,
            dominance_pct = report.dominance_pct,
            "loop detected"
        );
        inner.outbox.push(WatchdogEvent::LoopDetected(report));
        Followup::None
    }

    /// Enter RECOVERING and clear every buffer and counter.
    fn begin_kill(&self, inner: &mut Inner, reason: KillReason, now: DateTime<Utc>) -> Followup {
        inner.set_state(WatchdogState::Recovering, now);
        inner.record(
            HistoryAction::KillAndRestart,
            json!({ "reason": reason }),
            now,
        );
        inner.outbox.push(WatchdogEvent::KillAndRestart { reason });
        inner.reset_tracking();
        tracing::warn!(%reason, "killing and restarting agent");
        Followup::Kill
    }

    fn follow_up(&self, followup: Followup) -> Result<()> {
        match followup {
            Followup::None => Ok(()),
            Followup::Nudge { attempt } => {
                if self.supervisor.nudge() {
                    self.flush(vec![WatchdogEvent::AutoContinueSent { attempt }]);
                } else {
                    tracing::warn!(attempt, "auto-continue nudge failed");
                }
                Ok(())
            }
            Followup::Kill => {
                if !self.supervisor.kill() {
                    tracing::warn!("kill command failed; relaunching anyway");
                }
                self.clock
                    .sleep(Duration::from_millis(self.config.kill_grace_ms));
                self.relaunch()
            }
        }
    }

    /// Try each relaunch command in order until the agent is alive again.
    fn relaunch(&self) -> Result<()> {
        let grace = Duration::from_millis(self.config.relaunch_grace_ms);

        for command in &self.config.relaunch_commands {
            if !self.supervisor.relaunch(command) {
                tracing::warn!(command = %command, "relaunch command failed");
                continue;
            }
            self.clock.sleep(grace);
            if !self.supervisor.is_alive() {
                tracing::warn!(command = %command, "agent not alive after relaunch");
                continue;
            }

            let events = {
                let mut inner = self.lock();
                let now = self.clock.now();
                // A pause issued mid-recovery wins over ACTIVE.
                if inner.state == WatchdogState::Recovering {
                    inner.set_state(WatchdogState::Active, now);
                }
                inner.reset_tracking();
                inner.last_output = now;
                inner.needs_intervention = false;
                inner.stats.restarts += 1;
                inner.record(
                    HistoryAction::ProcessRestarted,
                    json!({ "command": command }),
                    now,
                );
                inner.outbox.push(WatchdogEvent::ProcessRestarted {
                    command: command.clone(),
                });
                std::mem::take(&mut inner.outbox)
            };
            tracing::info!(command = %command, "agent restarted");
            self.flush(events);
            return Ok(());
        }

        let attempts = self.config.relaunch_commands.len();
        let events = {
            let mut inner = self.lock();
            let now = self.clock.now();
            if inner.state == WatchdogState::Recovering {
                inner.set_state(WatchdogState::Crashed, now);
            }
            inner.needs_intervention = true;
            inner.record(
                HistoryAction::RestartFailed,
                json!({ "attempts": attempts }),
                now,
            );
            inner.outbox.push(WatchdogEvent::RestartFailed { attempts });
            std::mem::take(&mut inner.outbox)
        };
        tracing::error!(attempts, "all relaunch attempts failed");
        self.flush(events);
        Err(TierwatchError::RestartFailed { attempts })
    }

    /// One supervision pass: stall check, liveness probe, loop timeout.
    ///
    /// Does nothing while paused, recovering, or waiting for an operator
    /// after a failed restart.
    pub fn tick(&self) -> Result<()> {
        let now = self.clock.now();
        let (events, followup) = {
            let mut inner = self.lock();
            if self.idle(&inner) {
                return Ok(());
            }
            let followup = self.check_stall(&mut inner, now);
            (std::mem::take(&mut inner.outbox), followup)
        };
        self.flush(events);
        let killed = matches!(followup, Followup::Kill);
        self.follow_up(followup)?;
        if killed {
            return Ok(());
        }

        if !self.supervisor.is_alive() {
            let events = {
                let mut inner = self.lock();
                if self.idle(&inner) {
                    return Ok(());
                }
                let now = self.clock.now();
                inner.set_state(WatchdogState::Crashed, now);
                inner.stats.crashes_detected += 1;
                inner.stats.total_interventions += 1;
                inner.record(HistoryAction::CrashDetected, json!({}), now);
                inner.outbox.push(WatchdogEvent::CrashDetected);
                inner.set_state(WatchdogState::Recovering, now);
                std::mem::take(&mut inner.outbox)
            };
            tracing::error!("agent process not found; starting recovery");
            self.flush(events);
            return self.relaunch();
        }

        let (events, followup) = {
            let mut inner = self.lock();
            let now = self.clock.now();
            let followup = match inner.loop_started {
                Some(started)
                    if inner.state == WatchdogState::Looping
                        && elapsed_ms(started, now) >= self.config.kill_timeout_ms =>
                {
                    self.begin_kill(&mut inner, KillReason::LoopTimeout, now)
                }
                _ => Followup::None,
            };
            (std::mem::take(&mut inner.outbox), followup)
        };
        self.flush(events);
        self.follow_up(followup)
    }

    fn idle(&self, inner: &Inner) -> bool {
        inner.needs_intervention
            || matches!(
                inner.state,
                WatchdogState::Paused | WatchdogState::Recovering
            )
    }

    fn check_stall(&self, inner: &mut Inner, now: DateTime<Utc>) -> Followup {
        let silent_for_ms = elapsed_ms(inner.last_output, now);
        match inner.state {
            WatchdogState::Active | WatchdogState::Looping
                if silent_for_ms >= self.config.stall_timeout_ms =>
            {
                inner.set_state(WatchdogState::Stalled, now);
                inner.stats.stalls_detected += 1;
                inner.stats.total_interventions += 1;
                inner.record(
                    HistoryAction::StallDetected,
                    json!({
                        "silent_for_ms": silent_for_ms,
                        "silent_for": human_duration(silent_for_ms),
                    }),
                    now,
                );
                inner
                    .outbox
                    .push(WatchdogEvent::StallDetected { silent_for_ms });
                tracing::warn!(silent_for = %human_duration(silent_for_ms), "agent stalled");
                self.auto_continue(inner, now)
            }
            WatchdogState::Stalled => self.auto_continue(inner, now),
            _ => Followup::None,
        }
    }

    /// Nudge a stalled agent, at most once per cooldown, until the retry cap.
    fn auto_continue(&self, inner: &mut Inner, now: DateTime<Utc>) -> Followup {
        if !self.config.auto_continue_enabled {
            return Followup::None;
        }
        if inner.retry_count >= self.config.max_auto_retries {
            tracing::warn!(
                max = self.config.max_auto_retries,
                "auto-continue retries exhausted"
            );
            return self.begin_kill(inner, KillReason::MaxRetriesExceeded, now);
        }
        if let Some(last) = inner.last_retry
            && elapsed_ms(last, now) < self.config.retry_cooldown_ms
        {
            return Followup::None;
        }

        inner.retry_count += 1;
        inner.last_retry = Some(now);
        inner.stats.auto_continues += 1;
        let attempt = inner.retry_count;
        inner.record(
            HistoryAction::AutoContinue,
            json!({ "attempt": attempt }),
            now,
        );
        tracing::info!(
            attempt,
            max = self.config.max_auto_retries,
            "sending auto-continue"
        );
        Followup::Nudge { attempt }
    }

    /// Stop reacting to output and ticks until [`Watchdog::resume`].
    pub fn pause(&self) {
        let events = {
            let mut inner = self.lock();
            if inner.state == WatchdogState::Paused {
                return;
            }
            let now = self.clock.now();
            inner.set_state(WatchdogState::Paused, now);
            inner.record(HistoryAction::Paused, json!({}), now);
            inner.outbox.push(WatchdogEvent::Paused);
            std::mem::take(&mut inner.outbox)
        };
        self.flush(events);
    }

    /// Return to ACTIVE with fresh counters. Also clears a pending
    /// manual-intervention flag.
    pub fn resume(&self) {
        let events = {
            let mut inner = self.lock();
            let now = self.clock.now();
            inner.set_state(WatchdogState::Active, now);
            inner.last_output = now;
            inner.loop_started = None;
            inner.retry_count = 0;
            inner.last_retry = None;
            inner.needs_intervention = false;
            inner.record(HistoryAction::Resumed, json!({}), now);
            inner.outbox.push(WatchdogEvent::Resumed);
            std::mem::take(&mut inner.outbox)
        };
        self.flush(events);
    }

    pub fn status(&self) -> WatchdogStatus {
        let inner = self.lock();
        let now = self.clock.now();
        WatchdogStatus {
            state: inner.state,
            running: self.is_running(),
            uptime: human_duration(elapsed_ms(inner.stats.started_at, now)),
            last_output: format!("{} ago", human_duration(elapsed_ms(inner.last_output, now))),
            buffer_len: inner.raw.len(),
            retry_count: inner.retry_count,
            needs_intervention: inner.needs_intervention,
            stats: inner.stats.clone(),
            recent_history: inner.history.recent(RECENT_HISTORY),
        }
    }

    pub fn full_history(&self) -> Vec<HistoryEntry> {
        self.lock().history.all()
    }

    /// Spawn the periodic tick thread. The first tick runs immediately.
    pub fn start(self: &Arc<Self>) -> io::Result<WatchdogHandle> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "watchdog is already running",
            ));
        }
        {
            let mut inner = self.lock();
            let now = self.clock.now();
            inner.last_output = now;
            inner.record(
                HistoryAction::Started,
                json!({ "poll_interval_ms": self.config.poll_interval_ms }),
                now,
            );
        }
        tracing::info!(poll_interval_ms = self.config.poll_interval_ms, "watchdog started");

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let watchdog = Arc::clone(self);
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        let spawned = thread::Builder::new()
            .name("watchdog".to_string())
            .spawn(move || {
                loop {
                    if let Err(e) = watchdog.tick() {
                        tracing::error!(error = %e, "watchdog tick failed");
                    }
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        _ => break,
                    }
                }
            });

        match spawned {
            Ok(join) => Ok(WatchdogHandle {
                stop: Some(stop_tx),
                join: Some(join),
                watchdog: Arc::clone(self),
            }),
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    fn mark_stopped(&self) {
        self.running.store(false, Ordering::SeqCst);
        let mut inner = self.lock();
        let now = self.clock.now();
        inner.record(HistoryAction::Stopped, json!({}), now);
        tracing::info!("watchdog stopped");
    }
}

/// Running tick thread. Stops on [`WatchdogHandle::stop`] or drop.
pub struct WatchdogHandle {
    stop: Option<mpsc::Sender<()>>,
    join: Option<JoinHandle<()>>,
    watchdog: Arc<Watchdog>,
}

impl WatchdogHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the sender wakes the thread out of its interval wait.
        drop(self.stop.take());
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                tracing::error!("watchdog thread panicked");
            }
            self.watchdog.mark_stopped();
        }
    }
}

impl Drop for WatchdogHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
