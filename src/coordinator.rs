//! Owns the pool, dispatcher and watchdog and wires them together.
//!
//! - Watchdog recovery pauses the pool (when `pause_pool_during_recovery`
//!   is set); a verified restart or an operator resume lifts that pause.
//! - A `critical` thermal signal pauses the pool; leaving `critical` lifts it.
//! - Pause reasons are durable holds in the usage snapshot. The pool is
//!   resumed only once no hold remains, and every resume drains the retry
//!   queue.
//! - A maintenance thread applies the daily reset and drains the retry queue
//!   every `drain_interval_ms`.

use crate::audit::{AuditAction, AuditEvent, AuditLog};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::dispatch::{
    CommandExecutor, Dispatcher, DrainReport, FastExecutor, LastResortBridge, NoBridge,
    NoFastExecutor,
};
use crate::error::Result;
use crate::notify::{Notifier, StderrNotifier};
use crate::pool::{AccountPool, PoolEvent};
use crate::store::{FileStore, Store};
use crate::watchdog::{
    CommandSupervisor, ProcessSupervisor, Watchdog, WatchdogEvent, WatchdogHandle, WatchdogState,
};
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Host temperature signal delivered from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThermalLevel {
    Normal,
    Warning,
    Critical,
}

impl ThermalLevel {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" | "ok" => Some(Self::Normal),
            "warning" | "warn" => Some(Self::Warning),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for ThermalLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ThermalLevel::Normal => "normal",
            ThermalLevel::Warning => "warning",
            ThermalLevel::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Why the pool is being held paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    Thermal,
    Recovery,
    Operator,
}

impl PauseReason {
    /// Name stored in the usage snapshot.
    fn key(self) -> &'static str {
        match self {
            PauseReason::Thermal => "thermal",
            PauseReason::Recovery => "recovery",
            PauseReason::Operator => "operator",
        }
    }
}

impl fmt::Display for PauseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PauseReason::Recovery => f.write_str("agent recovery"),
            other => f.write_str(other.key()),
        }
    }
}

/// Pause bookkeeping shared with the watchdog observer.
///
/// Holds live in the store, so a pause taken by one process can be lifted
/// by another.
struct PauseControl {
    pool: Arc<AccountPool>,
    dispatcher: Arc<Dispatcher>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    audit: AuditLog,
}

impl PauseControl {
    fn hold(&self, reason: PauseReason) -> Result<()> {
        if !self.pool.hold(reason.key())? {
            return Ok(());
        }
        tracing::warn!(%reason, "account pool paused");
        self.audit.record(
            AuditEvent::new(AuditAction::PoolPause, self.clock.now())
                .with_details(json!({ "reason": reason.key() })),
        );
        self.notifier
            .notify(&format!("Account pool paused ({})", reason));
        Ok(())
    }

    /// Drop one pause reason; drain once the pool is running again.
    fn release(&self, reason: PauseReason) -> Result<Option<DrainReport>> {
        if !self.pool.release_hold(reason.key())? {
            let remaining = self.pool.holds();
            if !remaining.is_empty() {
                tracing::info!(%reason, ?remaining, "pool still held");
            }
            return Ok(None);
        }
        self.resumed(&reason.to_string()).map(Some)
    }

    /// Clear every hold and resume.
    fn force_resume(&self) -> Result<DrainReport> {
        self.pool.resume_all()?;
        self.resumed("operator")
    }

    fn resumed(&self, cause: &str) -> Result<DrainReport> {
        tracing::info!(cause, "account pool resumed");
        self.audit.record(
            AuditEvent::new(AuditAction::PoolResume, self.clock.now())
                .with_details(json!({ "cause": cause })),
        );
        self.notifier
            .notify(&format!("Account pool resumed ({})", cause));
        self.dispatcher.drain()
    }
}

/// Tier 2/3 and supervision collaborators handed to [`Coordinator::new`].
pub struct Collaborators {
    pub fast: Arc<dyn FastExecutor>,
    pub bridge: Arc<dyn LastResortBridge>,
    pub supervisor: Arc<dyn ProcessSupervisor>,
    pub notifier: Arc<dyn Notifier>,
    /// Directory for `events.ndjson`; `None` disables the audit trail.
    pub audit_dir: Option<PathBuf>,
}

impl Collaborators {
    /// Command-backed collaborators described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let fast: Arc<dyn FastExecutor> = match &config.dispatch.fast_command {
            Some(cmd) => Arc::new(CommandExecutor::new(cmd)?),
            None => Arc::new(NoFastExecutor),
        };
        let bridge: Arc<dyn LastResortBridge> = match &config.dispatch.bridge_command {
            Some(cmd) => Arc::new(CommandExecutor::new(cmd)?),
            None => Arc::new(NoBridge),
        };
        Ok(Self {
            fast,
            bridge,
            supervisor: Arc::new(CommandSupervisor::from_config(&config.supervisor)?),
            notifier: Arc::new(StderrNotifier),
            audit_dir: Some(config.state_dir.clone()),
        })
    }
}

/// The assembled system. One per process; no global state.
pub struct Coordinator {
    config: Config,
    store: Arc<dyn Store>,
    pool: Arc<AccountPool>,
    dispatcher: Arc<Dispatcher>,
    watchdog: Arc<Watchdog>,
    control: Arc<PauseControl>,
    notifier: Arc<dyn Notifier>,
}

impl Coordinator {
    /// Production wiring: file store under `state_dir`, system clock,
    /// command collaborators, stderr notifications, and the audit trail.
    pub fn open(config: Config) -> Result<Self> {
        let store: Arc<dyn Store> = Arc::new(FileStore::open(&config.state_dir)?);
        let collaborators = Collaborators::from_config(&config)?;
        Self::new(config, store, Arc::new(SystemClock), collaborators)
    }

    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        collaborators: Collaborators,
    ) -> Result<Self> {
        config.validate()?;
        let Collaborators {
            fast,
            bridge,
            supervisor,
            notifier,
            audit_dir,
        } = collaborators;
        let audit = || match &audit_dir {
            Some(dir) => AuditLog::in_dir(dir),
            None => AuditLog::disabled(),
        };

        let pool = Arc::new(AccountPool::new(
            &config.pool,
            Arc::clone(&store),
            Arc::clone(&clock),
        )?);
        let dispatcher = Arc::new(
            Dispatcher::new(Arc::clone(&pool), Arc::clone(&store), Arc::clone(&clock))?
                .with_config(&config.dispatch)
                .with_fast_executor(fast)
                .with_bridge(bridge)
                .with_notifier(Arc::clone(&notifier))
                .with_audit(audit()),
        );
        let watchdog = Arc::new(
            Watchdog::new(&config.watchdog, supervisor, Arc::clone(&clock))
                .with_notifier(Arc::clone(&notifier)),
        );
        let control = Arc::new(PauseControl {
            pool: Arc::clone(&pool),
            dispatcher: Arc::clone(&dispatcher),
            clock,
            notifier: Arc::clone(&notifier),
            audit: audit(),
        });

        let coordinator = Self {
            config,
            store,
            pool,
            dispatcher,
            watchdog,
            control,
            notifier,
        };
        coordinator.wire();
        Ok(coordinator)
    }

    fn wire(&self) {
        let control = Arc::clone(&self.control);
        let pause_on_recovery = self.config.watchdog.pause_pool_during_recovery;
        self.watchdog
            .events()
            .subscribe(Arc::new(move |event: &WatchdogEvent| {
                let outcome = match event {
                    WatchdogEvent::StateChanged {
                        to: WatchdogState::Recovering,
                        ..
                    } if pause_on_recovery => control.hold(PauseReason::Recovery),
                    WatchdogEvent::ProcessRestarted { .. } | WatchdogEvent::Resumed => {
                        control.release(PauseReason::Recovery).map(|_| ())
                    }
                    _ => Ok(()),
                };
                if let Err(e) = outcome {
                    tracing::error!(error = %e, "failed to apply watchdog event to pool");
                }
            }));

        let notifier = Arc::clone(&self.notifier);
        self.pool
            .events()
            .subscribe(Arc::new(move |event: &PoolEvent| match event {
                PoolEvent::DailyReset { date_key } => {
                    notifier.notify(&format!("Daily quotas reset for {}", date_key))
                }
                PoolEvent::Paused {
                    account_id: Some(id),
                } => notifier.notify(&format!("Account {} paused", id)),
                PoolEvent::Resumed {
                    account_id: Some(id),
                } => notifier.notify(&format!("Account {} resumed", id)),
                _ => {}
            }));
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn pool(&self) -> &Arc<AccountPool> {
        &self.pool
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn watchdog(&self) -> &Arc<Watchdog> {
        &self.watchdog
    }

    /// React to a thermal signal.
    pub fn on_thermal(&self, level: ThermalLevel) -> Result<()> {
        tracing::info!(%level, "thermal signal");
        match level {
            ThermalLevel::Critical => self.control.hold(PauseReason::Thermal),
            ThermalLevel::Warning => {
                self.notifier
                    .notify("Thermal warning: pool keeps running; watch the temperature");
                self.control.release(PauseReason::Thermal).map(|_| ())
            }
            ThermalLevel::Normal => self.control.release(PauseReason::Thermal).map(|_| ()),
        }
    }

    /// Operator pause of the whole pool. Only [`Coordinator::resume_pool`]
    /// lifts it.
    pub fn pause_pool(&self) -> Result<()> {
        self.control.hold(PauseReason::Operator)
    }

    /// Operator resume: clears every pause reason and drains the retry queue.
    pub fn resume_pool(&self) -> Result<DrainReport> {
        self.control.force_resume()
    }

    /// Daily reset check plus a retry-queue drain.
    pub fn maintenance_tick(&self) -> Result<DrainReport> {
        if self.pool.check_daily_reset()? {
            tracing::info!("daily quotas reset");
        }
        self.dispatcher.drain()
    }

    /// Start the watchdog tick thread and the maintenance thread.
    pub fn start(self: &Arc<Self>) -> io::Result<CoordinatorHandle> {
        let watchdog = self.watchdog.start()?;

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let coordinator = Arc::clone(self);
        let interval = Duration::from_millis(self.config.dispatch.drain_interval_ms);
        let maintenance = thread::Builder::new()
            .name("maintenance".to_string())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        _ => break,
                    }
                    if let Err(e) = coordinator.maintenance_tick() {
                        tracing::error!(error = %e, "maintenance tick failed");
                    }
                }
            })?;

        Ok(CoordinatorHandle {
            watchdog: Some(watchdog),
            stop: Some(stop_tx),
            maintenance: Some(maintenance),
        })
    }
}

/// Background threads of a running coordinator. Stops on drop.
pub struct CoordinatorHandle {
    watchdog: Option<WatchdogHandle>,
    stop: Option<mpsc::Sender<()>>,
    maintenance: Option<JoinHandle<()>>,
}

impl CoordinatorHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        drop(self.stop.take());
        if let Some(join) = self.maintenance.take()
            && join.join().is_err()
        {
            tracing::error!("maintenance thread panicked");
        }
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.stop();
        }
    }
}

impl Drop for CoordinatorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
