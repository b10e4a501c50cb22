//! Account pool: capacity-bounded allocation over a fixed set of accounts.
//!
//! Each account has a daily quota and a concurrency limit. `acquire` picks an
//! account (affinity first, then least utilized), reserves a [`Slot`] and
//! counts it against the quota; `release` gives the slot back without
//! refunding the quota.
//!
//! The store is the source of truth. Every mutation runs inside
//! [`Store::update_usage`], so the decision and the write are one atomic step
//! even when several processes share a state directory. Events are published
//! after the write completes and the pool lock is released.

mod account;
mod ranking;
mod reset;

#[cfg(test)]
mod tests;

pub use account::{AccountStatus, Slot};
pub use reset::date_key;

use crate::bus::EventBus;
use crate::clock::Clock;
use crate::config::{AccountConfig, PoolConfig, ResetBoundary};
use crate::error::{Result, TierwatchError};
use crate::store::{AccountUsage, Store, UsageSnapshot};
use crate::task::{Task, TaskId};
use account::{AccountView, Blocked};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Hold taken by an operator pausing the whole pool.
const OPERATOR_HOLD: &str = "operator";

static EMPTY_USAGE: AccountUsage = AccountUsage {
    daily_used: 0,
    paused: false,
    active_slots: Vec::new(),
};

/// Why no account could take a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionReason {
    /// Every account has spent its daily quota.
    DailyQuotaReached,
    /// Every account is at its concurrency limit.
    ConcurrencySaturated,
    /// Every account is paused.
    AllPaused,
    /// Accounts are blocked for different reasons.
    Mixed,
}

impl fmt::Display for ExhaustionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExhaustionReason::DailyQuotaReached => "daily quota reached",
            ExhaustionReason::ConcurrencySaturated => "concurrency saturated",
            ExhaustionReason::AllPaused => "all accounts paused",
            ExhaustionReason::Mixed => "no account has capacity",
        };
        f.write_str(s)
    }
}

/// Result of [`AccountPool::acquire`]. Running out of capacity is an expected
/// outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquireOutcome {
    Acquired(Slot),
    NoCapacity(ExhaustionReason),
}

/// Events published by the pool.
#[derive(Debug, Clone, PartialEq)]
pub enum PoolEvent {
    Acquired {
        account_id: String,
        task: TaskId,
        daily_used: u32,
        active: usize,
        /// The account was chosen for its domain affinity.
        affinity: bool,
    },
    Released {
        account_id: String,
        task: TaskId,
        active: usize,
    },
    Exhausted {
        reason: ExhaustionReason,
        task: TaskId,
    },
    DailyReset {
        date_key: String,
    },
    /// `None` means every account.
    Paused { account_id: Option<String> },
    Resumed { account_id: Option<String> },
}

/// Point-in-time view of the pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolStatus {
    pub date_key: String,
    pub total_used: u32,
    pub total_quota: u32,
    pub total_active: usize,
    pub last_resort_delegations: u32,
    pub pause_holds: Vec<String>,
    pub accounts: Vec<AccountStatus>,
}

impl PoolStatus {
    /// Multi-line summary for operators.
    pub fn message(&self) -> String {
        let pct = if self.total_quota == 0 {
            0
        } else {
            ((self.total_used as f64 / self.total_quota as f64) * 100.0).round() as u32
        };
        let filled = (pct / 10).min(10) as usize;
        let bar = format!("{}{}", "#".repeat(filled), ".".repeat(10 - filled));

        let mut lines = vec![
            format!("Account pool ({})", self.date_key),
            format!(
                "[{}] {}/{} tasks today ({}%)",
                bar, self.total_used, self.total_quota, pct
            ),
        ];
        for a in &self.accounts {
            let state = if a.paused {
                "paused"
            } else if a.daily_used >= a.daily_quota {
                "spent"
            } else {
                "open"
            };
            let domains: Vec<String> = a.domains.iter().map(|d| d.to_string()).collect();
            lines.push(format!(
                "  {:<8} {:<6} {:>4}/{:<4} active {}/{}  [{}]",
                a.id,
                state,
                a.daily_used,
                a.daily_quota,
                a.active,
                a.concurrency_limit,
                domains.join(",")
            ));
        }
        if !self.pause_holds.is_empty() {
            lines.push(format!("Held paused by: {}", self.pause_holds.join(", ")));
        }
        lines.push(format!(
            "Delegated to last resort today: {}",
            self.last_resort_delegations
        ));
        lines.join("\n")
    }
}

/// The account pool. One instance per process; share it behind an `Arc`.
pub struct AccountPool {
    accounts: Vec<AccountConfig>,
    boundary: ResetBoundary,
    offset_minutes: i32,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    cache: Mutex<UsageSnapshot>,
    events: EventBus<PoolEvent>,
}

impl AccountPool {
    /// Build the pool and load persisted usage.
    ///
    /// A day boundary crossed while the process was down is applied right
    /// away, so a restart never carries yesterday's counters forward and
    /// never grants a fresh quota within the same day.
    pub fn new(config: &PoolConfig, store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Result<Self> {
        if config.accounts.is_empty() {
            return Err(TierwatchError::Config(
                "account pool needs at least one account".to_string(),
            ));
        }
        let pool = Self {
            accounts: config.accounts.clone(),
            boundary: config.reset_boundary,
            offset_minutes: config.reset_offset_minutes,
            store,
            clock,
            cache: Mutex::new(UsageSnapshot::default()),
            events: EventBus::new(),
        };
        pool.mutate(|_, _| ())?;
        Ok(pool)
    }

    pub fn events(&self) -> &EventBus<PoolEvent> {
        &self.events
    }

    pub fn accounts(&self) -> &[AccountConfig] {
        &self.accounts
    }

    /// Reserve a slot for `task` on the best available account.
    pub fn acquire(&self, task: &Task) -> Result<AcquireOutcome> {
        let now = self.clock.now();
        let outcome = self.mutate(|usage, events| {
            let views = self.views(usage);
            let Some(&idx) = ranking::rank(&views, task.domain).first() else {
                let reason = exhaustion_reason(&views);
                events.push(PoolEvent::Exhausted {
                    reason,
                    task: task.id.clone(),
                });
                return AcquireOutcome::NoCapacity(reason);
            };
            let affinity = views[idx].serves(task.domain);

            let account_id = self.accounts[idx].id.clone();
            let account = usage.accounts.entry(account_id.clone()).or_default();
            let slot = Slot {
                account_id: account_id.clone(),
                task_ref: task.id.clone(),
                acquired_at: now,
            };
            account.daily_used += 1;
            account.active_slots.push(slot.clone());

            events.push(PoolEvent::Acquired {
                account_id,
                task: task.id.clone(),
                daily_used: account.daily_used,
                active: account.active_slots.len(),
                affinity,
            });
            AcquireOutcome::Acquired(slot)
        })?;

        match &outcome {
            AcquireOutcome::Acquired(slot) => {
                tracing::info!(account = %slot.account_id, task = %task.id, "slot acquired")
            }
            AcquireOutcome::NoCapacity(reason) => {
                tracing::info!(task = %task.id, %reason, "pool exhausted")
            }
        }
        Ok(outcome)
    }

    /// Give back the slot `task_ref` holds on `account_id`.
    ///
    /// Returns `false` without touching any counter when no such slot is held.
    /// The daily quota is never refunded.
    pub fn release(&self, account_id: &str, task_ref: &TaskId) -> Result<bool> {
        let released = self.mutate(|usage, events| {
            let Some(account) = usage.accounts.get_mut(account_id) else {
                return false;
            };
            let Some(pos) = account
                .active_slots
                .iter()
                .position(|s| &s.task_ref == task_ref)
            else {
                return false;
            };
            account.active_slots.remove(pos);
            events.push(PoolEvent::Released {
                account_id: account_id.to_string(),
                task: task_ref.clone(),
                active: account.active_slots.len(),
            });
            true
        })?;

        if released {
            tracing::debug!(account = account_id, task = %task_ref, "slot released");
        } else {
            tracing::debug!(account = account_id, task = %task_ref, "release ignored; slot not held");
        }
        Ok(released)
    }

    /// Pause the whole pool under the operator hold. Usage counters, slots
    /// and per-account pauses are untouched.
    pub fn pause_all(&self) -> Result<()> {
        self.mutate(|usage, events| {
            usage.pause_holds.insert(OPERATOR_HOLD.to_string());
            events.push(PoolEvent::Paused { account_id: None });
        })
    }

    /// Drop every pause hold and every per-account pause.
    pub fn resume_all(&self) -> Result<()> {
        self.mutate(|usage, events| {
            usage.pause_holds.clear();
            for account in usage.accounts.values_mut() {
                account.paused = false;
            }
            events.push(PoolEvent::Resumed { account_id: None });
        })
    }

    /// Pause the whole pool under a named hold.
    ///
    /// Returns `false` when `reason` was already held.
    pub fn hold(&self, reason: &str) -> Result<bool> {
        self.mutate(|usage, events| {
            let added = usage.pause_holds.insert(reason.to_string());
            if added {
                events.push(PoolEvent::Paused { account_id: None });
            }
            added
        })
    }

    /// Drop one hold. The pool resumes only when it was the last one;
    /// accounts paused on their own stay paused.
    ///
    /// Returns `true` when the pool was resumed.
    pub fn release_hold(&self, reason: &str) -> Result<bool> {
        self.mutate(|usage, events| {
            if !usage.pause_holds.remove(reason) || !usage.pause_holds.is_empty() {
                return false;
            }
            events.push(PoolEvent::Resumed { account_id: None });
            true
        })
    }

    /// Holds currently keeping the pool paused (as last seen).
    pub fn holds(&self) -> Vec<String> {
        self.lock_cache().pause_holds.iter().cloned().collect()
    }

    /// Pause one account. Returns `false` for an unknown id.
    pub fn pause_account(&self, account_id: &str) -> Result<bool> {
        self.set_account_paused(account_id, true)
    }

    pub fn resume_account(&self, account_id: &str) -> Result<bool> {
        self.set_account_paused(account_id, false)
    }

    fn set_account_paused(&self, account_id: &str, paused: bool) -> Result<bool> {
        if !self.accounts.iter().any(|a| a.id == account_id) {
            return Ok(false);
        }
        self.mutate(|usage, events| {
            usage.accounts.entry(account_id.to_string()).or_default().paused = paused;
            let account_id = Some(account_id.to_string());
            events.push(if paused {
                PoolEvent::Paused { account_id }
            } else {
                PoolEvent::Resumed { account_id }
            });
        })?;
        Ok(true)
    }

    /// Whether every account is currently paused (as last seen).
    pub fn is_paused(&self) -> bool {
        let cache = self.lock_cache();
        self.views(&cache).iter().all(|v| v.is_paused())
    }

    /// Apply the daily reset if the quota day has changed.
    ///
    /// Returns `true` when counters were reset.
    pub fn check_daily_reset(&self) -> Result<bool> {
        let today = self.today();
        if self.lock_cache().date_key == today {
            return Ok(false);
        }
        self.mutate(|_, events| {
            events
                .iter()
                .any(|e| matches!(e, PoolEvent::DailyReset { .. }))
        })
    }

    /// Count one task handed to the last-resort bridge today.
    pub fn record_last_resort_delegation(&self) -> Result<()> {
        self.mutate(|usage, _| {
            usage.last_resort_delegations += 1;
        })
    }

    /// Current status, read fresh from the store.
    pub fn status(&self) -> Result<PoolStatus> {
        let mut usage = self.store.load_usage()?;
        let mut ignored = Vec::new();
        self.roll_day(&mut usage, &self.today(), &mut ignored);

        let accounts: Vec<AccountStatus> = self
            .views(&usage)
            .iter()
            .map(|v| AccountStatus {
                id: v.config.id.clone(),
                domains: v.config.domains.clone(),
                priority: v.config.priority,
                daily_used: v.usage.daily_used,
                daily_quota: v.config.daily_quota,
                active: v.active(),
                concurrency_limit: v.config.concurrency_limit,
                paused: v.is_paused(),
                slots: v.usage.active_slots.clone(),
            })
            .collect();

        Ok(PoolStatus {
            date_key: usage.date_key.clone(),
            total_used: accounts.iter().map(|a| a.daily_used).sum(),
            total_quota: accounts.iter().map(|a| a.daily_quota).sum(),
            total_active: accounts.iter().map(|a| a.active).sum(),
            last_resort_delegations: usage.last_resort_delegations,
            pause_holds: usage.pause_holds.iter().cloned().collect(),
            accounts,
        })
    }

    fn today(&self) -> String {
        date_key(self.clock.now(), self.boundary, self.offset_minutes)
    }

    fn lock_cache(&self) -> MutexGuard<'_, UsageSnapshot> {
        self.cache.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    fn views<'a>(&'a self, usage: &'a UsageSnapshot) -> Vec<AccountView<'a>> {
        self.accounts
            .iter()
            .map(|config| AccountView {
                config,
                usage: usage.accounts.get(&config.id).unwrap_or(&EMPTY_USAGE),
                held: !usage.pause_holds.is_empty(),
            })
            .collect()
    }

    /// Make sure every configured account has an entry and the counters
    /// belong to `today`.
    fn roll_day(&self, usage: &mut UsageSnapshot, today: &str, events: &mut Vec<PoolEvent>) {
        for config in &self.accounts {
            usage.accounts.entry(config.id.clone()).or_default();
        }
        if usage.date_key == today {
            return;
        }
        if !usage.date_key.is_empty() {
            // In-flight work keeps its slot across the boundary.
            for account in usage.accounts.values_mut() {
                account.daily_used = 0;
            }
            usage.last_resort_delegations = 0;
            tracing::info!(from = %usage.date_key, to = today, "daily quota reset");
            events.push(PoolEvent::DailyReset {
                date_key: today.to_string(),
            });
        }
        usage.date_key = today.to_string();
    }

    /// Run `op` as one atomic read-modify-write of the stored usage, then
    /// publish whatever events it produced.
    fn mutate<T>(
        &self,
        mut op: impl FnMut(&mut UsageSnapshot, &mut Vec<PoolEvent>) -> T,
    ) -> Result<T> {
        let today = self.today();
        let mut events = Vec::new();
        let mut output = None;

        {
            let mut cache = self.lock_cache();
            let updated = self.store.update_usage(&mut |usage| {
                events.clear();
                self.roll_day(usage, &today, &mut events);
                output = Some(op(usage, &mut events));
            })?;
            *cache = updated;
        }

        for event in &events {
            self.events.publish(event);
        }
        output.ok_or_else(|| TierwatchError::Store("usage update was not applied".to_string()))
    }
}

/// The blocker every account shares, or `Mixed`.
fn exhaustion_reason(views: &[AccountView<'_>]) -> ExhaustionReason {
    let mut blockers = views.iter().map(|v| v.blocked());
    let first = blockers.next().flatten();
    if blockers.any(|b| b != first) {
        return ExhaustionReason::Mixed;
    }
    match first {
        Some(Blocked::Quota) => ExhaustionReason::DailyQuotaReached,
        Some(Blocked::Concurrency) => ExhaustionReason::ConcurrencySaturated,
        Some(Blocked::Paused) => ExhaustionReason::AllPaused,
        None => ExhaustionReason::Mixed,
    }
}
