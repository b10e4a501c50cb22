//! Accounts, slots, and the per-account capacity checks.

use crate::config::AccountConfig;
use crate::store::AccountUsage;
use crate::task::{Domain, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Concurrency reserved on one account for one in-flight task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub account_id: String,
    pub task_ref: TaskId,
    pub acquired_at: DateTime<Utc>,
}

/// Why an account cannot take work right now.
///
/// When several apply, the first in this order wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Blocked {
    Quota,
    Concurrency,
    Paused,
}

/// Read-only view joining an account's configuration with its usage.
pub(crate) struct AccountView<'a> {
    pub config: &'a AccountConfig,
    pub usage: &'a AccountUsage,
    /// The whole pool is under at least one pause hold.
    pub held: bool,
}

impl AccountView<'_> {
    pub fn blocked(&self) -> Option<Blocked> {
        if self.usage.daily_used >= self.config.daily_quota {
            Some(Blocked::Quota)
        } else if self.usage.active_slots.len() >= self.config.concurrency_limit as usize {
            Some(Blocked::Concurrency)
        } else if self.is_paused() {
            Some(Blocked::Paused)
        } else {
            None
        }
    }

    /// Paused on its own or through a pool-wide hold.
    pub fn is_paused(&self) -> bool {
        self.usage.paused || self.held
    }

    pub fn is_eligible(&self) -> bool {
        self.blocked().is_none()
    }

    pub fn serves(&self, domain: Domain) -> bool {
        domain != Domain::Generic && self.config.domains.contains(&domain)
    }

    /// Share of today's quota already spent.
    pub fn utilization(&self) -> f64 {
        self.usage.daily_used as f64 / self.config.daily_quota.max(1) as f64
    }

    pub fn active(&self) -> usize {
        self.usage.active_slots.len()
    }
}

/// Per-account line of [`super::PoolStatus`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountStatus {
    pub id: String,
    pub domains: Vec<Domain>,
    pub priority: u32,
    pub daily_used: u32,
    pub daily_quota: u32,
    pub active: usize,
    pub concurrency_limit: u32,
    pub paused: bool,
    pub slots: Vec<Slot>,
}
