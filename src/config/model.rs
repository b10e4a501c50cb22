//! Config struct definitions and defaults.

use crate::task::Domain;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the durable store, lock file, and audit log.
    pub state_dir: PathBuf,

    pub pool: PoolConfig,
    pub dispatch: DispatchConfig,
    pub watchdog: WatchdogConfig,
    pub supervisor: SupervisorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".tierwatch"),
            pool: PoolConfig::default(),
            dispatch: DispatchConfig::default(),
            watchdog: WatchdogConfig::default(),
            supervisor: SupervisorConfig::default(),
        }
    }
}

// =========================================================================
// Pool
// =========================================================================

/// Where the daily quota boundary falls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResetBoundary {
    /// Midnight UTC (default).
    #[default]
    Utc,
    /// Midnight in the host's local time zone.
    Local,
    /// Midnight at `reset_offset_minutes` east of UTC.
    FixedOffset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub accounts: Vec<AccountConfig>,

    pub reset_boundary: ResetBoundary,

    /// Offset east of UTC, used only with `reset_boundary: fixed_offset`.
    pub reset_offset_minutes: i32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            accounts: default_accounts(),
            reset_boundary: ResetBoundary::Utc,
            reset_offset_minutes: 0,
        }
    }
}

/// One task-execution account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub id: String,

    /// Domains this account is preferred for.
    #[serde(default)]
    pub domains: Vec<Domain>,

    /// Lower numbers are tried first among affinity matches.
    #[serde(default = "default_account_priority")]
    pub priority: u32,

    #[serde(default = "default_daily_quota")]
    pub daily_quota: u32,

    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: u32,
}

impl AccountConfig {
    pub fn new(id: &str, domains: Vec<Domain>, priority: u32) -> Self {
        Self {
            id: id.to_string(),
            domains,
            priority,
            daily_quota: default_daily_quota(),
            concurrency_limit: default_concurrency_limit(),
        }
    }

    pub fn with_limits(mut self, daily_quota: u32, concurrency_limit: u32) -> Self {
        self.daily_quota = daily_quota;
        self.concurrency_limit = concurrency_limit;
        self
    }
}

fn default_accounts() -> Vec<AccountConfig> {
    vec![
        AccountConfig::new("A", vec![Domain::Backend, Domain::Architecture], 1),
        AccountConfig::new("B", vec![Domain::Frontend], 2),
        AccountConfig::new("C", vec![Domain::Quality], 3),
    ]
}

fn default_account_priority() -> u32 {
    100
}
fn default_daily_quota() -> u32 {
    100
}
fn default_concurrency_limit() -> u32 {
    15
}

// =========================================================================
// Dispatch
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Bound on a single tier-2 execution.
    pub fast_timeout_ms: u64,

    /// Bound on a single tier-3 delegation. Longer than tier 2.
    pub bridge_timeout_ms: u64,

    /// Interval of the periodic retry-queue drain.
    pub drain_interval_ms: u64,

    /// Probability that a tier-1 acquire is treated as a synthetic divergence.
    pub fault_injection_rate: f64,

    /// Command line for the tier-2 executor (disabled when unset).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fast_command: Option<String>,

    /// Command line for the tier-3 bridge (unavailable when unset).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge_command: Option<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            fast_timeout_ms: 120_000,
            bridge_timeout_ms: 600_000,
            drain_interval_ms: 60_000,
            fault_injection_rate: 0.0,
            fast_command: None,
            bridge_command: None,
        }
    }
}

// =========================================================================
// Watchdog
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Capacity of each output ring buffer.
    pub buffer_size: usize,

    /// Minimum repeats of one pattern to call it a loop.
    pub loop_threshold: usize,

    /// Sliding window for loop detection.
    pub loop_window_ms: u64,

    /// Minimum share of the window the dominant pattern must hold.
    pub similarity_threshold: f64,

    pub stall_timeout_ms: u64,

    /// How long a loop may persist before kill-and-restart.
    pub kill_timeout_ms: u64,

    pub poll_interval_ms: u64,

    pub auto_continue_enabled: bool,
    pub max_auto_retries: u32,
    pub retry_cooldown_ms: u64,

    /// Wait between kill and relaunch.
    pub kill_grace_ms: u64,

    /// Wait between a relaunch attempt and its liveness check.
    pub relaunch_grace_ms: u64,

    /// Ordered relaunch commands handed to the process supervisor.
    pub relaunch_commands: Vec<String>,

    /// History length that triggers trimming.
    pub history_cap: usize,

    /// Entries kept after trimming.
    pub history_keep: usize,

    /// Pause the account pool while the agent is being recovered.
    pub pause_pool_during_recovery: bool,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            buffer_size: 50,
            loop_threshold: 5,
            loop_window_ms: 3 * 60 * 1000,
            similarity_threshold: 0.6,
            stall_timeout_ms: 2 * 60 * 1000,
            kill_timeout_ms: 5 * 60 * 1000,
            poll_interval_ms: 30 * 1000,
            auto_continue_enabled: true,
            max_auto_retries: 3,
            retry_cooldown_ms: 60 * 1000,
            kill_grace_ms: 10_000,
            relaunch_grace_ms: 5_000,
            relaunch_commands: Vec::new(),
            history_cap: 200,
            history_keep: 100,
            pause_pool_during_recovery: true,
        }
    }
}

// =========================================================================
// Process supervisor
// =========================================================================

/// Shell commands used by the command-based process supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Exits 0 while the agent process is alive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_command: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kill_command: Option<String>,

    /// Sends the synthetic "continue" signal to a stalled agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nudge_command: Option<String>,

    /// Bound on each supervisor command.
    pub command_timeout_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            probe_command: None,
            kill_command: None,
            nudge_command: None,
            command_timeout_ms: 10_000,
        }
    }
}
