//! Tierwatch: capacity-bounded task dispatch with a supervisory agent watchdog.
//!
//! - [`pool`]: accounts with daily quotas and concurrency limits
//! - [`dispatch`]: the pool -> fast executor -> human-gated bridge cascade
//! - [`watchdog`]: loop, stall and crash detection with automatic recovery
//! - [`coordinator`]: wires the three together behind one owner
//!
//! The `tierwatch` binary is a thin CLI over [`commands`].

pub mod audit;
pub mod bus;
pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod logging;
pub mod notify;
pub mod pool;
pub mod process;
pub mod store;
pub mod task;
pub mod watchdog;

#[cfg(test)]
mod test_support;
