//! Configuration model for tierwatch.
//!
//! This module defines the Config struct that represents `tierwatch.yaml`.
//! It supports forward-compatible YAML parsing (unknown fields are ignored),
//! sensible defaults for every field, and validation of config values.

mod model;
mod operations;

#[cfg(test)]
mod tests;

// Re-export public API
pub use model::{
    AccountConfig, Config, DispatchConfig, PoolConfig, ResetBoundary, SupervisorConfig,
    WatchdogConfig,
};
