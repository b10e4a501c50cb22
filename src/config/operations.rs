//! Config loading, validation, and utility operations.

use super::model::{Config, ResetBoundary};
use crate::error::{Result, TierwatchError};
use std::collections::HashSet;
use std::path::Path;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(TierwatchError::Config)` - Read error, parse error or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            TierwatchError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load config from `path`, falling back to defaults when the file is absent.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file absent; using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = if yaml.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(yaml)
                .map_err(|e| TierwatchError::Config(format!("failed to parse config YAML: {}", e)))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            TierwatchError::Config(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - at least one account, ids unique and non-empty
    /// - every account has a positive quota and concurrency limit
    /// - fixed-offset boundary lies within +/- 24h
    /// - loop threshold, buffer size and poll interval are positive
    /// - similarity threshold in (0, 1], fault rate in [0, 1]
    /// - history keeps fewer entries than its cap
    pub fn validate(&self) -> Result<()> {
        if self.pool.accounts.is_empty() {
            return Err(invalid("pool.accounts must list at least one account"));
        }

        let mut seen = HashSet::new();
        for account in &self.pool.accounts {
            if account.id.trim().is_empty() {
                return Err(invalid("account ids must be non-empty"));
            }
            if !seen.insert(account.id.as_str()) {
                return Err(invalid(&format!("duplicate account id '{}'", account.id)));
            }
            if account.daily_quota == 0 {
                return Err(invalid(&format!(
                    "account '{}' daily_quota must be greater than 0",
                    account.id
                )));
            }
            if account.concurrency_limit == 0 {
                return Err(invalid(&format!(
                    "account '{}' concurrency_limit must be greater than 0",
                    account.id
                )));
            }
        }

        if self.pool.reset_boundary == ResetBoundary::FixedOffset
            && self.pool.reset_offset_minutes.abs() >= 24 * 60
        {
            return Err(invalid(
                "pool.reset_offset_minutes must be within +/- 1439 minutes",
            ));
        }

        let rate = self.dispatch.fault_injection_rate;
        if !(0.0..=1.0).contains(&rate) {
            return Err(invalid(
                "dispatch.fault_injection_rate must be between 0.0 and 1.0",
            ));
        }

        let wd = &self.watchdog;
        if wd.loop_threshold == 0 {
            return Err(invalid("watchdog.loop_threshold must be greater than 0"));
        }
        if wd.buffer_size < wd.loop_threshold {
            return Err(invalid(
                "watchdog.buffer_size must be at least watchdog.loop_threshold",
            ));
        }
        if !(wd.similarity_threshold > 0.0 && wd.similarity_threshold <= 1.0) {
            return Err(invalid(
                "watchdog.similarity_threshold must be in (0.0, 1.0]",
            ));
        }
        if wd.poll_interval_ms == 0 {
            return Err(invalid("watchdog.poll_interval_ms must be greater than 0"));
        }
        if wd.history_keep == 0 || wd.history_keep >= wd.history_cap {
            return Err(invalid(
                "watchdog.history_keep must be positive and below watchdog.history_cap",
            ));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> TierwatchError {
    TierwatchError::Config(format!("config validation failed: {}", message))
}
