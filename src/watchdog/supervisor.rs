//! Process-supervision capability consumed by the watchdog.
//!
//! The watchdog never runs commands itself. It asks a [`ProcessSupervisor`]
//! whether the agent is alive and tells it to kill, relaunch or nudge.
//! [`CommandSupervisor`] implements that with configured shell commands.

use crate::config::SupervisorConfig;
use crate::error::{Result, TierwatchError};
use crate::process::{self, CommandOutput};
use std::time::Duration;

/// Control over the supervised agent process.
pub trait ProcessSupervisor: Send + Sync {
    /// Whether the agent process currently exists.
    fn is_alive(&self) -> bool;

    /// Run one relaunch command. `true` when the command itself succeeded;
    /// the watchdog verifies liveness separately.
    fn relaunch(&self, command: &str) -> bool;

    /// Stop the agent process.
    fn kill(&self) -> bool;

    /// Send the synthetic "continue" signal to a stalled agent.
    fn nudge(&self) -> bool;
}

/// Supervisor backed by configured command lines.
///
/// Without a probe command the agent is assumed alive. Without a kill or
/// nudge command those actions report failure and do nothing.
#[derive(Debug, Clone)]
pub struct CommandSupervisor {
    probe: Option<Vec<String>>,
    kill: Option<Vec<String>>,
    nudge: Option<Vec<String>>,
    timeout: Duration,
}

impl CommandSupervisor {
    pub fn from_config(config: &SupervisorConfig) -> Result<Self> {
        Ok(Self {
            probe: parse(config.probe_command.as_deref(), "probe_command")?,
            kill: parse(config.kill_command.as_deref(), "kill_command")?,
            nudge: parse(config.nudge_command.as_deref(), "nudge_command")?,
            timeout: Duration::from_millis(config.command_timeout_ms),
        })
    }

    fn run(&self, what: &str, argv: &[String]) -> Option<CommandOutput> {
        match process::run(argv, None, self.timeout) {
            Ok(output) => {
                if output.timed_out {
                    tracing::warn!(what, "supervisor command timed out");
                } else if !output.success() {
                    tracing::debug!(what, code = ?output.code(), stderr = %output.stderr_tail(), "supervisor command failed");
                }
                Some(output)
            }
            Err(e) => {
                tracing::warn!(what, error = %e, "failed to run supervisor command");
                None
            }
        }
    }
}

fn parse(command: Option<&str>, field: &str) -> Result<Option<Vec<String>>> {
    command
        .map(|c| {
            process::parse_command(c).map_err(|e| {
                TierwatchError::Config(format!("invalid supervisor.{} '{}': {}", field, c, e))
            })
        })
        .transpose()
}

impl ProcessSupervisor for CommandSupervisor {
    fn is_alive(&self) -> bool {
        match &self.probe {
            Some(argv) => self.run("probe", argv).is_some_and(|o| o.success()),
            None => true,
        }
    }

    fn relaunch(&self, command: &str) -> bool {
        let argv = match process::parse_command(command) {
            Ok(argv) => argv,
            Err(e) => {
                tracing::warn!(command, error = %e, "invalid relaunch command");
                return false;
            }
        };
        self.run("relaunch", &argv).is_some_and(|o| o.success())
    }

    fn kill(&self) -> bool {
        match &self.kill {
            Some(argv) => self.run("kill", argv).is_some_and(|o| o.success()),
            None => {
                tracing::warn!("no supervisor.kill_command configured");
                false
            }
        }
    }

    fn nudge(&self) -> bool {
        match &self.nudge {
            Some(argv) => self.run("nudge", argv).is_some_and(|o| o.success()),
            None => {
                tracing::debug!("no supervisor.nudge_command configured");
                false
            }
        }
    }
}
