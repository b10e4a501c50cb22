//! Command-line driven tier 2/3 collaborators.
//!
//! The configured command receives the task as JSON on stdin and prints its
//! result on stdout. Exit code 75 (`EX_TEMPFAIL`) means "try elsewhere":
//! credits exhausted for tier 2, gateway unreachable for tier 3. Any other
//! non-zero exit is an execution error.

use super::tiers::{FastExecutor, LastResortBridge};
use crate::error::{Result, TierwatchError};
use crate::process::{self, CommandOutput};
use crate::task::{Task, Tier};
use std::time::Duration;

/// Exit code a command uses to report a soft, capacity-style refusal.
pub const EXIT_TEMPFAIL: i32 = 75;

/// Runs one configured command per task.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    command: String,
    argv: Vec<String>,
}

impl CommandExecutor {
    pub fn new(command: &str) -> Result<Self> {
        let argv = process::parse_command(command).map_err(|e| {
            TierwatchError::Config(format!("invalid command '{}': {}", command, e))
        })?;
        Ok(Self {
            command: command.to_string(),
            argv,
        })
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn run(&self, task: &Task, timeout: Duration) -> std::io::Result<CommandOutput> {
        let payload = serde_json::to_vec(task).map_err(std::io::Error::other)?;
        process::run(&self.argv, Some(&payload), timeout)
    }
}

impl FastExecutor for CommandExecutor {
    fn has_credits(&self) -> bool {
        true
    }

    fn execute(&self, task: &Task, timeout: Duration) -> Result<String> {
        let tier = Tier::Fast.to_string();
        let output = self.run(task, timeout).map_err(|e| TierwatchError::ExecutionError {
            tier: tier.clone(),
            message: format!("failed to run '{}': {}", self.command, e),
        })?;

        if output.success() {
            return Ok(output.stdout.trim().to_string());
        }
        if output.code() == Some(EXIT_TEMPFAIL) {
            return Err(TierwatchError::ExecutorCreditsExhausted(
                non_empty(output.stderr_tail(), "executor reported no credits").to_string(),
            ));
        }
        Err(TierwatchError::ExecutionError {
            tier,
            message: describe_failure(&output),
        })
    }
}

impl LastResortBridge for CommandExecutor {
    fn delegate(&self, task: &Task, timeout: Duration) -> Result<String> {
        let output = self.run(task, timeout).map_err(|e| {
            TierwatchError::BridgeUnavailable(format!("failed to run '{}': {}", self.command, e))
        })?;

        if output.success() {
            return Ok(output.stdout.trim().to_string());
        }
        if output.code() == Some(EXIT_TEMPFAIL) || output.timed_out {
            return Err(TierwatchError::BridgeUnavailable(describe_failure(&output)));
        }
        Err(TierwatchError::ExecutionError {
            tier: Tier::LastResort.to_string(),
            message: describe_failure(&output),
        })
    }
}

fn describe_failure(output: &CommandOutput) -> String {
    if output.timed_out {
        return "command timed out".to_string();
    }
    let code = output
        .code()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());
    match output.stderr_tail() {
        "" => format!("exit {}", code),
        tail => format!("exit {}: {}", code, tail),
    }
}

fn non_empty<'a>(s: &'a str, fallback: &'a str) -> &'a str {
    if s.is_empty() { fallback } else { s }
}
