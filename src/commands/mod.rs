//! Command implementations for tierwatch.
//!
//! [`dispatch`] loads the configuration, assembles a [`Coordinator`] and
//! routes the parsed command to its handler. Handlers print their outcome to
//! stdout and return the process exit code; failures come back as errors and
//! are mapped to exit codes by `main`.

mod config_cmd;
mod decide;
mod pending;
mod pool;
mod submit;
mod watch;

#[cfg(test)]
mod tests;

use crate::cli::{Command, ConfigAction, PoolAction};
use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::dispatch::DispatchOutcome;
use crate::error::Result;
use crate::exit_codes;
use std::path::Path;

/// Dispatch a command to its implementation.
///
/// Returns the exit code for a command that ran to completion.
pub fn dispatch(config_path: &Path, command: Command) -> Result<i32> {
    if let Command::Config(cmd) = &command {
        return match &cmd.action {
            ConfigAction::Check(args) => config_cmd::cmd_config_check(config_path, args),
        };
    }

    let coordinator = open(config_path)?;
    match command {
        Command::Submit(args) => submit::cmd_submit(&coordinator, args),
        Command::Approve(args) => decide::cmd_approve(&coordinator, &args.task_id),
        Command::Reject(args) => decide::cmd_reject(&coordinator, &args.task_id),
        Command::Complete(args) => decide::cmd_complete(&coordinator, args),
        Command::Pending => pending::cmd_pending(&coordinator),
        Command::Pool(cmd) => match cmd.action {
            PoolAction::Status(args) => pool::cmd_pool_status(&coordinator, &args),
            PoolAction::Pause(args) => pool::cmd_pool_pause(&coordinator, &args),
            PoolAction::Resume(args) => pool::cmd_pool_resume(&coordinator, &args),
        },
        Command::Drain => pool::cmd_drain(&coordinator),
        Command::Thermal(args) => pool::cmd_thermal(&coordinator, &args.level),
        Command::Watch(args) => watch::cmd_watch(coordinator, args),
        Command::Config(_) => Ok(exit_codes::SUCCESS),
    }
}

/// Load the config at `path` (defaults when absent) and assemble the system.
fn open(path: &Path) -> Result<Coordinator> {
    let config = Config::load_or_default(path)?;
    tracing::debug!(path = %path.display(), state_dir = %config.state_dir.display(), "opening coordinator");
    Coordinator::open(config)
}

/// Print a dispatch outcome and pick the exit code for it.
fn report(outcome: &DispatchOutcome) -> i32 {
    println!("{}", outcome);
    match outcome {
        DispatchOutcome::Completed { result, .. } if !result.is_empty() => {
            println!();
            println!("{}", result.trim_end());
            exit_codes::SUCCESS
        }
        DispatchOutcome::PendingApproval { .. } | DispatchOutcome::Requeued { .. } => {
            exit_codes::ESCALATION
        }
        _ => exit_codes::SUCCESS,
    }
}
