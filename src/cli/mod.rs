//! CLI argument parsing for tierwatch.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Tierwatch: capacity-bounded task dispatch with a supervisory watchdog.
///
/// Tasks cascade through three tiers:
/// - the account pool (daily quota and concurrency per account)
/// - a credit-limited fast executor
/// - a human-gated last-resort bridge
///
/// `watch` supervises a long-running agent and restarts it when it loops,
/// stalls, or dies.
#[derive(Parser, Debug)]
#[command(name = "tierwatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, global = true, default_value = "tierwatch.yaml")]
    pub config: PathBuf,

    /// Increase diagnostic output (-v info, -vv debug). RUST_LOG wins.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for tierwatch.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit a new task and dispatch it through the cascade.
    ///
    /// Prints where the task landed. Exits 4 when it is left waiting on
    /// a human decision.
    Submit(SubmitArgs),

    /// Approve a task parked as pending approval.
    ///
    /// Hands the task to the last-resort bridge.
    Approve(TaskArgs),

    /// Reject a task parked as pending approval.
    ///
    /// Sends the task back through the cascade from the pool.
    Reject(TaskArgs),

    /// Report that a pool task finished.
    ///
    /// Releases its slot and drains the retry queue.
    Complete(CompleteArgs),

    /// List tasks waiting for approval or a retry.
    Pending,

    /// Account pool commands.
    ///
    /// Show usage, or pause and resume accounts.
    Pool(PoolCommand),

    /// Move queued tasks onto the pool while it has capacity.
    Drain,

    /// Deliver a host temperature signal (normal, warning, critical).
    ///
    /// `critical` pauses the pool; leaving it resumes the pool.
    Thermal(ThermalArgs),

    /// Supervise an agent's output.
    ///
    /// Feeds each output line into the loop/stall detector while the
    /// watchdog and maintenance threads run. Reads stdin unless `--command`
    /// is given.
    Watch(WatchArgs),

    /// Configuration commands.
    Config(ConfigCommand),
}

/// Arguments for the `submit` command.
#[derive(Parser, Debug)]
pub struct SubmitArgs {
    /// Title for the new task.
    pub title: String,

    /// Domain hint used for account affinity (e.g. "api", "ui", "qa").
    #[arg(short, long)]
    pub domain: Option<String>,

    /// Priority level (high, medium, low).
    #[arg(short, long)]
    pub priority: Option<String>,

    /// Force the task onto a tier: 2 skips the pool, 3 goes straight to the
    /// last-resort bridge.
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3))]
    pub force_tier: Option<u8>,
}

/// Arguments for commands that take a single task id.
#[derive(Parser, Debug)]
pub struct TaskArgs {
    /// Task ID (e.g., T-M7Q2K40).
    pub task_id: String,
}

/// Arguments for the `complete` command.
#[derive(Parser, Debug)]
pub struct CompleteArgs {
    /// Task ID to complete.
    pub task_id: String,

    /// Mark the task failed instead of completed.
    #[arg(long)]
    pub failed: bool,

    /// Result text (or failure reason with --failed).
    #[arg(short, long)]
    pub result: Option<String>,
}

/// Pool subcommands.
#[derive(Parser, Debug)]
pub struct PoolCommand {
    #[command(subcommand)]
    pub action: PoolAction,
}

/// Available pool actions.
#[derive(Subcommand, Debug)]
pub enum PoolAction {
    /// Show per-account usage, active slots and pause holds.
    Status(PoolStatusArgs),

    /// Pause the whole pool, or a single account with --account.
    Pause(PoolTargetArgs),

    /// Resume the whole pool (clearing every hold), or a single account.
    Resume(PoolTargetArgs),
}

/// Arguments for the `pool status` command.
#[derive(Parser, Debug)]
pub struct PoolStatusArgs {
    /// Print the status as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `pool pause` and `pool resume`.
#[derive(Parser, Debug)]
pub struct PoolTargetArgs {
    /// Only this account.
    #[arg(short, long)]
    pub account: Option<String>,
}

/// Arguments for the `thermal` command.
#[derive(Parser, Debug)]
pub struct ThermalArgs {
    /// Thermal level: normal, warning or critical.
    pub level: String,
}

/// Arguments for the `watch` command.
#[derive(Parser, Debug)]
pub struct WatchArgs {
    /// Run this command and watch its output instead of reading stdin.
    #[arg(long)]
    pub command: Option<String>,

    /// Print the watchdog status when the input ends.
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub summary: bool,
}

/// Config subcommands.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Available config actions.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Load and validate the configuration file.
    Check(ConfigCheckArgs),
}

/// Arguments for the `config check` command.
#[derive(Parser, Debug)]
pub struct ConfigCheckArgs {
    /// Print the effective configuration (defaults filled in) as YAML.
    #[arg(long)]
    pub print: bool,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
