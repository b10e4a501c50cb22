//! Operator decisions on existing tasks: `approve`, `reject` and `complete`.

use super::report;
use crate::cli::CompleteArgs;
use crate::coordinator::Coordinator;
use crate::dispatch::TaskOutcome;
use crate::error::Result;
use crate::exit_codes;
use crate::task::TaskId;

/// Approve a pending-approval task and hand it to the last-resort bridge.
pub fn cmd_approve(coordinator: &Coordinator, task_id: &str) -> Result<i32> {
    let outcome = coordinator.dispatcher().approve(&TaskId::new(task_id))?;
    Ok(report(&outcome))
}

/// Reject a pending-approval task; it goes back through the cascade.
pub fn cmd_reject(coordinator: &Coordinator, task_id: &str) -> Result<i32> {
    let outcome = coordinator.dispatcher().reject(&TaskId::new(task_id))?;
    Ok(report(&outcome))
}

pub fn cmd_complete(coordinator: &Coordinator, args: CompleteArgs) -> Result<i32> {
    let outcome = if args.failed {
        TaskOutcome::Failed(args.result.unwrap_or_else(|| "failed".to_string()))
    } else {
        TaskOutcome::Succeeded(args.result)
    };

    let task = coordinator
        .dispatcher()
        .complete(&TaskId::new(&args.task_id), outcome)?;
    println!("Task {} {}", task.id, task.status);
    if let Some(account) = &task.account_id {
        println!("  released slot on account {}", account);
    }
    Ok(exit_codes::SUCCESS)
}
