//! Implementation of the `tierwatch pending` command.
//!
//! Lists tasks parked for approval and the retry queue, oldest first.

use crate::clock::{elapsed_ms, human_duration};
use crate::coordinator::Coordinator;
use crate::error::Result;
use crate::exit_codes;
use crate::task::{Task, TaskStatus};
use chrono::Utc;

pub fn cmd_pending(coordinator: &Coordinator) -> Result<i32> {
    let waiting = coordinator.store().get_pending()?;
    let (approvals, retries): (Vec<&Task>, Vec<&Task>) = waiting
        .iter()
        .partition(|t| t.status == TaskStatus::PendingApproval);

    println!("Pending Tasks");
    println!("=============");
    println!();

    print_section("Awaiting approval", &approvals);
    print_section("Waiting for retry", &retries);

    if approvals.is_empty() && retries.is_empty() {
        println!("Nothing is waiting.");
    } else if !approvals.is_empty() {
        println!("Use `tierwatch approve <id>` or `tierwatch reject <id>` to decide.");
    }
    Ok(exit_codes::SUCCESS)
}

fn print_section(title: &str, tasks: &[&Task]) {
    if tasks.is_empty() {
        return;
    }
    let now = Utc::now();
    println!("{} ({}):", title, tasks.len());
    for task in tasks {
        let age = human_duration(elapsed_ms(task.created_at, now));
        println!(
            "  {:<14} {:<6} {:<12} {:>6} ago  {}",
            task.id.to_string(),
            task.priority.to_string(),
            task.domain.to_string(),
            age,
            task.title
        );
        if let Some(result) = &task.result {
            println!("  {:<14} {}", "", result);
        }
    }
    println!();
}
