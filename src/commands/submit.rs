//! Implementation of the `tierwatch submit` command.

use super::report;
use crate::cli::SubmitArgs;
use crate::coordinator::Coordinator;
use crate::error::{Result, TierwatchError};
use crate::task::{Priority, Tier};

pub fn cmd_submit(coordinator: &Coordinator, args: SubmitArgs) -> Result<i32> {
    let priority = args
        .priority
        .as_deref()
        .map(|p| {
            Priority::from_str(p).ok_or_else(|| {
                TierwatchError::MalformedTask(format!(
                    "unknown priority '{}' (expected high, medium or low)",
                    p
                ))
            })
        })
        .transpose()?;

    let dispatcher = coordinator.dispatcher();
    if let Some(n) = args.force_tier {
        let tier = Tier::from_number(n).ok_or_else(|| {
            TierwatchError::MalformedTask(format!("unknown tier {} (expected 1, 2 or 3)", n))
        })?;
        dispatcher.force_next_task_to(tier);
    }

    let outcome = dispatcher.submit(&args.title, args.domain.as_deref(), priority)?;
    Ok(report(&outcome))
}
