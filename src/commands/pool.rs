//! Pool commands: `pool status|pause|resume`, `drain` and `thermal`.

use crate::cli::{PoolStatusArgs, PoolTargetArgs};
use crate::coordinator::{Coordinator, ThermalLevel};
use crate::dispatch::DrainReport;
use crate::error::{Result, TierwatchError};
use crate::exit_codes;

pub fn cmd_pool_status(coordinator: &Coordinator, args: &PoolStatusArgs) -> Result<i32> {
    let status = coordinator.pool().status()?;
    if args.json {
        let json = serde_json::to_string_pretty(&status)
            .map_err(|e| TierwatchError::Store(format!("failed to serialize status: {}", e)))?;
        println!("{}", json);
        return Ok(exit_codes::SUCCESS);
    }

    println!("{}", status.message());
    let queued = coordinator.dispatcher().retry_queue().len();
    if queued > 0 {
        println!("Retry queue: {} task(s)", queued);
    }
    Ok(exit_codes::SUCCESS)
}

pub fn cmd_pool_pause(coordinator: &Coordinator, args: &PoolTargetArgs) -> Result<i32> {
    match &args.account {
        Some(id) => {
            known_account(coordinator.pool().pause_account(id)?, id)?;
            println!("Account {} paused", id);
        }
        None => {
            coordinator.pause_pool()?;
            println!("Account pool paused");
        }
    }
    Ok(exit_codes::SUCCESS)
}

pub fn cmd_pool_resume(coordinator: &Coordinator, args: &PoolTargetArgs) -> Result<i32> {
    match &args.account {
        Some(id) => {
            known_account(coordinator.pool().resume_account(id)?, id)?;
            println!("Account {} resumed", id);
            print_drain(&coordinator.dispatcher().drain()?);
        }
        None => {
            let report = coordinator.resume_pool()?;
            println!("Account pool resumed");
            print_drain(&report);
        }
    }
    Ok(exit_codes::SUCCESS)
}

pub fn cmd_drain(coordinator: &Coordinator) -> Result<i32> {
    let report = coordinator.maintenance_tick()?;
    print_drain(&report);
    Ok(exit_codes::SUCCESS)
}

pub fn cmd_thermal(coordinator: &Coordinator, level: &str) -> Result<i32> {
    let level = ThermalLevel::from_str(level).ok_or_else(|| {
        TierwatchError::Config(format!(
            "unknown thermal level '{}' (expected normal, warning or critical)",
            level
        ))
    })?;
    coordinator.on_thermal(level)?;

    let holds = coordinator.pool().holds();
    if holds.is_empty() {
        println!("Thermal level {}; pool running", level);
    } else {
        println!("Thermal level {}; pool held by {}", level, holds.join(", "));
    }
    Ok(exit_codes::SUCCESS)
}

fn known_account(found: bool, id: &str) -> Result<()> {
    if found {
        Ok(())
    } else {
        Err(TierwatchError::Config(format!(
            "no account '{}' in the pool",
            id
        )))
    }
}

fn print_drain(report: &DrainReport) {
    for (task, account) in &report.placed {
        println!("  {} -> {}", task, account);
    }
    println!(
        "Retry queue: {} placed, {} waiting",
        report.placed.len(),
        report.remaining
    );
}
