//! Tests for the command handlers, run against an in-memory coordinator.

use super::*;
use crate::cli::{
    CompleteArgs, ConfigCheckArgs, PoolStatusArgs, PoolTargetArgs, SubmitArgs,
};
use crate::config::AccountConfig;
use crate::coordinator::Collaborators;
use crate::error::TierwatchError;
use crate::store::MemoryStore;
use crate::task::{Domain, TaskStatus};
use crate::test_support::{
    ManualClock, MemoryNotifier, ScriptedBridge, ScriptedExecutor, ScriptedSupervisor,
};
use crate::watchdog::WatchdogState;
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;

/// One backend account with a single slot; tier 2 has no credits.
fn coordinator() -> Coordinator {
    let mut config = Config::default();
    config.pool.accounts =
        vec![AccountConfig::new("A", vec![Domain::Backend], 1).with_limits(100, 1)];
    Coordinator::new(
        config,
        Arc::new(MemoryStore::new()),
        Arc::new(ManualClock::morning()),
        Collaborators {
            fast: Arc::new(ScriptedExecutor::without_credits()),
            bridge: Arc::new(ScriptedBridge::new()),
            supervisor: Arc::new(ScriptedSupervisor::new()),
            notifier: Arc::new(MemoryNotifier::default()),
            audit_dir: None,
        },
    )
    .unwrap()
}

fn submit_args(title: &str) -> SubmitArgs {
    SubmitArgs {
        title: title.to_string(),
        domain: Some("api".to_string()),
        priority: None,
        force_tier: None,
    }
}

#[test]
fn test_submit_exit_codes_follow_outcome() {
    let c = coordinator();
    assert_eq!(
        submit::cmd_submit(&c, submit_args("first")).unwrap(),
        exit_codes::SUCCESS
    );
    // Pool full and no credits: parked for a human.
    assert_eq!(
        submit::cmd_submit(&c, submit_args("second")).unwrap(),
        exit_codes::ESCALATION
    );
    assert_eq!(c.dispatcher().pending_approvals().unwrap().len(), 1);
}

#[test]
fn test_submit_force_tier_three_goes_to_bridge() {
    let c = coordinator();
    let args = SubmitArgs {
        force_tier: Some(3),
        ..submit_args("urgent")
    };
    assert_eq!(submit::cmd_submit(&c, args).unwrap(), exit_codes::SUCCESS);
    assert_eq!(c.pool().status().unwrap().last_resort_delegations, 1);
    assert_eq!(c.pool().status().unwrap().total_used, 0);
}

#[test]
fn test_submit_rejects_unknown_priority() {
    let c = coordinator();
    let args = SubmitArgs {
        priority: Some("urgent".to_string()),
        ..submit_args("x")
    };
    let err = submit::cmd_submit(&c, args).unwrap_err();
    assert!(matches!(err, TierwatchError::MalformedTask(_)));
    assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
}

#[test]
fn test_approve_reject_and_complete() {
    let c = coordinator();
    submit::cmd_submit(&c, submit_args("running")).unwrap();
    submit::cmd_submit(&c, submit_args("parked")).unwrap();
    let parked = c.dispatcher().pending_approvals().unwrap()[0].id.clone();

    // Rejecting while the pool is still full parks it again.
    assert_eq!(
        decide::cmd_reject(&c, parked.as_str()).unwrap(),
        exit_codes::ESCALATION
    );
    assert_eq!(
        decide::cmd_approve(&c, parked.as_str()).unwrap(),
        exit_codes::SUCCESS
    );

    let running = c.pool().status().unwrap().accounts[0].slots[0]
        .task_ref
        .clone();
    let args = CompleteArgs {
        task_id: running.to_string(),
        failed: true,
        result: None,
    };
    assert_eq!(decide::cmd_complete(&c, args).unwrap(), exit_codes::SUCCESS);
    let task = c.store().get(&running).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.result.as_deref(), Some("failed"));
}

#[test]
fn test_complete_unknown_task_is_user_error() {
    let c = coordinator();
    let args = CompleteArgs {
        task_id: "T-NOPE".to_string(),
        failed: false,
        result: None,
    };
    let err = decide::cmd_complete(&c, args).unwrap_err();
    assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
}

#[test]
fn test_pending_lists_without_error() {
    let c = coordinator();
    assert_eq!(pending::cmd_pending(&c).unwrap(), exit_codes::SUCCESS);
    submit::cmd_submit(&c, submit_args("one")).unwrap();
    submit::cmd_submit(&c, submit_args("two")).unwrap();
    assert_eq!(pending::cmd_pending(&c).unwrap(), exit_codes::SUCCESS);
}

#[test]
fn test_pool_pause_and_resume() {
    let c = coordinator();
    let all = PoolTargetArgs { account: None };
    pool::cmd_pool_pause(&c, &all).unwrap();
    assert!(c.pool().is_paused());
    assert_eq!(c.pool().holds(), vec!["operator".to_string()]);

    pool::cmd_pool_resume(&c, &all).unwrap();
    assert!(!c.pool().is_paused());

    let unknown = PoolTargetArgs {
        account: Some("Z".to_string()),
    };
    assert!(pool::cmd_pool_pause(&c, &unknown).is_err());

    let one = PoolTargetArgs {
        account: Some("A".to_string()),
    };
    pool::cmd_pool_pause(&c, &one).unwrap();
    assert!(c.pool().status().unwrap().accounts[0].paused);
    pool::cmd_pool_status(&c, &PoolStatusArgs { json: true }).unwrap();
    pool::cmd_pool_resume(&c, &one).unwrap();
    assert!(!c.pool().status().unwrap().accounts[0].paused);
}

#[test]
fn test_thermal_levels() {
    let c = coordinator();
    pool::cmd_thermal(&c, "critical").unwrap();
    assert_eq!(c.pool().holds(), vec!["thermal".to_string()]);
    pool::cmd_thermal(&c, "normal").unwrap();
    assert!(!c.pool().is_paused());

    let err = pool::cmd_thermal(&c, "lukewarm").unwrap_err();
    assert!(matches!(err, TierwatchError::Config(_)));
}

#[test]
fn test_drain_reports_success() {
    let c = coordinator();
    assert_eq!(pool::cmd_drain(&c).unwrap(), exit_codes::SUCCESS);
}

#[test]
fn test_feed_lines_drives_loop_detection() {
    let c = coordinator();
    let input = "Error: retry 1\nError: retry 2\n\nError: retry 3\nError: retry 4\nError: retry 5\n";
    let mut echo = Vec::new();

    let count = watch::feed_lines(c.watchdog(), Cursor::new(input), &mut echo).unwrap();
    assert_eq!(count, 6);
    assert_eq!(String::from_utf8(echo).unwrap(), input);
    assert_eq!(c.watchdog().state(), WatchdogState::Looping);
    assert_eq!(c.watchdog().status().buffer_len, 5);
}

#[test]
fn test_config_check() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.yaml");
    let args = ConfigCheckArgs { print: true };
    assert_eq!(
        config_cmd::cmd_config_check(&missing, &args).unwrap(),
        exit_codes::SUCCESS
    );

    let bad = dir.path().join("bad.yaml");
    std::fs::write(&bad, "watchdog:\n  similarity_threshold: 1.5\n").unwrap();
    let err = config_cmd::cmd_config_check(&bad, &ConfigCheckArgs { print: false }).unwrap_err();
    assert!(matches!(err, TierwatchError::Config(_)));
}

#[test]
fn test_dispatch_routes_config_check_without_state() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tierwatch.yaml");
    std::fs::write(&path, "state_dir: does-not-matter\n").unwrap();
    let command = Command::Config(crate::cli::ConfigCommand {
        action: ConfigAction::Check(ConfigCheckArgs { print: false }),
    });
    assert_eq!(dispatch(&path, command).unwrap(), exit_codes::SUCCESS);
    assert!(!dir.path().join("does-not-matter").exists());
}
