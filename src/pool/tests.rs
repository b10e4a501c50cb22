//! Tests for the account pool.

use super::*;
use crate::store::MemoryStore;
use crate::task::{Domain, Priority};
use crate::test_support::ManualClock;
use chrono::{TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn accounts(quota: u32, concurrency: u32) -> PoolConfig {
    PoolConfig {
        accounts: vec![
            AccountConfig::new("A", vec![Domain::Backend], 1).with_limits(quota, concurrency),
            AccountConfig::new("B", vec![Domain::Frontend], 2).with_limits(quota, concurrency),
            AccountConfig::new("C", vec![Domain::Quality], 3).with_limits(quota, concurrency),
        ],
        ..PoolConfig::default()
    }
}

fn setup(config: &PoolConfig) -> (AccountPool, Arc<MemoryStore>, Arc<ManualClock>) {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::morning());
    let pool = AccountPool::new(config, store.clone(), clock.clone()).unwrap();
    (pool, store, clock)
}

fn task(n: usize, hint: Option<&str>) -> Task {
    let created = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    Task::new(
        TaskId::new(format!("T-{}", n)),
        &format!("task {}", n),
        hint,
        Some(Priority::Medium),
        created,
    )
    .unwrap()
}

fn slot(outcome: AcquireOutcome) -> Slot {
    match outcome {
        AcquireOutcome::Acquired(slot) => slot,
        AcquireOutcome::NoCapacity(reason) => panic!("expected a slot, got {:?}", reason),
    }
}

fn recorded_events(pool: &AccountPool) -> Arc<Mutex<Vec<PoolEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    pool.events()
        .subscribe(Arc::new(move |e: &PoolEvent| sink.lock().unwrap().push(e.clone())));
    seen
}

#[test]
fn test_seventh_same_domain_task_exhausts_pool() {
    let (pool, _, _) = setup(&accounts(100, 2));

    let mut holders = Vec::new();
    for n in 0..6 {
        holders.push(slot(pool.acquire(&task(n, Some("backend"))).unwrap()).account_id);
    }
    holders.sort();
    assert_eq!(holders, vec!["A", "A", "B", "B", "C", "C"]);

    let outcome = pool.acquire(&task(6, Some("backend"))).unwrap();
    assert_eq!(
        outcome,
        AcquireOutcome::NoCapacity(ExhaustionReason::ConcurrencySaturated)
    );
}

#[test]
fn test_affinity_account_preferred() {
    let (pool, _, _) = setup(&accounts(100, 5));
    assert_eq!(slot(pool.acquire(&task(1, Some("ui"))).unwrap()).account_id, "B");
    assert_eq!(slot(pool.acquire(&task(2, Some("qa"))).unwrap()).account_id, "C");
}

#[test]
fn test_generic_task_goes_to_least_utilized() {
    let (pool, _, _) = setup(&accounts(100, 5));
    slot(pool.acquire(&task(1, Some("backend"))).unwrap());
    slot(pool.acquire(&task(2, Some("backend"))).unwrap());
    slot(pool.acquire(&task(3, Some("ui"))).unwrap());

    // A has 2, B has 1, C has 0.
    assert_eq!(slot(pool.acquire(&task(4, None)).unwrap()).account_id, "C");
    assert_eq!(
        slot(pool.acquire(&task(5, Some("gardening"))).unwrap()).account_id,
        "B"
    );
}

#[test]
fn test_release_of_unheld_slot_is_noop() {
    let (pool, _, _) = setup(&accounts(100, 2));
    let held = slot(pool.acquire(&task(1, Some("backend"))).unwrap());
    let before = pool.status().unwrap();

    assert!(!pool.release("A", &TaskId::new("T-999")).unwrap());
    assert!(!pool.release("Z", &held.task_ref).unwrap());
    assert!(!pool.release("B", &held.task_ref).unwrap());

    assert_eq!(pool.status().unwrap(), before);
}

#[test]
fn test_release_keeps_daily_usage() {
    let (pool, _, _) = setup(&accounts(100, 1));
    let held = slot(pool.acquire(&task(1, Some("backend"))).unwrap());

    assert!(pool.release(&held.account_id, &held.task_ref).unwrap());
    assert!(!pool.release(&held.account_id, &held.task_ref).unwrap());

    let a = &pool.status().unwrap().accounts[0];
    assert_eq!(a.active, 0);
    assert_eq!(a.daily_used, 1);
}

#[test]
fn test_quota_exhaustion_reason() {
    let (pool, _, _) = setup(&accounts(1, 5));
    for n in 0..3 {
        slot(pool.acquire(&task(n, None)).unwrap());
    }
    assert_eq!(
        pool.acquire(&task(3, None)).unwrap(),
        AcquireOutcome::NoCapacity(ExhaustionReason::DailyQuotaReached)
    );
}

#[test]
fn test_pause_all_blocks_acquire_and_keeps_counters() {
    let (pool, _, _) = setup(&accounts(100, 5));
    slot(pool.acquire(&task(1, Some("backend"))).unwrap());

    pool.pause_all().unwrap();
    assert!(pool.is_paused());
    assert_eq!(
        pool.acquire(&task(2, Some("backend"))).unwrap(),
        AcquireOutcome::NoCapacity(ExhaustionReason::AllPaused)
    );
    assert_eq!(pool.status().unwrap().total_used, 1);

    pool.resume_all().unwrap();
    assert!(!pool.is_paused());
    assert_eq!(slot(pool.acquire(&task(3, Some("backend"))).unwrap()).account_id, "A");
}

#[test]
fn test_pause_holds_release_in_any_order() {
    let (pool, store, clock) = setup(&accounts(100, 5));
    let seen = recorded_events(&pool);

    assert!(pool.hold("thermal").unwrap());
    assert!(!pool.hold("thermal").unwrap());
    assert!(pool.hold("recovery").unwrap());
    assert!(!pool.release_hold("thermal").unwrap());
    assert!(pool.is_paused());

    // A fresh process sees the remaining hold and can lift it.
    let reopened = AccountPool::new(&accounts(100, 5), store, clock).unwrap();
    assert_eq!(reopened.holds(), vec!["recovery".to_string()]);
    assert!(!reopened.release_hold("operator").unwrap());
    assert!(reopened.release_hold("recovery").unwrap());
    assert!(!reopened.is_paused());
    assert!(reopened.status().unwrap().pause_holds.is_empty());

    let pauses = seen
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, PoolEvent::Paused { account_id: None }))
        .count();
    assert_eq!(pauses, 2);
}

#[test]
fn test_resume_all_drops_every_hold() {
    let (pool, _, _) = setup(&accounts(100, 5));
    pool.hold("thermal").unwrap();
    pool.hold("operator").unwrap();
    pool.resume_all().unwrap();
    assert!(pool.holds().is_empty());
    assert!(!pool.is_paused());
    assert!(!pool.release_hold("thermal").unwrap());
}

#[test]
fn test_lifting_a_hold_keeps_account_paused_on_its_own() {
    let (pool, _, _) = setup(&accounts(100, 5));
    pool.pause_account("B").unwrap();
    pool.hold("thermal").unwrap();
    assert!(pool.status().unwrap().accounts.iter().all(|a| a.paused));

    assert!(pool.release_hold("thermal").unwrap());
    let status = pool.status().unwrap();
    assert!(!status.accounts[0].paused);
    assert!(status.accounts[1].paused);
    assert!(!pool.is_paused());

    for n in 0..4 {
        let held = slot(pool.acquire(&task(n, Some("frontend"))).unwrap());
        assert_ne!(held.account_id, "B");
    }

    // Resuming the whole pool clears the account pause too.
    pool.resume_all().unwrap();
    assert!(!pool.status().unwrap().accounts[1].paused);
}

#[test]
fn test_exhaustion_reason_mixed_when_blockers_differ() {
    let config = PoolConfig {
        accounts: vec![
            AccountConfig::new("A", vec![Domain::Backend], 1).with_limits(1, 5),
            AccountConfig::new("B", vec![Domain::Frontend], 2).with_limits(100, 5),
        ],
        ..PoolConfig::default()
    };
    let (pool, _, _) = setup(&config);
    slot(pool.acquire(&task(1, Some("backend"))).unwrap());
    pool.pause_account("B").unwrap();

    assert_eq!(
        pool.acquire(&task(2, Some("backend"))).unwrap(),
        AcquireOutcome::NoCapacity(ExhaustionReason::Mixed)
    );
}

#[test]
fn test_pause_single_account_reroutes() {
    let (pool, _, _) = setup(&accounts(100, 5));
    assert!(pool.pause_account("A").unwrap());
    assert!(!pool.pause_account("nope").unwrap());

    let held = slot(pool.acquire(&task(1, Some("backend"))).unwrap());
    assert_ne!(held.account_id, "A");

    assert!(pool.resume_account("A").unwrap());
    assert_eq!(slot(pool.acquire(&task(2, Some("backend"))).unwrap()).account_id, "A");
}

#[test]
fn test_daily_reset_clears_usage_but_keeps_slots() {
    let (pool, _, clock) = setup(&accounts(2, 5));
    let events = recorded_events(&pool);
    slot(pool.acquire(&task(1, Some("backend"))).unwrap());
    slot(pool.acquire(&task(2, Some("backend"))).unwrap());
    pool.record_last_resort_delegation().unwrap();

    assert!(!pool.check_daily_reset().unwrap());
    clock.set(Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 1).unwrap());
    assert!(pool.check_daily_reset().unwrap());

    let status = pool.status().unwrap();
    assert_eq!(status.date_key, "2026-03-02");
    assert_eq!(status.accounts[0].daily_used, 0);
    assert_eq!(status.accounts[0].active, 2);
    assert_eq!(status.last_resort_delegations, 0);
    assert!(events.lock().unwrap().contains(&PoolEvent::DailyReset {
        date_key: "2026-03-02".to_string()
    }));
}

#[test]
fn test_reset_applies_on_first_acquire_of_new_day() {
    let (pool, _, clock) = setup(&accounts(1, 5));
    for n in 0..3 {
        slot(pool.acquire(&task(n, None)).unwrap());
    }
    clock.advance_ms(24 * 60 * 60 * 1000);
    assert!(matches!(
        pool.acquire(&task(9, None)).unwrap(),
        AcquireOutcome::Acquired(_)
    ));
}

#[test]
fn test_usage_survives_restart() {
    let config = accounts(100, 5);
    let (pool, store, clock) = setup(&config);
    slot(pool.acquire(&task(1, Some("backend"))).unwrap());
    pool.pause_account("C").unwrap();
    drop(pool);

    let restarted = AccountPool::new(&config, store, clock).unwrap();
    let status = restarted.status().unwrap();
    assert_eq!(status.accounts[0].daily_used, 1);
    assert_eq!(status.accounts[0].slots.len(), 1);
    assert!(status.accounts[2].paused);
}

#[test]
fn test_events_published() {
    let (pool, _, _) = setup(&accounts(100, 1));
    let events = recorded_events(&pool);

    let held = slot(pool.acquire(&task(1, Some("backend"))).unwrap());
    pool.release(&held.account_id, &held.task_ref).unwrap();
    pool.pause_all().unwrap();
    pool.acquire(&task(2, None)).unwrap();

    let events = events.lock().unwrap();
    assert!(matches!(
        events[0],
        PoolEvent::Acquired { ref account_id, affinity: true, .. } if account_id == "A"
    ));
    assert!(matches!(events[1], PoolEvent::Released { active: 0, .. }));
    assert_eq!(events[2], PoolEvent::Paused { account_id: None });
    assert!(matches!(
        events[3],
        PoolEvent::Exhausted { reason: ExhaustionReason::AllPaused, .. }
    ));
}

#[test]
fn test_status_message_mentions_accounts() {
    let (pool, _, _) = setup(&accounts(100, 5));
    slot(pool.acquire(&task(1, None)).unwrap());
    let message = pool.status().unwrap().message();
    assert!(message.contains("1/300 tasks today"));
    assert!(message.contains("A"));
    assert!(message.contains("Delegated to last resort today: 0"));
}

#[test]
fn test_randomized_capacity_invariants() {
    let mut rng = StdRng::seed_from_u64(0x7143);
    let hints = [Some("backend"), Some("ui"), Some("qa"), Some("docs"), None];

    for round in 0..20 {
        let quota = rng.gen_range(1..6);
        let concurrency = rng.gen_range(1..4);
        let config = accounts(quota, concurrency);
        let (pool, _, _) = setup(&config);
        let mut held: Vec<Slot> = Vec::new();

        for step in 0..60 {
            if !held.is_empty() && rng.gen_bool(0.4) {
                let idx = rng.gen_range(0..held.len());
                let s = held.swap_remove(idx);
                assert!(pool.release(&s.account_id, &s.task_ref).unwrap());
            } else {
                let hint = hints[rng.gen_range(0..hints.len())];
                let t = task(round * 100 + step, hint);
                if let AcquireOutcome::Acquired(s) = pool.acquire(&t).unwrap() {
                    held.push(s);
                }
            }

            for a in pool.status().unwrap().accounts {
                assert!(a.active <= a.concurrency_limit as usize);
                assert!(a.daily_used <= a.daily_quota);
            }
        }
    }
}

#[test]
fn test_randomized_affinity_routing() {
    let mut rng = StdRng::seed_from_u64(42);
    let domains = [
        (Domain::Backend, "backend"),
        (Domain::Frontend, "ui"),
        (Domain::Quality, "qa"),
    ];

    for round in 0..50 {
        let config = accounts(rng.gen_range(2..10), rng.gen_range(1..4));
        let (pool, _, _) = setup(&config);

        for step in 0..10 {
            let (domain, hint) = domains[rng.gen_range(0..domains.len())];
            let before = pool.status().unwrap();
            let matching_has_room = config
                .accounts
                .iter()
                .zip(&before.accounts)
                .any(|(c, s)| {
                    c.domains.contains(&domain)
                        && s.daily_used < s.daily_quota
                        && s.active < s.concurrency_limit as usize
                });

            let outcome = pool.acquire(&task(round * 100 + step, Some(hint))).unwrap();
            if matching_has_room {
                let s = slot(outcome);
                let owner = config.accounts.iter().find(|c| c.id == s.account_id).unwrap();
                assert!(owner.domains.contains(&domain));
            }
        }
    }
}
