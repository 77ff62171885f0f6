use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::error::{SchedulerError, TaskError};
use crate::policy::{OneShotPolicy, OneShotPolicyConfiguration, Policy};
use crate::scheduler::Scheduler;
use crate::task::Task;
use crate::types::SchedulerConfig;

struct MockTask {
    runs: Arc<AtomicUsize>,
}

impl Task for MockTask {
    fn name(&self) -> &str {
        "mock"
    }
    fn run(&self) -> Result<(), TaskError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn policy(name: &str, fire_at: i64) -> (Arc<OneShotPolicy>, Arc<AtomicUsize>) {
    let runs = Arc::new(AtomicUsize::new(0));
    let policy = Arc::new(OneShotPolicy::new(name, OneShotPolicyConfiguration { fire_at }));
    policy
        .attach_tasks(vec![Arc::new(MockTask { runs: runs.clone() })])
        .unwrap();
    (policy, runs)
}

fn later() -> i64 {
    Utc::now().timestamp() + 3600
}

async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..50 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

#[test]
fn zero_queue_size_is_rejected() {
    let err = Scheduler::new(SchedulerConfig { queue_size: 0 }).err().unwrap();
    assert!(matches!(err, SchedulerError::EmptyConfiguration));
}

#[tokio::test]
async fn schedule_validates_policy() {
    let scheduler = Scheduler::new(SchedulerConfig::default()).unwrap();

    let (blank, _) = policy("  ", later());
    let err = scheduler.schedule(blank).unwrap_err();
    assert_eq!(err.to_string(), "Policy should be assigned a name");

    let bare = Arc::new(OneShotPolicy::new("bare", OneShotPolicyConfiguration { fire_at: later() }));
    let err = scheduler.schedule(bare).unwrap_err();
    assert_eq!(err.to_string(), "Policy must attach task(s)");

    let (first, _) = policy("dup", later());
    let (second, _) = policy("dup", later());
    scheduler.schedule(first).unwrap();
    let err = scheduler.schedule(second).unwrap_err();
    assert_eq!(err.to_string(), "Duplicated policy: dup");

    scheduler.unschedule("dup").await.unwrap();
}

#[tokio::test]
async fn unschedule_validates_name() {
    let scheduler = Scheduler::new(SchedulerConfig::default()).unwrap();

    let err = scheduler.unschedule("").await.unwrap_err();
    assert_eq!(err.to_string(), "Empty policy name is invalid");

    let err = scheduler.unschedule("ghost").await.unwrap_err();
    assert_eq!(err.to_string(), "Policy ghost is not existing");
}

#[tokio::test]
async fn queries_reflect_the_store() {
    let scheduler = Scheduler::new(SchedulerConfig::default()).unwrap();
    let (p, _) = policy("nightly", later());
    scheduler.schedule(p.clone()).unwrap();

    assert!(scheduler.has_scheduled("nightly"));
    assert!(!scheduler.has_scheduled("weekly"));
    assert_eq!(scheduler.policy_names(), vec!["nightly".to_string()]);
    let found = scheduler.get_policy("nightly").unwrap();
    assert!(found.equal(p.as_ref()));
    assert!(scheduler.get_policy("weekly").is_none());

    scheduler.unschedule("nightly").await.unwrap();
    assert!(!scheduler.has_scheduled("nightly"));
    assert!(!p.is_enabled());
}

#[tokio::test]
async fn start_and_stop_are_idempotent() {
    let scheduler = Scheduler::new(SchedulerConfig::default()).unwrap();
    assert!(!scheduler.is_running());

    scheduler.start();
    scheduler.start();
    assert!(scheduler.is_running());

    scheduler.stop().await;
    scheduler.stop().await;
    assert!(!scheduler.is_running());
}

#[tokio::test(flavor = "multi_thread")]
async fn policy_count_tracks_schedule_and_unschedule() {
    let scheduler = Scheduler::new(SchedulerConfig::default()).unwrap();
    scheduler.start();

    for name in ["a", "b", "c"] {
        let (p, _) = policy(name, later());
        scheduler.schedule(p).unwrap();
    }
    assert!(eventually(|| scheduler.stats().policy_count == 3).await);

    scheduler.unschedule("b").await.unwrap();
    assert!(eventually(|| scheduler.stats().policy_count == 2).await);

    scheduler.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn completed_policy_is_unscheduled_by_daemon() {
    let scheduler = Scheduler::new(SchedulerConfig::default()).unwrap();
    scheduler.start();

    let (p, runs) = policy("once", Utc::now().timestamp() - 1);
    scheduler.schedule(p).unwrap();

    assert!(eventually(|| !scheduler.has_scheduled("once")).await);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(
        eventually(|| {
            let stats = scheduler.stats();
            stats.policy_count == 0 && stats.tasks == 1 && stats.completed_tasks == 1
        })
        .await
    );

    scheduler.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_tears_down_and_restart_accepts_policies() {
    let scheduler = Scheduler::new(SchedulerConfig::default()).unwrap();
    scheduler.start();

    let (p, _) = policy("long", later());
    scheduler.schedule(p.clone()).unwrap();
    scheduler.stop().await;

    assert!(!scheduler.has_scheduled("long"));
    assert!(!p.is_enabled());
    assert_eq!(scheduler.stats().policy_count, 0);

    scheduler.start();
    let (again, _) = policy("long", later());
    scheduler.schedule(again).unwrap();
    assert!(eventually(|| scheduler.stats().policy_count == 1).await);
    scheduler.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn policy_count_matches_store_after_restart_with_full_queue() {
    let scheduler = Scheduler::new(SchedulerConfig { queue_size: 1 }).unwrap();

    for round in 0..5 {
        scheduler.start();
        for i in 0..8 {
            let (p, _) = policy(&format!("p-{}-{}", round, i), later());
            scheduler.schedule(p).unwrap();
        }
        scheduler.stop().await;

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(
            eventually(|| scheduler.stats().policy_count == scheduler.policy_names().len() as u64).await,
            "round {}: policy_count={} store_size={}",
            round,
            scheduler.stats().policy_count,
            scheduler.policy_names().len()
        );

        let (p, _) = policy(&format!("kept-{}", round), later());
        scheduler.schedule(p).unwrap();
        assert!(eventually(|| scheduler.stats().policy_count == 1).await);
        scheduler.stop().await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn schedule_racing_stop_leaves_no_orphans() {
    let scheduler = Scheduler::new(SchedulerConfig::default()).unwrap();
    scheduler.start();

    let producer = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            let mut created = Vec::new();
            for i in 0..200 {
                let (p, _) = policy(&format!("race-{}", i), later());
                scheduler.schedule(p.clone()).unwrap();
                created.push(p);
                tokio::task::yield_now().await;
            }
            created
        })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;
    scheduler.stop().await;
    let created = producer.await.unwrap();

    // Whatever survived teardown is still live; whatever was removed is disabled.
    for p in &created {
        assert_eq!(scheduler.has_scheduled(p.name()), p.is_enabled(), "{}", p.name());
    }
    for name in scheduler.policy_names() {
        scheduler.unschedule(&name).await.unwrap();
    }
    assert!(created.iter().all(|p| !p.is_enabled()));
}
