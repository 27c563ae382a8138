//! The tokio maintenance loop against a real engine and a manual clock.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;

use test_fixtures::{epoch, ManualClock};
use tiergate_core::config::TierGateConfig;
use tiergate_core::models::{IssueCardRequest, SubscriptionStatus};
use tiergate_service::{spawn_maintenance, MaintenanceHandle, MaintenanceSnapshot, TierGate};
use tiergate_storage::StorageEngine;

fn gate_with_clock() -> (Arc<ManualClock>, Arc<TierGate>) {
    let clock = Arc::new(ManualClock::default());
    let mut config = TierGateConfig::default();
    config.subscriptions.expiry_sweep_interval_secs = 3600;
    config.quota.reclaim_interval_secs = 3600;
    let gate = TierGate::new(
        Arc::new(StorageEngine::open_in_memory().unwrap()),
        clock.clone(),
        config,
    )
    .unwrap();
    (clock, Arc::new(gate))
}

async fn wait_until(handle: &MaintenanceHandle, done: impl Fn(MaintenanceSnapshot) -> bool) {
    for _ in 0..200 {
        if done(handle.snapshot()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("maintenance did not progress: {:?}", handle.snapshot());
}

#[tokio::test]
async fn first_tick_sweeps_and_reclaims() {
    let (clock, gate) = gate_with_clock();

    gate.issue_card(IssueCardRequest::new("PRO", 1).with_code("MAINT-PRO"))
        .unwrap();
    let sub = gate.redeem_card("MAINT-PRO", 1, epoch()).unwrap().subscription;
    gate.check_and_consume(1, epoch()).unwrap();
    clock.advance(TimeDelta::days(3));

    let handle = spawn_maintenance(Arc::clone(&gate));
    wait_until(&handle, |s| s.sweeps >= 1 && s.reclaims >= 1).await;
    let snapshot = handle.shutdown().await;
    assert_eq!(snapshot.failures, 0);

    let history = gate.subscriptions(1).unwrap();
    assert_eq!(history[0].id, sub.id);
    assert_eq!(history[0].status, SubscriptionStatus::Expired);
    assert!(gate.quota_window(1, epoch()).unwrap().is_none());
}

#[tokio::test]
async fn shutdown_stops_the_loop() {
    let (_clock, gate) = gate_with_clock();
    let handle = spawn_maintenance(Arc::clone(&gate));
    wait_until(&handle, |s| s.sweeps >= 1 && s.reclaims >= 1).await;
    let stopped = handle.shutdown().await;

    // Intervals are an hour; nothing else runs after shutdown.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(stopped.sweeps, 1);
    assert_eq!(stopped.reclaims, 1);
}
