//! Periodic maintenance: expiry sweep and quota-window reclamation.
//!
//! Runs on the tokio runtime, two independent intervals; each step is moved to
//! the blocking pool since storage calls are synchronous. A failed step is
//! logged and counted, and the loop keeps going.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::service::TierGate;

#[derive(Debug, Default)]
struct Counters {
    sweeps: AtomicU64,
    reclaims: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time copy of the maintenance counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaintenanceSnapshot {
    pub sweeps: u64,
    pub reclaims: u64,
    pub failures: u64,
}

pub struct MaintenanceHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
    counters: Arc<Counters>,
}

impl MaintenanceHandle {
    pub fn snapshot(&self) -> MaintenanceSnapshot {
        MaintenanceSnapshot {
            sweeps: self.counters.sweeps.load(Ordering::Relaxed),
            reclaims: self.counters.reclaims.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Stop the loop and wait for an in-flight step to finish.
    pub async fn shutdown(self) -> MaintenanceSnapshot {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            error!(error = %e, "maintenance task panicked");
        }
        MaintenanceSnapshot {
            sweeps: self.counters.sweeps.load(Ordering::Relaxed),
            reclaims: self.counters.reclaims.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Sweep,
    Reclaim,
}

/// Start the maintenance loop. Both steps run once immediately, then on
/// `subscriptions.expiry_sweep_interval_secs` / `quota.reclaim_interval_secs`.
pub fn spawn_maintenance(gate: Arc<TierGate>) -> MaintenanceHandle {
    let sweep_every = Duration::from_secs(gate.config().subscriptions.expiry_sweep_interval_secs);
    let reclaim_every = Duration::from_secs(gate.config().quota.reclaim_interval_secs);
    let counters = Arc::new(Counters::default());
    let (shutdown, mut stop) = oneshot::channel::<()>();

    let task = {
        let counters = Arc::clone(&counters);
        tokio::spawn(async move {
            let mut sweep_tick = tokio::time::interval(sweep_every);
            let mut reclaim_tick = tokio::time::interval(reclaim_every);
            sweep_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            reclaim_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                sweep_secs = sweep_every.as_secs(),
                reclaim_secs = reclaim_every.as_secs(),
                "maintenance started"
            );

            loop {
                tokio::select! {
                    _ = &mut stop => break,
                    _ = sweep_tick.tick() => run_step(&gate, &counters, Step::Sweep).await,
                    _ = reclaim_tick.tick() => run_step(&gate, &counters, Step::Reclaim).await,
                }
            }
            info!("maintenance stopped");
        })
    };

    MaintenanceHandle {
        shutdown,
        task,
        counters,
    }
}

async fn run_step(gate: &Arc<TierGate>, counters: &Counters, step: Step) {
    let worker = Arc::clone(gate);
    let outcome = tokio::task::spawn_blocking(move || match step {
        Step::Sweep => worker.sweep(worker.now()).map(|stats| {
            debug!(
                expired = stats.expired_subscriptions,
                activated = stats.activated_subscriptions,
                cards = stats.expired_cards,
                "expiry sweep"
            );
        }),
        Step::Reclaim => worker.reclaim_expired_windows().map(|deleted| {
            debug!(deleted, "quota reclaim");
        }),
    })
    .await;

    match outcome {
        Ok(Ok(())) => {
            let counter = match step {
                Step::Sweep => &counters.sweeps,
                Step::Reclaim => &counters.reclaims,
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }
        Ok(Err(e)) => {
            counters.failures.fetch_add(1, Ordering::Relaxed);
            warn!(step = ?step, kind = ?e.kind(), error = %e, "maintenance step failed");
        }
        Err(e) => {
            counters.failures.fetch_add(1, Ordering::Relaxed);
            error!(step = ?step, error = %e, "maintenance step panicked");
        }
    }
}
