//! Background sweep task for a shared cache store.
//!
//! Runs `cleanup()` and `optimize()` on independent intervals. Each pass takes
//! the store lock for its whole duration, so a pass never interleaves with
//! another cache operation (including an in-flight `preload`).

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::SharedCache;

/// Lower bound for maintenance intervals (`tokio::time::interval` rejects zero).
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Owned handle to a running maintenance task. Dropping it stops the task.
pub struct MaintenanceHandle {
    task: Option<JoinHandle<()>>,
}

impl MaintenanceHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the task and wait until it has fully exited.
    pub async fn stop(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for MaintenanceHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Spawn the recurring cleanup/optimize task. Must be called inside a tokio runtime.
pub fn spawn_maintenance<T>(
    cache: SharedCache<T>,
    cleanup_every: Duration,
    optimize_every: Duration,
) -> MaintenanceHandle
where
    T: Send + 'static,
{
    let cleanup_every = cleanup_every.max(MIN_INTERVAL);
    let optimize_every = optimize_every.max(MIN_INTERVAL);

    info!(
        cleanup_ms = cleanup_every.as_millis() as u64,
        optimize_ms = optimize_every.as_millis() as u64,
        "starting cache maintenance"
    );

    let task = tokio::spawn(async move {
        let mut cleanup = interval(cleanup_every);
        let mut optimize = interval(optimize_every);
        cleanup.set_missed_tick_behavior(MissedTickBehavior::Delay);
        optimize.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Both intervals fire immediately on the first tick; skip it.
        cleanup.tick().await;
        optimize.tick().await;

        loop {
            tokio::select! {
                _ = cleanup.tick() => {
                    let removed = cache.lock().await.cleanup();
                    debug!(removed, "scheduled cache cleanup");
                }
                _ = optimize.tick() => {
                    let removed = cache.lock().await.optimize();
                    debug!(removed, "scheduled cache optimize");
                }
            }
        }
    });

    MaintenanceHandle { task: Some(task) }
}
