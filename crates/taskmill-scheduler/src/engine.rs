use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info};
use uuid::Uuid;

use taskmill_core::config::SchedulerConfig;
use taskmill_store::TaskStore;

use crate::executor;

/// Core scheduler: polls for due tasks, claims them, and dispatches each won
/// claim to a worker task.
///
/// One engine runs per process. Several processes may poll the same database
/// concurrently — `TaskStore::try_claim` is the serialization point, so a
/// task is executed by at most one of them.
pub struct SchedulerEngine {
    store: Arc<TaskStore>,
    /// Identifies this engine instance in `picked_by`.
    worker_token: String,
    poll_interval: Duration,
    batch_size: u32,
    exec_timeout: Duration,
    permits: Arc<Semaphore>,
}

impl SchedulerEngine {
    pub fn new(store: Arc<TaskStore>, config: &SchedulerConfig) -> Self {
        Self {
            store,
            worker_token: Uuid::new_v4().to_string(),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            batch_size: config.batch_size,
            exec_timeout: Duration::from_secs(config.exec_timeout_secs),
            permits: Arc::new(Semaphore::new(config.max_concurrency)),
        }
    }

    /// Main event loop. Polls on a fixed interval until `shutdown` broadcasts
    /// `true`, then drains in-flight executions before returning so no
    /// claimed task is abandoned.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(worker = %self.worker_token, "scheduler engine started");

        let mut interval = tokio::time::interval(self.poll_interval);
        let mut workers = JoinSet::new();

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick(&mut workers);
                    // Reap finished workers so the set does not grow unbounded.
                    while workers.try_join_next().is_some() {}
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }

        if !workers.is_empty() {
            info!(in_flight = workers.len(), "waiting for in-flight executions");
        }
        while workers.join_next().await.is_some() {}
        info!("scheduler engine stopped");
    }

    /// One poll cycle: fetch due candidates, claim eagerly, dispatch wins.
    ///
    /// Never blocks on execution. A failed poll or claim is logged and
    /// retried on the next tick; the loop itself does not terminate.
    fn tick(&self, workers: &mut JoinSet<()>) {
        let due = match self.store.find_due_unclaimed(Utc::now(), self.batch_size) {
            Ok(due) => due,
            Err(e) => {
                error!("due-task poll failed: {e}");
                return;
            }
        };

        for task in due {
            match self.store.try_claim(&task.id, &self.worker_token, Utc::now()) {
                Ok(true) => {
                    let store = Arc::clone(&self.store);
                    let permits = Arc::clone(&self.permits);
                    let exec_timeout = self.exec_timeout;
                    workers.spawn(async move {
                        // The claim is already ours; only execution waits for
                        // a concurrency slot.
                        let Ok(_permit) = permits.acquire_owned().await else {
                            return;
                        };
                        executor::execute(&store, &task, exec_timeout).await;
                    });
                }
                // Another worker owns the task — expected, no side effects.
                Ok(false) => {}
                Err(e) => error!(task_id = %task.id, "claim attempt failed: {e}"),
            }
        }
    }
}
