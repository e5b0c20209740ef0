//! Startup recovery and shutdown coordination.

use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::Utc;

use crate::db::TaskUpdate;
use crate::error::Result;
use crate::types::TaskStatus;

use super::Orchestrator;

/// Result text of a task found Running when the orchestrator starts
pub const INTERRUPTED_RESULT: &str = "interrupted: process exited while task was running";

/// Interval between checks while shutdown waits for the running task
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

impl Orchestrator {
    /// Fail tasks left Running by a previous process
    ///
    /// Nothing can be running on a fresh orchestrator, so every Running row is
    /// stale. They are never re-run. Returns the number of tasks failed.
    pub(crate) async fn fail_stale_running(&self) -> Result<usize> {
        let stale = self.db.list_tasks_by_status(TaskStatus::Running).await?;

        for task in &stale {
            let update =
                TaskUpdate::finished(TaskStatus::Failed, Utc::now(), INTERRUPTED_RESULT, "");
            self.db.update_task(task.id, &update).await?;
            tracing::warn!(
                task_id = task.id.0,
                url = %task.url,
                "Task was running when the previous process exited, marked failed"
            );
        }

        if !stale.is_empty() {
            tracing::info!(count = stale.len(), "Failed interrupted tasks from previous run");
        }

        Ok(stale.len())
    }

    /// Drain Pending tasks left by a previous process once the grace delay has elapsed
    pub(crate) fn spawn_startup_recovery(&self) -> tokio::task::JoinHandle<()> {
        let orchestrator = self.clone();
        let delay = self.config.orchestrator.startup_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            orchestrator.recover_pending().await;
        })
    }

    async fn recover_pending(&self) {
        match self.admit_next().await {
            Some(run) => {
                tracing::info!(task_id = run.task.id.0, "Resuming pending tasks from queue");
                self.events.log_global("resuming pending tasks");
                self.spawn_worker(run);
            }
            None => {
                tracing::debug!("Startup recovery found nothing to start");
            }
        }
    }

    /// Gracefully shut down the orchestrator
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting submissions and stops draining the queue
    /// 2. Waits up to `shutdown_timeout` for the running task to finish
    /// 3. Closes the database pool
    ///
    /// A task still running after the timeout stays Running in the store and is
    /// failed as interrupted on the next start. Afterwards submissions return
    /// [`Error::ShuttingDown`](crate::Error::ShuttingDown).
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.worker.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new tasks");
        self.events.log_global("shutting down");

        let shutdown_timeout = self.config.orchestrator.shutdown_timeout;
        match tokio::time::timeout(shutdown_timeout, self.wait_for_idle()).await {
            Ok(()) => {
                tracing::info!("Worker idle");
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = shutdown_timeout.as_secs(),
                    "Timeout waiting for running task, proceeding with shutdown"
                );
            }
        }

        self.db.close().await;

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Wait until no task holds the worker
    async fn wait_for_idle(&self) {
        loop {
            let running = self.current_task().await;

            let Some(task_id) = running else {
                return;
            };

            tracing::debug!(task_id = task_id.0, "Waiting for running task to finish");
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
        }
    }
}
