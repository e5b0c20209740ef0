//! Submission, admission and operator actions.

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::config::ProcessingConfig;
use crate::db::{TaskUpdate, store_precision};
use crate::error::{Error, Result};
use crate::types::{Event, Task, TaskId, TaskStatus};

use super::{ActiveRun, Orchestrator};

/// Result text of a task stopped by an operator
pub const STOPPED_RESULT: &str = "stopped by operator";

/// A task that has been admitted and moved to Running
pub(crate) struct AdmittedRun {
    pub(crate) task: Task,
    pub(crate) run_id: u64,
    pub(crate) cancel_token: CancellationToken,
}

impl Orchestrator {
    /// Queue `url` with the default processing configuration
    ///
    /// The task only waits in the queue; use [`start_processing`](Self::start_processing)
    /// to start the worker, or [`submit_and_run`](Self::submit_and_run) to process it right away.
    pub async fn submit(&self, url: &str) -> Result<TaskId> {
        self.submit_with(url, &self.config.processing).await
    }

    /// Queue `url` with an explicit processing configuration
    ///
    /// The configuration is snapshotted; later changes to `config` don't
    /// affect the queued task.
    pub async fn submit_with(&self, url: &str, config: &ProcessingConfig) -> Result<TaskId> {
        self.ensure_accepting()?;

        let id = self.queue.submit(url, config).await?;
        self.events.log(id, format!("task {} queued: {}", id, url.trim()));

        Ok(id)
    }

    /// Run a Pending task on the worker
    ///
    /// Fails with [`Error::Busy`] and changes nothing if a task is already
    /// running. Otherwise the task is Running when this returns and the engine
    /// call proceeds in the background. After it finishes the worker keeps
    /// draining the queue oldest-first.
    pub async fn run_task(&self, task: &Task) -> Result<()> {
        self.ensure_accepting()?;

        let run = {
            let mut slot = self.worker.active.lock().await;
            self.admit_locked(&mut slot, task.id).await?
        };

        self.spawn_worker(run);
        Ok(())
    }

    /// Start the worker on the oldest Pending task
    ///
    /// Returns the started task, or `None` if the queue is empty.
    pub async fn start_processing(&self) -> Result<Option<TaskId>> {
        self.ensure_accepting()?;

        let run = {
            let mut slot = self.worker.active.lock().await;
            if let Some(active) = slot.as_ref() {
                return Err(Error::Busy {
                    running: active.task_id,
                });
            }

            let Some(task) = self.next_runnable().await? else {
                drop(slot);
                tracing::info!("No pending tasks to process");
                self.events.log_global("no pending tasks");
                return Ok(None);
            };

            self.admit_locked(&mut slot, task.id).await?
        };

        let id = run.task.id;
        self.spawn_worker(run);
        Ok(Some(id))
    }

    /// Queue `url` and process it immediately, ahead of older Pending tasks
    ///
    /// Fails with [`Error::Busy`] before anything is persisted if a task is
    /// already running.
    pub async fn submit_and_run(&self, url: &str) -> Result<TaskId> {
        self.ensure_accepting()?;

        let run = {
            let mut slot = self.worker.active.lock().await;
            if let Some(active) = slot.as_ref() {
                return Err(Error::Busy {
                    running: active.task_id,
                });
            }

            let id = self.queue.submit(url, &self.config.processing).await?;
            self.events.log(id, format!("task {} queued: {}", id, url.trim()));
            self.admit_locked(&mut slot, id).await?
        };

        let id = run.task.id;
        self.spawn_worker(run);
        Ok(id)
    }

    /// Stop a running task
    ///
    /// Marks the task Failed with the result "stopped by operator" and frees
    /// the worker immediately. The in-flight engine call is not interrupted: it
    /// runs to completion in the background and its outcome is discarded.
    /// The queue is not drained afterwards.
    ///
    /// A task left Running in the store without holding the worker (from a
    /// previous process) can be stopped the same way.
    pub async fn stop_task(&self, id: TaskId) -> Result<()> {
        let mut slot = self.worker.active.lock().await;

        match slot.take_if(|active| active.task_id == id) {
            Some(active) => {
                active.cancel_token.cancel();
                tracing::info!(task_id = id.0, run_id = active.run_id, "Stopping task");
            }
            None => {
                let task = self.db.get_task(id).await?.ok_or(Error::NotFound(id))?;
                if task.status != TaskStatus::Running {
                    return Err(Error::Validation(format!(
                        "task {} is {}, not running",
                        id, task.status
                    )));
                }
                tracing::warn!(
                    task_id = id.0,
                    "Stopping task that is running in the store but not on this worker"
                );
            }
        }

        let update = TaskUpdate::finished(TaskStatus::Failed, Utc::now(), STOPPED_RESULT, "");
        let persisted = self.db.update_task(id, &update).await;
        drop(slot);

        if let Err(e) = &persisted {
            tracing::error!(task_id = id.0, error = %e, "Failed to persist stopped task");
        }

        self.events.log(id, format!("task {} {}", id, STOPPED_RESULT));
        self.events.emit(Event::Finished {
            task_id: id,
            result: STOPPED_RESULT.to_string(),
            output_path: String::new(),
        });

        persisted
    }

    /// Delete a task permanently
    ///
    /// The running task can't be deleted ([`Error::Busy`]); stop it first.
    pub async fn delete_task(&self, id: TaskId) -> Result<()> {
        let slot = self.worker.active.lock().await;
        if let Some(active) = slot.as_ref()
            && active.task_id == id
        {
            return Err(Error::Busy { running: id });
        }

        if !self.db.delete_task(id).await? {
            return Err(Error::NotFound(id));
        }
        drop(slot);

        tracing::info!(task_id = id.0, "Task deleted");
        self.events.log(id, format!("task {} deleted", id));
        Ok(())
    }

    /// Delete every task permanently
    ///
    /// Refused with [`Error::Busy`] while a task is running. Clearing an empty
    /// queue is a no-op. Returns the number of tasks removed.
    pub async fn clear(&self) -> Result<u64> {
        let slot = self.worker.active.lock().await;
        if let Some(active) = slot.as_ref() {
            return Err(Error::Busy {
                running: active.task_id,
            });
        }

        let removed = self.queue.clear().await?;
        drop(slot);

        self.events
            .log_global(format!("task list cleared ({} removed)", removed));
        Ok(removed)
    }

    pub(crate) fn ensure_accepting(&self) -> Result<()> {
        if self.worker.is_accepting() {
            Ok(())
        } else {
            Err(Error::ShuttingDown)
        }
    }

    /// Move a Pending task to Running and fill the admission slot
    ///
    /// The caller holds the slot lock, which makes the busy check and the
    /// admission one atomic step.
    pub(crate) async fn admit_locked(
        &self,
        slot: &mut Option<ActiveRun>,
        id: TaskId,
    ) -> Result<AdmittedRun> {
        if let Some(active) = slot.as_ref() {
            return Err(Error::Busy {
                running: active.task_id,
            });
        }

        let mut task = self.db.get_task(id).await?.ok_or(Error::NotFound(id))?;
        if !task.status.can_transition_to(TaskStatus::Running) {
            return Err(Error::Validation(format!(
                "task {} is {}, only pending tasks can run",
                id, task.status
            )));
        }

        let started_at = Utc::now();
        self.db
            .update_task(id, &TaskUpdate::running(started_at))
            .await?;

        let run_id = self.worker.allocate_run_id();
        let cancel_token = CancellationToken::new();
        *slot = Some(ActiveRun {
            task_id: id,
            run_id,
            cancel_token: cancel_token.clone(),
        });

        task.status = TaskStatus::Running;
        task.started_at = Some(store_precision(started_at));

        tracing::info!(task_id = id.0, run_id, url = %task.url, "Task started");
        self.events.log(id, format!("task {} started: {}", id, task.url));

        Ok(AdmittedRun {
            task,
            run_id,
            cancel_token,
        })
    }
}
