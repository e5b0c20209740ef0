//! The worker: engine invocation, finalization and queue draining.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::db::TaskUpdate;
use crate::engine::{EngineOutput, EngineRequest};
use crate::error::{DatabaseError, EngineFault, Error};
use crate::types::{Event, Task, TaskStatus};

use super::Orchestrator;
use super::control::AdmittedRun;

/// Result text when the engine returned an artifact but no summary
const DEFAULT_SUCCESS_RESULT: &str = "completed";

/// Result text when the engine returned neither an artifact nor a summary
const DEFAULT_FAILURE_RESULT: &str = "processing produced no output";

/// Result prefix for a Pending row that could not be decoded
pub(crate) const CORRUPT_RECORD_RESULT: &str = "corrupt task record";

impl Orchestrator {
    /// Spawn the worker for an admitted run
    ///
    /// The worker processes the run, then keeps admitting the oldest Pending
    /// task until the queue is empty or another caller holds the slot.
    pub(crate) fn spawn_worker(&self, run: AdmittedRun) -> JoinHandle<()> {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.worker_loop(run).await;
        })
    }

    async fn worker_loop(&self, first: AdmittedRun) {
        let mut current = Some(first);

        while let Some(run) = current.take() {
            let outcome = self.execute(&run).await;
            if !self.finalize(&run, outcome).await {
                return;
            }
            current = self.admit_next().await;
        }

        if self.worker.is_accepting() {
            tracing::debug!("Worker idle");
        }
    }

    /// Admit the oldest Pending task if the worker is free
    pub(crate) async fn admit_next(&self) -> Option<AdmittedRun> {
        if !self.worker.is_accepting() {
            tracing::debug!("Not draining queue: shutdown in progress");
            return None;
        }

        let mut slot = self.worker.active.lock().await;
        if let Some(active) = slot.as_ref() {
            tracing::debug!(
                running = active.task_id.0,
                "Not draining queue: worker already busy"
            );
            return None;
        }

        let task = match self.next_runnable().await {
            Ok(Some(task)) => task,
            Ok(None) => {
                tracing::info!("Queue drained");
                return None;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to select next pending task");
                return None;
            }
        };

        match self.admit_locked(&mut slot, task.id).await {
            Ok(run) => Some(run),
            Err(e) => {
                tracing::error!(task_id = task.id.0, error = %e, "Failed to start next pending task");
                None
            }
        }
    }

    /// The oldest Pending task that can be decoded
    ///
    /// A Pending row that cannot be decoded is failed in place and selection
    /// moves on to the next one.
    pub(crate) async fn next_runnable(&self) -> crate::Result<Option<Task>> {
        loop {
            let reason = match self.queue.next_pending().await {
                Err(Error::Database(DatabaseError::Corrupt(reason))) => reason,
                other => return other,
            };

            let Some(id) = self.db.next_pending_task_id().await? else {
                return Ok(None);
            };
            let result = format!("{}: {}", CORRUPT_RECORD_RESULT, reason);
            tracing::error!(task_id = id.0, reason = %reason, "Failing undecodable pending task");
            let update = TaskUpdate::finished(TaskStatus::Failed, Utc::now(), result.clone(), "");
            self.db.update_task(id, &update).await?;
            self.events.log(id, format!("task {} failed: {}", id, result));
        }
    }

    /// Invoke the engine for one run on a blocking thread
    ///
    /// Panics inside the engine come back as faults. Stopping the run does not
    /// interrupt the call; the worker keeps waiting so the late outcome can be
    /// reported.
    async fn execute(&self, run: &AdmittedRun) -> Result<EngineOutput, EngineFault> {
        let task_id = run.task.id;

        let config = run.task.config().map_err(|e| {
            EngineFault::new(format!("invalid configuration snapshot: {}", e))
        })?;
        let request = EngineRequest::from_snapshot(run.task.url.clone(), &config);

        for line in request.describe() {
            self.events.log(task_id, line);
        }
        tracing::info!(
            task_id = task_id.0,
            engine = self.engine.name(),
            url = %request.url,
            output_dir = %request.output_dir.display(),
            "Invoking processing engine"
        );

        let engine = Arc::clone(&self.engine);
        let events = self.events.clone();
        let mut call = tokio::task::spawn_blocking(move || {
            let mut forward = |percent: u8, status: &str| events.progress(task_id, percent, status);
            engine.process(&request, &mut forward)
        });

        let joined = tokio::select! {
            joined = &mut call => joined,
            _ = run.cancel_token.cancelled() => {
                tracing::warn!(
                    task_id = task_id.0,
                    "Task stopped while the engine is still running; waiting for it to return"
                );
                call.await
            }
        };

        match joined {
            Ok(outcome) => outcome,
            Err(join_err) if join_err.is_panic() => {
                Err(EngineFault::from_panic(join_err.into_panic()))
            }
            Err(join_err) => Err(EngineFault::new(format!(
                "engine call aborted: {}",
                join_err
            ))),
        }
    }

    /// Persist the outcome of a run and free the worker
    ///
    /// Returns false if the run lost its slot to an operator stop; the late
    /// outcome is then logged and discarded, and the worker must not drain.
    async fn finalize(
        &self,
        run: &AdmittedRun,
        outcome: Result<EngineOutput, EngineFault>,
    ) -> bool {
        let task_id = run.task.id;

        let (status, result, output_path) = match outcome {
            Ok(output) if output.is_success() => (
                TaskStatus::Completed,
                non_empty(output.summary, DEFAULT_SUCCESS_RESULT),
                output.output_path,
            ),
            Ok(output) => (
                TaskStatus::Failed,
                non_empty(output.summary, DEFAULT_FAILURE_RESULT),
                String::new(),
            ),
            Err(fault) => {
                tracing::error!(
                    task_id = task_id.0,
                    error = %fault,
                    trace = fault.trace().unwrap_or_default(),
                    "Processing engine fault"
                );
                (TaskStatus::Failed, fault.failure_summary(), String::new())
            }
        };

        let mut slot = self.worker.active.lock().await;
        let owns_slot = matches!(slot.as_ref(), Some(active) if active.run_id == run.run_id);
        if !owns_slot {
            drop(slot);
            tracing::warn!(
                task_id = task_id.0,
                run_id = run.run_id,
                status = %status,
                result = %result,
                "Discarding outcome of stopped task"
            );
            self.events.log(
                task_id,
                format!(
                    "task {} was stopped, discarding late outcome ({}): {}",
                    task_id, status, result
                ),
            );
            return false;
        }

        let update = TaskUpdate::finished(status, Utc::now(), result.clone(), output_path.clone());
        if let Err(e) = self.db.update_task(task_id, &update).await {
            tracing::error!(task_id = task_id.0, error = %e, "Failed to persist task outcome");
            self.events
                .log(task_id, format!("failed to save outcome of task {}: {}", task_id, e));
        }

        *slot = None;
        drop(slot);

        tracing::info!(
            task_id = task_id.0,
            status = %status,
            output_path = %output_path,
            "Task finished"
        );
        self.events.log(task_id, format!("result: {}", result));
        if !output_path.is_empty() {
            self.events.log(task_id, format!("output: {}", output_path));
        }
        self.events.emit(Event::Finished {
            task_id,
            result,
            output_path,
        });

        true
    }
}

fn non_empty(text: String, fallback: &str) -> String {
    if text.trim().is_empty() {
        fallback.to_string()
    } else {
        text
    }
}
