//! Single-flight orchestrator split into focused submodules.
//!
//! The `Orchestrator` struct and its methods are organized by domain:
//! - [`control`] - Submission, admission and operator actions (start/stop/delete/clear)
//! - [`run`] - The worker: engine invocation, finalization and queue draining
//! - [`lifecycle`] - Startup recovery and shutdown coordination
//!
//! At most one task runs per orchestrator. Admission is a single slot behind a
//! mutex: whoever fills it owns the run until the worker finalizes the task or
//! an operator stops it.

mod control;
mod lifecycle;
mod run;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use control::STOPPED_RESULT;
pub use lifecycle::INTERRUPTED_RESULT;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::db::Database;
use crate::engine::ProcessingEngine;
use crate::error::{Error, Result};
use crate::events::EventChannel;
use crate::queue::TaskQueue;
use crate::types::{Event, Task, TaskCounts, TaskId};

/// The run currently holding the worker
#[derive(Debug)]
pub(crate) struct ActiveRun {
    /// Task being processed
    pub(crate) task_id: TaskId,
    /// Distinguishes successive runs, so a stopped run can't finalize a later one
    pub(crate) run_id: u64,
    /// Cancelled when an operator stops the run
    pub(crate) cancel_token: CancellationToken,
}

/// Admission and shutdown state shared by every clone
#[derive(Clone)]
pub(crate) struct WorkerState {
    /// The single admission slot (`Some` while a task is running)
    pub(crate) active: Arc<tokio::sync::Mutex<Option<ActiveRun>>>,
    /// Whether new work is accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Source of run IDs
    pub(crate) next_run_id: Arc<AtomicU64>,
}

impl WorkerState {
    pub(crate) fn new() -> Self {
        Self {
            active: Arc::new(tokio::sync::Mutex::new(None)),
            accepting_new: Arc::new(AtomicBool::new(true)),
            next_run_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub(crate) fn is_accepting(&self) -> bool {
        self.accepting_new.load(Ordering::SeqCst)
    }

    pub(crate) fn allocate_run_id(&self) -> u64 {
        self.next_run_id.fetch_add(1, Ordering::SeqCst)
    }
}

/// Persistent task queue with a single-flight worker (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Orchestrator {
    /// Task store (public for integration tests to inspect rows)
    pub db: Arc<Database>,
    pub(crate) queue: TaskQueue,
    pub(crate) events: EventChannel,
    pub(crate) config: Arc<Config>,
    pub(crate) engine: Arc<dyn ProcessingEngine>,
    pub(crate) worker: WorkerState,
}

impl Orchestrator {
    /// Create an orchestrator
    ///
    /// Opens (or creates) the task database, fails tasks left Running by a
    /// previous process (see [`OrchestratorConfig::fail_stale_running`]) and
    /// schedules startup recovery, which drains Pending tasks once
    /// `startup_delay` has elapsed.
    ///
    /// [`OrchestratorConfig::fail_stale_running`]: crate::config::OrchestratorConfig::fail_stale_running
    pub async fn new(config: Config, engine: Arc<dyn ProcessingEngine>) -> Result<Self> {
        config.validate()?;
        let db = Database::new(&config.persistence.database_path).await?;
        Self::with_database(Arc::new(db), config, engine).await
    }

    /// Create an orchestrator over an already opened database
    pub async fn with_database(
        db: Arc<Database>,
        config: Config,
        engine: Arc<dyn ProcessingEngine>,
    ) -> Result<Self> {
        config.validate()?;

        let orchestrator = Self {
            queue: TaskQueue::new(db.clone()),
            db,
            events: EventChannel::new(config.orchestrator.event_capacity),
            config: Arc::new(config),
            engine,
            worker: WorkerState::new(),
        };

        if orchestrator.config.orchestrator.fail_stale_running {
            orchestrator.fail_stale_running().await?;
        }
        orchestrator.spawn_startup_recovery();

        tracing::info!(
            engine = orchestrator.engine.name(),
            database = %orchestrator.config.persistence.database_path.display(),
            "Orchestrator initialized"
        );

        Ok(orchestrator)
    }

    /// Subscribe to progress, log and finished events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Subscribe as a stream that skips (and logs) lag gaps
    pub fn event_stream(&self) -> impl tokio_stream::Stream<Item = Event> + Send + 'static {
        self.events.stream()
    }

    /// The configuration this orchestrator was created with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The oldest Pending task, if any
    pub async fn next_pending(&self) -> Result<Option<Task>> {
        self.queue.next_pending().await
    }

    /// Every task, most recently created first
    pub async fn tasks(&self) -> Result<Vec<Task>> {
        self.db.list_tasks().await
    }

    /// One task by ID
    pub async fn task(&self, id: TaskId) -> Result<Task> {
        self.db.get_task(id).await?.ok_or(Error::NotFound(id))
    }

    /// Number of tasks per status
    pub async fn counts(&self) -> Result<TaskCounts> {
        self.db.count_tasks_by_status().await
    }

    /// Whether a task currently holds the worker
    pub async fn is_processing(&self) -> bool {
        self.worker.active.lock().await.is_some()
    }

    /// The task currently holding the worker
    pub async fn current_task(&self) -> Option<TaskId> {
        self.worker.active.lock().await.as_ref().map(|run| run.task_id)
    }
}
