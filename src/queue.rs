//! FIFO submission and selection over the task store.
//!
//! The queue holds no state of its own. "Next" means the oldest Pending task,
//! so as long as nothing is re-inserted at the head no task starves.

use std::sync::Arc;

use chrono::Utc;

use crate::config::ProcessingConfig;
use crate::db::{Database, NewTask};
use crate::error::{Error, Result};
use crate::types::{Task, TaskId, TaskStatus};

/// Submission and pending selection
#[derive(Clone)]
pub struct TaskQueue {
    db: Arc<Database>,
}

impl TaskQueue {
    /// Create a queue over `db`
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Enqueue `url` with an immutable snapshot of `config`
    ///
    /// Rejects an empty or whitespace-only URL and an invalid configuration
    /// with [`Error::Validation`] before anything is persisted.
    pub async fn submit(&self, url: &str, config: &ProcessingConfig) -> Result<TaskId> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::Validation("url must not be empty".to_string()));
        }
        config.validate()?;

        let new_task = NewTask {
            url: url.to_string(),
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            config_snapshot: config.to_snapshot()?,
        };

        let id = self.db.insert_task(&new_task).await?;
        tracing::debug!(task_id = id.0, url = %new_task.url, "Task queued");
        Ok(id)
    }

    /// The oldest Pending task, if any
    pub async fn next_pending(&self) -> Result<Option<Task>> {
        self.db.next_pending_task().await
    }

    /// Remove every task; irreversible
    ///
    /// Returns the number of tasks removed.
    pub async fn clear(&self) -> Result<u64> {
        let removed = self.db.clear_tasks().await?;
        tracing::info!(removed, "Task queue cleared");
        Ok(removed)
    }
}
