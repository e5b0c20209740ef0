//! Task CRUD operations and pending selection.
//!
//! Every method is a single statement against the pool, so each one commits
//! on its own and no lock is held between calls.

use crate::error::DatabaseError;
use crate::types::{Task, TaskCounts, TaskId, TaskStatus};
use crate::{Error, Result};
use sqlx::{QueryBuilder, Sqlite};

use super::{Database, NewTask, TaskRow, TaskUpdate, encode_timestamp};

const TASK_COLUMNS: &str =
    "id, url, status, created_at, started_at, completed_at, result, output_path, config";

impl Database {
    /// Insert a new task record and return its assigned ID
    pub async fn insert_task(&self, task: &NewTask) -> Result<TaskId> {
        let result = sqlx::query(
            r#"
            INSERT INTO tasks (url, status, created_at, result, output_path, config)
            VALUES (?, ?, ?, '', '', ?)
            "#,
        )
        .bind(&task.url)
        .bind(task.status.as_str())
        .bind(encode_timestamp(task.created_at))
        .bind(&task.config_snapshot)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert task: {}",
                e
            )))
        })?;

        Ok(TaskId(result.last_insert_rowid()))
    }

    /// Apply a partial update to a task
    ///
    /// Returns [`DatabaseError::NotFound`] if no task has this ID.
    pub async fn update_task(&self, id: TaskId, update: &TaskUpdate) -> Result<()> {
        if update.is_empty() {
            return match self.get_task(id).await? {
                Some(_) => Ok(()),
                None => Err(task_not_found(id)),
            };
        }

        let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new("UPDATE tasks SET ");
        {
            let mut fields = query.separated(", ");
            if let Some(status) = update.status {
                fields.push("status = ");
                fields.push_bind_unseparated(status.as_str());
            }
            if let Some(started_at) = update.started_at {
                fields.push("started_at = ");
                fields.push_bind_unseparated(encode_timestamp(started_at));
            }
            if let Some(completed_at) = update.completed_at {
                fields.push("completed_at = ");
                fields.push_bind_unseparated(encode_timestamp(completed_at));
            }
            if let Some(result) = &update.result {
                fields.push("result = ");
                fields.push_bind_unseparated(result.clone());
            }
            if let Some(output_path) = &update.output_path {
                fields.push("output_path = ");
                fields.push_bind_unseparated(output_path.clone());
            }
        }
        query.push(" WHERE id = ");
        query.push_bind(id);

        let result = query.build().execute(&self.pool).await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update task: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(task_not_found(id));
        }

        Ok(())
    }

    /// Get a task by ID
    pub async fn get_task(&self, id: TaskId) -> Result<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {} FROM tasks WHERE id = ?",
            TASK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get task: {}",
                e
            )))
        })?;

        row.map(Task::try_from).transpose()
    }

    /// List all tasks, most recently created first
    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {} FROM tasks ORDER BY created_at DESC, id DESC",
            TASK_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list tasks: {}",
                e
            )))
        })?;

        rows.into_iter().map(Task::try_from).collect()
    }

    /// List tasks with a specific status, oldest first
    pub async fn list_tasks_by_status(&self, status: TaskStatus) -> Result<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {} FROM tasks WHERE status = ? ORDER BY created_at ASC, id ASC",
            TASK_COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list tasks by status: {}",
                e
            )))
        })?;

        rows.into_iter().map(Task::try_from).collect()
    }

    /// The Pending task with the smallest `created_at`, ties broken by smallest ID
    pub async fn next_pending_task(&self) -> Result<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {} FROM tasks WHERE status = 'pending' \
             ORDER BY created_at ASC, id ASC LIMIT 1",
            TASK_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get next pending task: {}",
                e
            )))
        })?;

        row.map(Task::try_from).transpose()
    }

    /// ID of the task [`next_pending_task`](Self::next_pending_task) would select
    ///
    /// Reads only the key, so it works even when the row itself cannot be decoded.
    pub async fn next_pending_task_id(&self) -> Result<Option<TaskId>> {
        sqlx::query_scalar::<_, TaskId>(
            "SELECT id FROM tasks WHERE status = 'pending' \
             ORDER BY created_at ASC, id ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get next pending task id: {}",
                e
            )))
        })
    }

    /// Number of tasks per status
    pub async fn count_tasks_by_status(&self) -> Result<TaskCounts> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM tasks GROUP BY status")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to count tasks: {}",
                        e
                    )))
                })?;

        let mut counts = TaskCounts::default();
        for (status, count) in rows {
            let count = count.max(0) as u64;
            match TaskStatus::parse(&status) {
                Some(TaskStatus::Pending) => counts.pending = count,
                Some(TaskStatus::Running) => counts.running = count,
                Some(TaskStatus::Completed) => counts.completed = count,
                Some(TaskStatus::Failed) => counts.failed = count,
                None => {
                    tracing::warn!(status = %status, count, "Ignoring tasks with unknown status");
                }
            }
        }

        Ok(counts)
    }

    /// Delete a task permanently
    ///
    /// Returns whether a row was removed.
    pub async fn delete_task(&self, id: TaskId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete task: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete every task permanently
    ///
    /// Returns the number of rows removed. Clearing an empty store is a no-op.
    pub async fn clear_tasks(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM tasks")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to clear tasks: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected())
    }
}

fn task_not_found(id: TaskId) -> Error {
    Error::Database(DatabaseError::NotFound(format!("Task {} not found", id)))
}
