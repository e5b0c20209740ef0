//! Task store for media-queue
//!
//! Handles SQLite persistence of tasks. The store is pure CRUD and query: it
//! never validates lifecycle transitions and never caches, so every read
//! reflects the latest committed write.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`tasks`] - Task CRUD and pending selection

use crate::error::DatabaseError;
use crate::types::{Task, TaskId, TaskStatus};
use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};

mod migrations;
mod tasks;

/// New task to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewTask {
    /// Input to process
    pub url: String,
    /// Initial status (the queue always inserts Pending)
    pub status: TaskStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Serialized configuration snapshot
    pub config_snapshot: String,
}

/// Partial update of a task row
///
/// Only fields set to `Some` are written. The store does not check that the
/// resulting status transition is legal.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    /// New status
    pub status: Option<TaskStatus>,
    /// Start timestamp
    pub started_at: Option<DateTime<Utc>>,
    /// Completion timestamp
    pub completed_at: Option<DateTime<Utc>>,
    /// Outcome summary
    pub result: Option<String>,
    /// Produced artifact path
    pub output_path: Option<String>,
}

impl TaskUpdate {
    /// Pending -> Running
    pub fn running(started_at: DateTime<Utc>) -> Self {
        Self {
            status: Some(TaskStatus::Running),
            started_at: Some(started_at),
            ..Default::default()
        }
    }

    /// Running -> Completed/Failed with the outcome
    pub fn finished(
        status: TaskStatus,
        completed_at: DateTime<Utc>,
        result: impl Into<String>,
        output_path: impl Into<String>,
    ) -> Self {
        Self {
            status: Some(status),
            completed_at: Some(completed_at),
            result: Some(result.into()),
            output_path: Some(output_path.into()),
            ..Default::default()
        }
    }

    /// Whether no field would be written
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.started_at.is_none()
            && self.completed_at.is_none()
            && self.result.is_none()
            && self.output_path.is_none()
    }
}

/// Task record from database (raw from SQLite)
#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    /// Unique database ID
    pub id: i64,
    /// Input to process
    pub url: String,
    /// Status literal
    pub status: String,
    /// RFC 3339 creation timestamp
    pub created_at: String,
    /// RFC 3339 start timestamp
    pub started_at: Option<String>,
    /// RFC 3339 completion timestamp
    pub completed_at: Option<String>,
    /// Outcome summary
    pub result: String,
    /// Produced artifact path
    pub output_path: String,
    /// Serialized configuration snapshot
    pub config: String,
}

impl TryFrom<TaskRow> for Task {
    type Error = Error;

    fn try_from(row: TaskRow) -> Result<Self> {
        let status = TaskStatus::parse(&row.status).ok_or_else(|| {
            Error::Database(DatabaseError::Corrupt(format!(
                "task {} has unknown status '{}'",
                row.id, row.status
            )))
        })?;

        Ok(Task {
            id: TaskId(row.id),
            url: row.url,
            status,
            created_at: decode_timestamp(&row.created_at)?,
            started_at: row.started_at.as_deref().map(decode_timestamp).transpose()?,
            completed_at: row.completed_at.as_deref().map(decode_timestamp).transpose()?,
            result: row.result,
            output_path: row.output_path,
            config_snapshot: row.config,
        })
    }
}

/// Encode a timestamp as fixed-width RFC 3339 UTC text
///
/// Microsecond precision and a `Z` suffix keep every value the same length, so
/// text ordering in SQL matches chronological ordering.
pub(crate) fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            Error::Database(DatabaseError::Corrupt(format!(
                "invalid timestamp '{}': {}",
                value, e
            )))
        })
}

/// Truncate a timestamp to the precision the store keeps
pub(crate) fn store_precision(ts: DateTime<Utc>) -> DateTime<Utc> {
    decode_timestamp(&encode_timestamp(ts)).unwrap_or(ts)
}

/// Database handle for the task store
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
