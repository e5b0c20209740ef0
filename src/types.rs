//! Core types for media-queue

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::ProcessingConfig;
use crate::error::Result;

/// Unique identifier for a task, assigned by the store on insertion
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl TaskId {
    /// Create a new TaskId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for TaskId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<TaskId> for i64 {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl PartialEq<i64> for TaskId {
    fn eq(&self, other: &i64) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for TaskId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for TaskId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> std::result::Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for TaskId {
    fn decode(
        value: sqlx::sqlite::SqliteValueRef<'r>,
    ) -> std::result::Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Task lifecycle status
///
/// Transitions only move forward: `Pending -> Running -> {Completed, Failed}`.
/// Both terminal states are absorbing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting in the queue
    Pending,
    /// Handed to the processing engine
    Running,
    /// Engine returned an output artifact
    Completed,
    /// Engine faulted, returned no artifact, or the operator stopped the task
    Failed,
}

impl TaskStatus {
    /// The literal stored in the `status` column
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Parse a stored status literal
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(TaskStatus::Pending),
            "running" => Some(TaskStatus::Running),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }

    /// Whether the status is absorbing
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether the lifecycle allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One durable unit of submitted work
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Store-assigned identifier
    pub id: TaskId,
    /// Input to process (video URL or local path)
    pub url: String,
    /// Current lifecycle status
    pub status: TaskStatus,
    /// Set once on insertion
    pub created_at: DateTime<Utc>,
    /// Set once on the Pending -> Running transition
    pub started_at: Option<DateTime<Utc>>,
    /// Set once on the transition into a terminal state
    pub completed_at: Option<DateTime<Utc>>,
    /// Outcome summary, empty until the task is terminal
    pub result: String,
    /// Produced artifact, empty unless the task completed with one
    pub output_path: String,
    /// Serialized [`ProcessingConfig`] captured at submission
    pub config_snapshot: String,
}

impl Task {
    /// Decode the configuration snapshot
    ///
    /// Keys missing from older snapshots fall back to their defaults.
    pub fn config(&self) -> Result<ProcessingConfig> {
        Ok(serde_json::from_str(&self.config_snapshot)?)
    }

    /// Multi-line detail text for display surfaces
    pub fn details(&self) -> String {
        let mut details = format!(
            "Task ID: {}\nURL: {}\nStatus: {}\nCreated: {}\n",
            self.id,
            self.url,
            self.status,
            self.created_at.format("%Y-%m-%d %H:%M:%S")
        );
        if let Some(started) = self.started_at {
            details.push_str(&format!("Started: {}\n", started.format("%Y-%m-%d %H:%M:%S")));
        }
        if let Some(completed) = self.completed_at {
            details.push_str(&format!(
                "Completed: {}\n",
                completed.format("%Y-%m-%d %H:%M:%S")
            ));
        }
        details.push_str(&format!("Result: {}\n", self.result));
        if !self.output_path.is_empty() && Path::new(&self.output_path).exists() {
            details.push_str(&format!("Output: {}\n", self.output_path));
        }
        details
    }
}

/// Number of tasks per status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    /// Waiting in the queue
    pub pending: u64,
    /// Currently running (at most one unless rows went stale)
    pub running: u64,
    /// Finished with an artifact
    pub completed: u64,
    /// Finished without one
    pub failed: u64,
}

impl TaskCounts {
    /// Total number of stored tasks
    pub fn total(&self) -> u64 {
        self.pending + self.running + self.completed + self.failed
    }
}

/// Event emitted from the worker to observers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Progress reported by the processing engine, forwarded verbatim
    Progress {
        /// Task being processed
        task_id: TaskId,
        /// Completion percentage (0 to 100)
        percent: u8,
        /// Engine status text
        status: String,
    },

    /// Human-readable log line
    Log {
        /// Task the line refers to, `None` for orchestrator-level lines
        #[serde(skip_serializing_if = "Option::is_none")]
        task_id: Option<TaskId>,
        /// Log text
        text: String,
    },

    /// Task reached a terminal state through the worker
    Finished {
        /// Finished task
        task_id: TaskId,
        /// Outcome summary
        result: String,
        /// Produced artifact, empty on failure
        output_path: String,
    },
}
