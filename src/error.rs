//! Error types for media-queue
//!
//! This module provides the error taxonomy of the library:
//! - [`Error`] - the crate-wide error returned by every fallible public operation
//! - [`DatabaseError`] - task store failures (I/O, integrity, missing rows)
//! - [`EngineFault`] - a fault raised by the processing engine; it is converted into a
//!   failed task by the orchestrator and never escapes it

use crate::types::TaskId;
use std::backtrace::{Backtrace, BacktraceStatus};
use thiserror::Error;

/// Result type alias for media-queue operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-queue
#[derive(Debug, Error)]
pub enum Error {
    /// Submission input was rejected before anything was persisted
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "bg_music_volume")
        key: Option<String>,
    },

    /// Task store operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// A task is already running; nothing was changed
    #[error("orchestrator busy: task {running} is running")]
    Busy {
        /// The task currently holding the worker
        running: TaskId,
    },

    /// Task not found
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// Shutdown in progress - not accepting new work
    #[error("shutdown in progress: not accepting new tasks")]
    ShuttingDown,

    /// Serialization error (configuration snapshots)
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Machine-readable error code for display surfaces
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::Config { .. } => "config_error",
            Error::Database(DatabaseError::NotFound(_)) | Error::NotFound(_) => "not_found",
            Error::Database(_) => "store_error",
            Error::Busy { .. } => "busy",
            Error::ShuttingDown => "shutting_down",
            Error::Serialization(_) => "serialization_error",
        }
    }

    /// Whether this error came from the task store
    pub fn is_store_error(&self) -> bool {
        matches!(self, Error::Database(_))
    }
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),

    /// A stored row could not be decoded (unknown status literal, bad timestamp)
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// A fault raised by the processing engine
///
/// Carries the fault message plus a diagnostic trace. The trace is a captured
/// [`Backtrace`] when backtraces are enabled (`RUST_BACKTRACE`), or whatever
/// context the engine attached with [`EngineFault::with_trace`].
#[derive(Debug, Error)]
#[error("{message}")]
pub struct EngineFault {
    message: String,
    trace: Option<String>,
}

impl EngineFault {
    /// Create a fault, capturing a backtrace if the environment enables them
    pub fn new(message: impl Into<String>) -> Self {
        let backtrace = Backtrace::capture();
        let trace = match backtrace.status() {
            BacktraceStatus::Captured => Some(backtrace.to_string()),
            _ => None,
        };
        Self {
            message: message.into(),
            trace,
        }
    }

    /// Replace the diagnostic trace
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Build a fault from the payload of a panicking engine call
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self {
            message: format!("engine panicked: {}", message),
            trace: None,
        }
    }

    /// The fault message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The diagnostic trace, if one was captured
    pub fn trace(&self) -> Option<&str> {
        self.trace.as_deref()
    }

    /// Result text stored on the failed task
    pub(crate) fn failure_summary(&self) -> String {
        match &self.trace {
            Some(trace) if !trace.trim().is_empty() => {
                format!("processing failed: {}\n\ntrace:\n{}", self.message, trace)
            }
            _ => format!("processing failed: {}", self.message),
        }
    }
}
