//! # media-queue
//!
//! Persistent task queue and single-flight orchestrator for a long-running
//! media pipeline.
//!
//! ## Design Philosophy
//!
//! media-queue is designed to be:
//! - **Durable** - Every task lives in SQLite; the store is the only source of truth
//! - **Single-flight** - At most one task runs at a time, enforced by an admission slot
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! The media pipeline itself is plugged in through the [`ProcessingEngine`] trait.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use media_queue::{Config, DisabledEngine, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = Orchestrator::new(Config::default(), Arc::new(DisabledEngine)).await?;
//!
//!     // Subscribe to events
//!     let mut events = orchestrator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     orchestrator.submit("https://www.youtube.com/watch?v=example").await?;
//!     orchestrator.start_processing().await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Task store (SQLite persistence)
pub mod db;
/// Processing engine boundary
pub mod engine;
/// Error types
pub mod error;
/// Event channel
pub mod events;
/// Single-flight orchestrator (decomposed into focused submodules)
pub mod orchestrator;
/// FIFO task queue
pub mod queue;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, OrchestratorConfig, PersistenceConfig, ProcessingConfig};
pub use db::Database;
pub use engine::{DisabledEngine, EngineOutput, EngineRequest, ProcessingEngine};
pub use error::{DatabaseError, EngineFault, Error, Result};
pub use events::EventChannel;
pub use orchestrator::Orchestrator;
pub use queue::TaskQueue;
pub use types::{Event, Task, TaskCounts, TaskId, TaskStatus};

/// Run the orchestrator until SIGTERM or Ctrl+C, then shut it down gracefully.
///
/// On Unix both SIGTERM and SIGINT are honored; if the SIGTERM handler cannot be
/// registered only Ctrl+C is. Elsewhere only Ctrl+C is.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use media_queue::{Config, DisabledEngine, Orchestrator, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let orchestrator = Orchestrator::new(Config::default(), Arc::new(DisabledEngine)).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(orchestrator).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(orchestrator: Orchestrator) -> Result<()> {
    run_until(orchestrator, wait_for_signal()).await
}

/// Run the orchestrator until `signal` resolves, then shut it down gracefully.
///
/// Embedders with their own stop condition use this instead of
/// [`run_with_shutdown`]. The running task, if any, is given up to
/// `shutdown_timeout` to finish.
pub async fn run_until<F>(orchestrator: Orchestrator, signal: F) -> Result<()>
where
    F: std::future::Future<Output = ()>,
{
    signal.await;
    let running = orchestrator.current_task().await;
    tracing::info!(running = ?running, "Stop requested, shutting down orchestrator");
    orchestrator.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
                Ok(()) = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT (Ctrl+C)"),
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for Ctrl+C only");
            wait_for_ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
    }
}
