//! Test configuration helpers for creating orchestrators over throwaway databases

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use media_queue::{Config, Orchestrator, ProcessingEngine};

/// Install a log subscriber honoring `RUST_LOG` (only the first call wins)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Config with the database inside `dir` and startup recovery pushed out of the way
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = dir.join("tasks.db");
    config.orchestrator.startup_delay = Duration::from_secs(3600);
    config.orchestrator.shutdown_timeout = Duration::from_secs(5);
    config
}

/// Create an orchestrator over a fresh database
///
/// Returns the orchestrator and temp directory (keep temp_dir alive for test duration)
pub async fn create_orchestrator(engine: Arc<dyn ProcessingEngine>) -> (Orchestrator, TempDir) {
    init_tracing();
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let orchestrator = Orchestrator::new(test_config(temp_dir.path()), engine)
        .await
        .expect("Failed to create orchestrator");
    (orchestrator, temp_dir)
}

/// Reopen the database in `dir` with a new orchestrator, as after a process restart
pub async fn restart_orchestrator(
    dir: &Path,
    engine: Arc<dyn ProcessingEngine>,
    startup_delay: Duration,
) -> Orchestrator {
    let mut config = test_config(dir);
    config.orchestrator.startup_delay = startup_delay;
    Orchestrator::new(config, engine)
        .await
        .expect("Failed to restart orchestrator")
}
