//! Shared test helpers for creating Orchestrator instances in tests.

use crate::config::Config;
use crate::engine::{EngineOutput, EngineRequest, ProcessingEngine};
use crate::error::EngineFault;
use crate::orchestrator::Orchestrator;
use crate::types::{Event, Task, TaskId, TaskStatus};
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::broadcast;

/// How long a test waits for the worker before giving up
pub(crate) const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Config for tests: database inside `dir`, startup recovery effectively disabled
pub(crate) fn test_config(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = dir.join("tasks.db");
    config.orchestrator.startup_delay = Duration::from_secs(3600);
    config.orchestrator.shutdown_timeout = Duration::from_secs(5);
    config
}

/// Helper to create a test Orchestrator with a persistent database.
/// Returns the orchestrator and the tempdir (which must be kept alive).
pub(crate) async fn create_test_orchestrator(
    engine: Arc<dyn ProcessingEngine>,
) -> (Orchestrator, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path());
    let orchestrator = Orchestrator::new(config, engine).await.unwrap();
    (orchestrator, temp_dir)
}

/// Engine reporting `(50, "half")` and producing `<url>.mp4`
pub(crate) fn succeeding_engine() -> Arc<dyn ProcessingEngine> {
    Arc::new(
        |request: &EngineRequest,
         progress: &mut dyn FnMut(u8, &str)|
         -> Result<EngineOutput, EngineFault> {
            progress(50, "half");
            Ok(EngineOutput::new("ok", format!("/out/{}.mp4", tail(&request.url))))
        },
    )
}

/// Engine that always raises a fault
pub(crate) fn faulting_engine(message: &'static str) -> Arc<dyn ProcessingEngine> {
    Arc::new(
        move |_request: &EngineRequest,
              _progress: &mut dyn FnMut(u8, &str)|
              -> Result<EngineOutput, EngineFault> {
            Err(EngineFault::new(message).with_trace("engine step: separation"))
        },
    )
}

fn tail(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// Outcome of one engine call
pub(crate) type EngineResult = Result<EngineOutput, EngineFault>;

/// Engine whose calls block until the test releases them
pub(crate) struct GatedEngine {
    started: tokio::sync::mpsc::UnboundedSender<String>,
    release: Mutex<mpsc::Receiver<EngineResult>>,
}

/// Test side of a [`GatedEngine`]
pub(crate) struct Gate {
    /// URL of each engine call, sent when the call starts
    pub(crate) started: tokio::sync::mpsc::UnboundedReceiver<String>,
    /// Releases the oldest blocked call with an outcome
    pub(crate) release: mpsc::Sender<EngineResult>,
}

impl Gate {
    /// Wait until the engine has been called, returning the URL
    pub(crate) async fn wait_started(&mut self) -> String {
        tokio::time::timeout(TEST_TIMEOUT, self.started.recv())
            .await
            .expect("engine was not called in time")
            .expect("engine dropped")
    }

    /// Let the blocked call return `outcome`
    pub(crate) fn finish(&self, outcome: EngineResult) {
        self.release.send(outcome).unwrap();
    }
}

impl ProcessingEngine for GatedEngine {
    fn process(
        &self,
        request: &EngineRequest,
        progress: &mut dyn FnMut(u8, &str),
    ) -> Result<EngineOutput, EngineFault> {
        let _ = self.started.send(request.url.clone());
        progress(10, "waiting for release");
        let release = self
            .release
            .lock()
            .map_err(|_| EngineFault::new("gate poisoned"))?;
        release
            .recv()
            .map_err(|_| EngineFault::new("gate closed"))?
    }

    fn name(&self) -> &str {
        "gated"
    }
}

pub(crate) fn gated_engine() -> (Arc<GatedEngine>, Gate) {
    let (started_tx, started_rx) = tokio::sync::mpsc::unbounded_channel();
    let (release_tx, release_rx) = mpsc::channel();
    let engine = Arc::new(GatedEngine {
        started: started_tx,
        release: Mutex::new(release_rx),
    });
    let gate = Gate {
        started: started_rx,
        release: release_tx,
    };
    (engine, gate)
}

/// Wait for the Finished event of `task_id`
pub(crate) async fn wait_for_finished(
    rx: &mut broadcast::Receiver<Event>,
    task_id: TaskId,
) -> (String, String) {
    tokio::time::timeout(TEST_TIMEOUT, async {
        loop {
            match rx.recv().await.unwrap() {
                Event::Finished {
                    task_id: id,
                    result,
                    output_path,
                } if id == task_id => return (result, output_path),
                _ => continue,
            }
        }
    })
    .await
    .expect("task did not finish in time")
}

/// Poll the store until `task_id` has `status`
pub(crate) async fn wait_for_status(
    orchestrator: &Orchestrator,
    task_id: TaskId,
    status: TaskStatus,
) -> Task {
    tokio::time::timeout(TEST_TIMEOUT, async {
        loop {
            let task = orchestrator.task(task_id).await.unwrap();
            if task.status == status {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("task did not reach the expected status in time")
}

/// Poll until no task holds the worker
pub(crate) async fn wait_until_idle(orchestrator: &Orchestrator) {
    tokio::time::timeout(TEST_TIMEOUT, async {
        while orchestrator.is_processing().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("worker did not become idle in time");
}
