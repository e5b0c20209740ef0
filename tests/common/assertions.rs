//! Custom test assertions for integration tests

use std::time::Duration;
use media_queue::{Event, Orchestrator, Task, TaskId, TaskStatus};
use tokio::sync::broadcast;

/// Default time to wait for the worker
pub const WAIT: Duration = Duration::from_secs(10);

/// Wait for a task to reach `status`, polling the store
pub async fn wait_for_status(orchestrator: &Orchestrator, id: TaskId, status: TaskStatus) -> Task {
    tokio::time::timeout(WAIT, async {
        loop {
            let task = orchestrator.task(id).await.expect("task lookup failed");
            if task.status == status {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("task {} did not reach {} in time", id, status))
}

/// Wait until no task holds the worker
pub async fn wait_until_idle(orchestrator: &Orchestrator) {
    tokio::time::timeout(WAIT, async {
        while orchestrator.is_processing().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("worker did not become idle in time");
}

/// Collect events up to and including the Finished event for `id`
pub async fn events_until_finished(
    events: &mut broadcast::Receiver<Event>,
    id: TaskId,
) -> Vec<Event> {
    tokio::time::timeout(WAIT, async {
        let mut seen = Vec::new();
        loop {
            let event = events.recv().await.expect("event channel closed");
            let finished = matches!(&event, Event::Finished { task_id, .. } if *task_id == id);
            seen.push(event);
            if finished {
                return seen;
            }
        }
    })
    .await
    .expect("task did not finish in time")
}

/// Assert the status sequence of a task only ever moved forward
pub fn assert_monotonic(task: &Task) {
    if let Some(started_at) = task.started_at {
        assert!(task.created_at <= started_at, "started before created: {:?}", task);
        if let Some(completed_at) = task.completed_at {
            assert!(started_at <= completed_at, "completed before started: {:?}", task);
        }
    }
    if task.status.is_terminal() {
        assert!(!task.result.is_empty(), "terminal task without result: {:?}", task);
        assert!(task.completed_at.is_some());
    }
    if task.status == TaskStatus::Completed {
        assert!(!task.output_path.is_empty());
    } else {
        assert!(task.output_path.is_empty());
    }
}
