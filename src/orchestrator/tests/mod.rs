
use super::test_helpers::*;
use super::*;
use crate::engine::{EngineOutput, EngineRequest};
use crate::error::EngineFault;
use crate::types::TaskStatus;
use std::time::Duration;

/// Collect events until the Finished event of `task_id`, inclusive
pub(super) async fn collect_until_finished(
    rx: &mut broadcast::Receiver<Event>,
    task_id: TaskId,
) -> Vec<Event> {
    tokio::time::timeout(TEST_TIMEOUT, async {
        let mut events = Vec::new();
        loop {
            let event = rx.recv().await.unwrap();
            let done = matches!(&event, Event::Finished { task_id: id, .. } if *id == task_id);
            events.push(event);
            if done {
                return events;
            }
        }
    })
    .await
    .expect("task did not finish in time")
}

/// Successful engine outcome
pub(super) fn ok(output_path: &str) -> EngineResult {
    Ok(EngineOutput::new("ok", output_path))
}
