//! Event channel from the worker to observers.
//!
//! Built on a [`tokio::sync::broadcast`] channel: sending never blocks, so a
//! slow observer can only lag behind, never stall the worker. Undelivered
//! events are always logged, either at send time (nobody subscribed) or when
//! a lagging receiver skips over them.

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt};

use crate::types::{Event, TaskId};

/// Broadcast sender shared by the orchestrator and its worker
#[derive(Clone, Debug)]
pub struct EventChannel {
    tx: broadcast::Sender<Event>,
}

impl EventChannel {
    /// Create a channel buffering up to `capacity` events per subscriber
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Send an event to every current subscriber without blocking
    pub fn emit(&self, event: Event) {
        if let Err(broadcast::error::SendError(event)) = self.tx.send(event) {
            tracing::debug!(?event, "No event subscribers, event dropped");
        }
    }

    /// Forward an engine progress report
    pub fn progress(&self, task_id: TaskId, percent: u8, status: impl Into<String>) {
        self.emit(Event::Progress {
            task_id,
            percent,
            status: status.into(),
        });
    }

    /// Emit a log line about a task
    pub fn log(&self, task_id: TaskId, text: impl Into<String>) {
        self.emit(Event::Log {
            task_id: Some(task_id),
            text: text.into(),
        });
    }

    /// Emit an orchestrator-level log line
    pub fn log_global(&self, text: impl Into<String>) {
        self.emit(Event::Log {
            task_id: None,
            text: text.into(),
        });
    }

    /// Subscribe to events emitted from now on
    ///
    /// Each receiver sees events in emission order. A receiver that falls more
    /// than the channel capacity behind gets [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Subscribe as a [`Stream`], skipping over lag gaps
    ///
    /// Each gap is logged with the number of events the observer missed.
    pub fn stream(&self) -> impl Stream<Item = Event> + Send + 'static {
        BroadcastStream::new(self.tx.subscribe()).filter_map(|result| match result {
            Ok(event) => Some(event),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event observer lagged, events skipped");
                None
            }
        })
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_emission_order() {
        let channel = EventChannel::new(16);
        let mut rx = channel.subscribe();

        channel.progress(TaskId(1), 10, "download");
        channel.progress(TaskId(1), 50, "half");
        channel.log(TaskId(1), "almost there");
        channel.emit(Event::Finished {
            task_id: TaskId(1),
            result: "ok".into(),
            output_path: "/out/v.mp4".into(),
        });

        assert!(matches!(rx.recv().await.unwrap(), Event::Progress { percent: 10, .. }));
        assert!(matches!(rx.recv().await.unwrap(), Event::Progress { percent: 50, .. }));
        assert!(matches!(rx.recv().await.unwrap(), Event::Log { .. }));
        assert!(matches!(rx.recv().await.unwrap(), Event::Finished { .. }));
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_does_not_fail() {
        let channel = EventChannel::new(4);
        assert_eq!(channel.subscriber_count(), 0);
        channel.log_global("nobody listening");

        // Later subscribers only see later events
        let mut rx = channel.subscribe();
        channel.log_global("hello");
        assert_eq!(
            rx.recv().await.unwrap(),
            Event::Log {
                task_id: None,
                text: "hello".into()
            }
        );
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_every_event() {
        let channel = EventChannel::new(4);
        let mut first = channel.subscribe();
        let mut second = channel.subscribe();

        channel.progress(TaskId(7), 100, "done");

        assert_eq!(first.recv().await.unwrap(), second.recv().await.unwrap());
    }

    #[tokio::test]
    async fn test_slow_observer_lags_without_blocking_sender() {
        let channel = EventChannel::new(2);
        let mut rx = channel.subscribe();

        for percent in 0..10 {
            channel.progress(TaskId(1), percent, "step");
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(8))
        ));
        assert!(matches!(rx.recv().await.unwrap(), Event::Progress { percent: 8, .. }));
    }

    #[tokio::test]
    async fn test_stream_skips_lag_gaps() {
        let channel = EventChannel::new(2);
        let mut stream = Box::pin(channel.stream());

        for percent in 0..5 {
            channel.progress(TaskId(1), percent, "step");
        }

        let first = stream.next().await.unwrap();
        assert!(matches!(first, Event::Progress { percent: 3, .. }));
        let second = stream.next().await.unwrap();
        assert!(matches!(second, Event::Progress { percent: 4, .. }));
    }
}
