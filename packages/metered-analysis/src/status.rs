//! Per-attempt progress channel.
//!
//! One producer (the orchestrator task) and one consumer (whoever started the
//! attempt). The consumer going away never affects the pipeline.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::Stream;
use tokio::sync::mpsc;
use tracing::trace;

use crate::types::status::StatusEvent;

/// Sending half, owned by the attempt.
#[derive(Clone)]
pub struct StatusBus {
    tx: mpsc::UnboundedSender<StatusEvent>,
}

/// Receiving half. Ends after the terminal event once the producer is dropped.
pub struct StatusStream {
    rx: mpsc::UnboundedReceiver<StatusEvent>,
}

impl StatusBus {
    /// Create a connected bus and stream.
    pub fn channel() -> (StatusBus, StatusStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (StatusBus { tx }, StatusStream { rx })
    }

    /// Publish an event. Never blocks.
    pub fn emit(&self, event: StatusEvent) {
        trace!(attempt_id = %event.attempt_id, stage = %event.stage, "Status event");
        // Ignore send errors (consumer gone)
        let _ = self.tx.send(event);
    }
}

impl StatusStream {
    /// Next event, or `None` once the attempt is finished and the bus dropped.
    pub async fn recv(&mut self) -> Option<StatusEvent> {
        self.rx.recv().await
    }
}

impl Stream for StatusStream {
    type Item = StatusEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::attempt::Stage;
    use futures::StreamExt;
    use uuid::Uuid;

    #[tokio::test]
    async fn events_arrive_in_order_and_stream_ends() {
        let (bus, stream) = StatusBus::channel();
        let id = Uuid::new_v4();

        bus.emit(StatusEvent::stage(id, Stage::Validating, "Validating upload"));
        bus.emit(StatusEvent::stage(id, Stage::Charging, "Charging credits"));
        drop(bus);

        let stages: Vec<Stage> = stream.map(|e| e.stage).collect().await;
        assert_eq!(stages, vec![Stage::Validating, Stage::Charging]);
    }

    #[tokio::test]
    async fn emitting_after_consumer_dropped_is_harmless() {
        let (bus, stream) = StatusBus::channel();
        drop(stream);

        bus.emit(StatusEvent::stage(Uuid::new_v4(), Stage::Validating, "Validating upload"));
    }
}
