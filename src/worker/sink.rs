//! Outbound side of the worker channel

use tokio::sync::mpsc;

use crate::protocol::WorkerEvent;

/// Sends events to the control thread. Cloned into progress callbacks.
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: mpsc::UnboundedSender<WorkerEvent>,
}

impl EventSink {
    pub fn new(sender: mpsc::UnboundedSender<WorkerEvent>) -> Self {
        Self { sender }
    }

    /// A sink together with the receiver it feeds
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }

    /// Send an event. A closed channel means the control side has gone
    /// away; the event is dropped.
    pub fn send(&self, event: WorkerEvent) {
        let kind = event.kind();
        if self.sender.send(event).is_err() {
            tracing::warn!(kind, "Control side gone, dropping event");
        }
    }

    pub fn status(&self, text: &str) {
        tracing::debug!(text, "Status");
        self.send(WorkerEvent::status(text));
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
