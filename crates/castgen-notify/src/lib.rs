//! Progress event fan-out.
//!
//! Workers publish `JobEvent`s onto a process-wide broadcast bus; WebSocket
//! connections subscribe and forward the events their client asked for.
//! Delivery is best-effort: a slow or absent subscriber never blocks the
//! pipeline, and clients reconcile against the job store on reconnect.

pub mod ws;

use tokio::sync::broadcast;
use tracing::trace;

use castgen_models::JobEvent;

const DEFAULT_BUS_CAPACITY: usize = 256;

/// Broadcast bus for job progress events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUS_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: JobEvent) {
        trace!(job_id = %event.job_id, "Publishing job event");
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events. Filtering by job happens at the edge.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
