//! Job status notifications over a broadcast bus.
//!
//! The orchestrator emits one event per job status transition; subscribers
//! of a job id receive a one-shot push when that job reaches a terminal
//! state. Slow receivers that fall behind will receive a `Lagged` error and
//! miss events.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::JobStatus;

/// One job status notification.
#[derive(Debug, Clone, Serialize)]
pub struct JobEvent {
    pub job_id: Uuid,
    pub status: JobStatus,
    /// Whether a materialized graph artifact is available for this job.
    pub graph_available: bool,
}

/// Broadcast-based bus distributing job events to multiple consumers.
#[derive(Clone)]
pub struct JobEventBus {
    tx: broadcast::Sender<JobEvent>,
}

impl JobEventBus {
    /// Create a bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all subscribers. Dropped silently when no one
    /// is listening.
    pub fn emit(&self, event: JobEvent) {
        tracing::debug!(
            job_id = %event.job_id,
            status = %event.status,
            graph_available = event.graph_available,
            subscriber_count = self.tx.receiver_count(),
            "job event"
        );
        let _ = self.tx.send(event);
    }

    /// Subscribe to all job events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }

    /// Wait for the next terminal-state event for one job id.
    pub async fn wait_for(&self, job_id: Uuid) -> Option<JobEvent> {
        Self::recv_terminal(self.subscribe(), job_id).await
    }

    /// Drive an existing subscription until a terminal event for `job_id`
    /// arrives. Callers that need to consult other state after subscribing
    /// use this so a transition in between is not missed.
    pub async fn recv_terminal(
        mut rx: broadcast::Receiver<JobEvent>,
        job_id: Uuid,
    ) -> Option<JobEvent> {
        loop {
            match rx.recv().await {
                Ok(event) if event.job_id == job_id && event.status.is_terminal() => {
                    return Some(event)
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for JobEventBus {
    fn default() -> Self {
        Self::new(crate::defaults::EVENT_BUS_CAPACITY)
    }
}
