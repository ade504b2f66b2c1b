//! Job lifecycle events.
//!
//! Emitted on an optional [`tokio::sync::broadcast`] channel by the poller
//! and the orchestrator so callers can follow a job without polling the
//! backend themselves. Sending never fails the job: with no subscribers
//! the event is simply dropped.

use serde::Serialize;
use tokio::sync::broadcast;

use faceswap_core::status::OutputArtifact;

/// Default broadcast channel capacity for job events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A change in the lifecycle of one render job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    /// The backend accepted the workflow.
    Submitted { job_id: String },

    /// The backend reported a different state than the previous poll.
    StateChanged { job_id: String, state: &'static str },

    /// The job finished and produced these artifacts.
    Completed {
        job_id: String,
        artifacts: Vec<OutputArtifact>,
    },

    /// The backend reported a failure.
    Failed { job_id: String, reason: String },

    /// The wait budget ran out; the backend job was left running.
    TimedOut { job_id: String, elapsed_ms: u64 },

    /// The caller stopped waiting; the backend job was left running.
    Cancelled { job_id: String, elapsed_ms: u64 },
}

/// Create a job event channel with the default capacity.
pub fn channel() -> (broadcast::Sender<JobEvent>, broadcast::Receiver<JobEvent>) {
    broadcast::channel(EVENT_CHANNEL_CAPACITY)
}

/// Send `event` if a sender is configured, ignoring "no receivers".
pub fn emit(sender: Option<&broadcast::Sender<JobEvent>>, event: JobEvent) {
    if let Some(tx) = sender {
        let _ = tx.send(event);
    }
}
