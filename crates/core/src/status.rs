//! Job lifecycle states and output artifact descriptors.
//!
//! `Queued -> Running -> {Completed, Failed}` are reported by the render
//! backend. `TimedOut` and `Cancelled` are never reported by the backend;
//! the poller synthesizes them when it stops waiting.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Descriptor of one output file produced by a job.
///
/// Enough to fetch the bytes in a second round trip (ComfyUI
/// `filename` / `subfolder` / `type`); carries no bytes itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputArtifact {
    pub name: String,
    #[serde(default)]
    pub subgroup: String,
    pub kind: String,
}

impl OutputArtifact {
    pub fn new(
        name: impl Into<String>,
        subgroup: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            subgroup: subgroup.into(),
            kind: kind.into(),
        }
    }
}

/// Observed state of a submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Running,
    /// Finished; artifacts in backend-reported order, possibly repeated.
    Completed(Vec<OutputArtifact>),
    /// Backend-reported failure reason, verbatim.
    Failed(String),
    /// The poller's wait budget ran out. The backend job keeps running.
    TimedOut { elapsed: Duration },
    /// The caller cancelled the wait. The backend job keeps running.
    Cancelled { elapsed: Duration },
}

impl JobStatus {
    /// Whether polling should stop on this status.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Queued | JobStatus::Running)
    }

    /// Stable lowercase label, used in logs and events.
    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed(_) => "completed",
            JobStatus::Failed(_) => "failed",
            JobStatus::TimedOut { .. } => "timed_out",
            JobStatus::Cancelled { .. } => "cancelled",
        }
    }
}
