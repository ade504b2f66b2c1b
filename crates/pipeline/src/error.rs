use std::time::Duration;

use faceswap_comfyui::backend::BackendError;
use faceswap_core::error::PatchError;

/// Why a render job did not produce artifacts.
///
/// Every variant is terminal for the job. Backend text (rejection bodies,
/// failure reasons) is carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("Slot not found: node '{node_id}' has no parameter '{parameter}'")]
    SlotNotFound { node_id: String, parameter: String },

    #[error("Workflow needs two asset slots, found {found}")]
    InsufficientSlots { found: usize },

    #[error("Render backend unreachable at {url}: {detail}")]
    BackendUnreachable { url: String, detail: String },

    #[error("Render backend rejected the request ({status}): {detail}")]
    BackendRejected { status: u16, detail: String },

    #[error("Malformed render backend response: {detail}")]
    MalformedResponse { detail: String },

    #[error("Job {job_id} did not finish within {elapsed:?}")]
    TimedOut { job_id: String, elapsed: Duration },

    #[error("Stopped waiting for job {job_id} after {elapsed:?}")]
    Cancelled { job_id: String, elapsed: Duration },

    #[error("Job {job_id} failed: {reason}")]
    BackendJobFailed { job_id: String, reason: String },

    #[error("Job {job_id} completed without output artifacts")]
    NoArtifactsProduced { job_id: String },
}

impl From<PatchError> for JobError {
    fn from(e: PatchError) -> Self {
        match e {
            PatchError::SlotNotFound { node_id, parameter } => {
                JobError::SlotNotFound { node_id, parameter }
            }
            PatchError::InsufficientSlots { found } => JobError::InsufficientSlots { found },
        }
    }
}

impl From<BackendError> for JobError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Unreachable { url, detail } => {
                JobError::BackendUnreachable { url, detail }
            }
            BackendError::Rejected { status, detail } => {
                JobError::BackendRejected { status, detail }
            }
            BackendError::MalformedResponse { detail } => JobError::MalformedResponse { detail },
        }
    }
}
