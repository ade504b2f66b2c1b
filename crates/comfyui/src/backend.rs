//! The render backend seam.
//!
//! Everything above this module (submitter, poller, orchestrator) talks
//! to a [`RenderBackend`] trait object, so the HTTP dialect can be chosen
//! at startup and tests can script a backend in memory.

use async_trait::async_trait;
use faceswap_core::graph::GraphDocument;
use faceswap_core::status::{JobStatus, OutputArtifact};
use faceswap_core::types::{AssetReference, JobHandle};

/// Errors from a single call to the render backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The request never got an HTTP answer (connect, DNS, TLS, timeout).
    #[error("Render backend unreachable at {url}: {detail}")]
    Unreachable { url: String, detail: String },

    /// The backend answered with a non-success status.
    #[error("Render backend rejected request ({status}): {detail}")]
    Rejected {
        status: u16,
        /// Raw response body, verbatim.
        detail: String,
    },

    /// Success status, but the reply lacks what the contract promises.
    #[error("Malformed render backend response: {detail}")]
    MalformedResponse { detail: String },
}

impl BackendError {
    /// Whether retrying the same call later can reasonably succeed.
    ///
    /// Network failures, "not found yet" (404), request timeouts (408),
    /// throttling (429) and server errors (5xx) are transient.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Unreachable { .. } => true,
            BackendError::Rejected { status, .. } => {
                matches!(*status, 404 | 408 | 429) || *status >= 500
            }
            BackendError::MalformedResponse { .. } => false,
        }
    }
}

/// An external service that executes workflow graphs asynchronously.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    /// Base URL, for logs and health reports.
    fn base_url(&self) -> &str;

    /// Queue a graph for execution.
    async fn submit(&self, doc: &GraphDocument) -> Result<JobHandle, BackendError>;

    /// Current status of a job. A job the backend does not know yet is
    /// reported as [`JobStatus::Queued`].
    async fn status(&self, job: &JobHandle) -> Result<JobStatus, BackendError>;

    /// Raw bytes of one output artifact.
    async fn fetch_artifact(&self, artifact: &OutputArtifact) -> Result<Vec<u8>, BackendError>;

    /// Store input bytes on the backend and return the name graphs use
    /// to refer to them.
    async fn upload_asset(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<AssetReference, BackendError>;

    /// Succeeds when the backend answers its readiness endpoint.
    async fn probe_ready(&self) -> Result<(), BackendError>;
}
