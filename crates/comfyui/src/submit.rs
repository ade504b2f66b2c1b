//! Workflow submission.

use std::sync::Arc;

use faceswap_core::graph::GraphDocument;
use faceswap_core::types::JobHandle;

use crate::backend::{BackendError, RenderBackend};
use crate::retry::RetryPolicy;

/// Sends patched workflows to the render backend.
///
/// Submits once by default: a submission that timed out may still have
/// been queued, so retrying is opt-in through the [`RetryPolicy`].
pub struct JobSubmitter {
    backend: Arc<dyn RenderBackend>,
    policy: RetryPolicy,
}

impl JobSubmitter {
    pub fn new(backend: Arc<dyn RenderBackend>) -> Self {
        Self::with_policy(backend, RetryPolicy::single_attempt())
    }

    pub fn with_policy(backend: Arc<dyn RenderBackend>, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    /// Submit `doc` and return the backend's job handle.
    ///
    /// Rejections keep the backend's raw response body, which usually
    /// names the offending node.
    pub async fn submit(&self, doc: &GraphDocument) -> Result<JobHandle, BackendError> {
        let mut delay = self.policy.first_delay();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.backend.submit(doc).await {
                Ok(job) => {
                    tracing::info!(
                        job_id = %job,
                        attempt,
                        nodes = doc.len(),
                        backend = self.backend.base_url(),
                        "Workflow submitted",
                    );
                    return Ok(job);
                }
                Err(e) if self.policy.should_retry(&e, attempt) => {
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Submission failed, retrying",
                    );
                    tokio::time::sleep(delay).await;
                    delay = self.policy.next_delay(delay);
                }
                Err(e) => {
                    tracing::error!(attempt, error = %e, "Workflow submission failed");
                    return Err(e);
                }
            }
        }
    }
}
