//! End-to-end render job orchestration.
//!
//! [`Orchestrator::run_graph_job`] runs one job as a strictly sequential
//! flow: patch the template, submit, wait, collect. Each step either hands
//! its result to the next or ends the run with a [`JobError`]; nothing is
//! returned partially. Timeouts and cancellation only stop the wait, the
//! backend job keeps running.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use faceswap_comfyui::backend::RenderBackend;
use faceswap_comfyui::events::{emit, JobEvent};
use faceswap_comfyui::poller::JobPoller;
use faceswap_comfyui::retry::RetryPolicy;
use faceswap_comfyui::submit::JobSubmitter;
use faceswap_core::collect::collect_artifacts;
use faceswap_core::error::CollectError;
use faceswap_core::graph::GraphDocument;
use faceswap_core::patch::{BoundSlots, ExplicitSlotPair, GraphPatcher, SlotRoles};
use faceswap_core::status::{JobStatus, OutputArtifact};
use faceswap_core::types::{AssetReference, JobHandle};

use crate::error::JobError;

/// Default time between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default wall-clock budget for waiting on a job.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(300);

/// Default upper bound for the poll interval when backoff is enabled.
pub const DEFAULT_MAX_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Per-job options for [`Orchestrator::run_graph_job`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Bind to these slots instead of discovering them.
    pub explicit_slots: Option<ExplicitSlotPair>,
    /// Which discovered slot receives which asset.
    pub roles: SlotRoles,
    pub poll_interval: Duration,
    pub max_wait: Duration,
    /// Growth factor of the poll interval; `1.0` polls at a fixed cadence.
    pub backoff_multiplier: f64,
    pub max_poll_interval: Duration,
    pub cancel: CancellationToken,
    pub events: Option<broadcast::Sender<JobEvent>>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            explicit_slots: None,
            roles: SlotRoles::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
            backoff_multiplier: 1.0,
            max_poll_interval: DEFAULT_MAX_POLL_INTERVAL,
            cancel: CancellationToken::new(),
            events: None,
        }
    }
}

impl RunOptions {
    fn poll_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(
            self.poll_interval,
            self.max_poll_interval,
            self.backoff_multiplier,
        )
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobOutcome {
    pub job_id: JobHandle,
    pub slots: BoundSlots,
    pub artifacts: Vec<OutputArtifact>,
}

/// Runs render jobs against one backend.
///
/// Holds no per-job state, so a single instance can be shared behind an
/// [`Arc`] by concurrent tasks.
pub struct Orchestrator {
    backend: Arc<dyn RenderBackend>,
    submit_policy: RetryPolicy,
}

impl Orchestrator {
    /// Orchestrator that submits each workflow exactly once.
    pub fn new(backend: Arc<dyn RenderBackend>) -> Self {
        Self {
            backend,
            submit_policy: RetryPolicy::single_attempt(),
        }
    }

    pub fn with_submit_policy(mut self, policy: RetryPolicy) -> Self {
        self.submit_policy = policy;
        self
    }

    pub fn backend(&self) -> &Arc<dyn RenderBackend> {
        &self.backend
    }

    /// Bind `first` and `second` into `template`, run the job and return its
    /// de-duplicated output artifacts in backend order.
    ///
    /// Without explicit slots, the first slot found in document order gets
    /// `first` and the second gets `second` (see [`RunOptions::roles`]).
    pub async fn run_graph_job(
        &self,
        template: &GraphDocument,
        first: &AssetReference,
        second: &AssetReference,
        opts: &RunOptions,
    ) -> Result<Vec<OutputArtifact>, JobError> {
        self.run(template, first, second, opts)
            .await
            .map(|outcome| outcome.artifacts)
    }

    /// Like [`Orchestrator::run_graph_job`], also reporting the job id and
    /// the slots that were bound.
    pub async fn run(
        &self,
        template: &GraphDocument,
        first: &AssetReference,
        second: &AssetReference,
        opts: &RunOptions,
    ) -> Result<JobOutcome, JobError> {
        let (patched, slots) = GraphPatcher::with_roles(opts.roles).patch(
            template,
            first,
            second,
            opts.explicit_slots.as_ref(),
        )?;

        let job_id = JobSubmitter::with_policy(Arc::clone(&self.backend), self.submit_policy)
            .submit(&patched)
            .await?;
        emit(
            opts.events.as_ref(),
            JobEvent::Submitted {
                job_id: job_id.to_string(),
            },
        );

        let mut poller = JobPoller::with_policy(Arc::clone(&self.backend), opts.poll_policy());
        if let Some(events) = &opts.events {
            poller = poller.with_events(events.clone());
        }
        let status = poller.await_job(&job_id, opts.max_wait, &opts.cancel).await?;

        let artifacts = self.finish(&job_id, status, opts)?;

        tracing::info!(
            job_id = %job_id,
            artifacts = artifacts.len(),
            first_slot = %slots.first,
            second_slot = %slots.second,
            "Render job completed",
        );

        Ok(JobOutcome {
            job_id,
            slots,
            artifacts,
        })
    }

    /// Map the poller's terminal status onto the job result.
    fn finish(
        &self,
        job_id: &JobHandle,
        status: JobStatus,
        opts: &RunOptions,
    ) -> Result<Vec<OutputArtifact>, JobError> {
        let job = job_id.to_string();
        match status {
            JobStatus::Completed(_) => match collect_artifacts(&status) {
                Ok(artifacts) => {
                    emit(
                        opts.events.as_ref(),
                        JobEvent::Completed {
                            job_id: job,
                            artifacts: artifacts.clone(),
                        },
                    );
                    Ok(artifacts)
                }
                Err(CollectError::NoArtifactsProduced) => {
                    tracing::error!(job_id = %job_id, "Job completed without output artifacts");
                    Err(JobError::NoArtifactsProduced { job_id: job })
                }
                Err(e @ CollectError::NotCompleted { .. }) => Err(JobError::MalformedResponse {
                    detail: e.to_string(),
                }),
            },
            JobStatus::Failed(reason) => {
                tracing::error!(job_id = %job_id, reason = %reason, "Render job failed");
                emit(
                    opts.events.as_ref(),
                    JobEvent::Failed {
                        job_id: job.clone(),
                        reason: reason.clone(),
                    },
                );
                Err(JobError::BackendJobFailed {
                    job_id: job,
                    reason,
                })
            }
            JobStatus::TimedOut { elapsed } => Err(JobError::TimedOut {
                job_id: job,
                elapsed,
            }),
            JobStatus::Cancelled { elapsed } => Err(JobError::Cancelled {
                job_id: job,
                elapsed,
            }),
            JobStatus::Queued | JobStatus::Running => Err(JobError::MalformedResponse {
                detail: format!("poller stopped on non-terminal state '{}'", status.label()),
            }),
        }
    }
}
