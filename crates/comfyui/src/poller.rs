//! Status polling with a wall-clock budget.
//!
//! [`JobPoller::await_job`] queries the backend until the job reaches a
//! terminal state, the wait budget runs out or the caller cancels. Only
//! elapsed time bounds the wait: transient query failures are logged and
//! retried on the next tick however many there are. Timing out or being
//! cancelled never touches the backend job, which keeps running.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use faceswap_core::status::JobStatus;
use faceswap_core::types::JobHandle;

use crate::backend::{BackendError, RenderBackend};
use crate::events::{emit, JobEvent};
use crate::retry::RetryPolicy;

/// Smallest time a single status query is allowed, even when the wait
/// budget is (almost) spent.
const MIN_QUERY_BUDGET: Duration = Duration::from_millis(250);

/// Polls a render backend for job status.
pub struct JobPoller {
    backend: Arc<dyn RenderBackend>,
    policy: RetryPolicy,
    events: Option<broadcast::Sender<JobEvent>>,
}

impl JobPoller {
    /// Poll at a fixed `poll_interval`.
    pub fn new(backend: Arc<dyn RenderBackend>, poll_interval: Duration) -> Self {
        Self::with_policy(backend, RetryPolicy::fixed(poll_interval))
    }

    /// Poll starting at `policy.initial_delay`, growing per the policy's
    /// backoff curve. The policy's attempt limit is not used.
    pub fn with_policy(backend: Arc<dyn RenderBackend>, policy: RetryPolicy) -> Self {
        Self {
            backend,
            policy,
            events: None,
        }
    }

    pub fn with_events(mut self, events: broadcast::Sender<JobEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Wait for `job` to finish.
    ///
    /// Returns the terminal backend status (`Completed` / `Failed`), or the
    /// synthesized [`JobStatus::TimedOut`] once `max_wait` has elapsed
    /// without one, or [`JobStatus::Cancelled`] as soon as `cancel` fires.
    /// Sleeps are clamped to the remaining budget so the last query lands
    /// on the deadline. Errors the policy does not consider retriable end
    /// the wait and are returned.
    pub async fn await_job(
        &self,
        job: &JobHandle,
        max_wait: Duration,
        cancel: &CancellationToken,
    ) -> Result<JobStatus, BackendError> {
        let started = Instant::now();
        let deadline = started + max_wait;
        let mut delay = self.policy.first_delay();
        let mut polls = 0u32;
        let mut transient_errors = 0u32;
        let mut last_state: Option<&'static str> = None;

        tracing::info!(
            job_id = %job,
            poll_interval_ms = delay.as_millis() as u64,
            max_wait_ms = max_wait.as_millis() as u64,
            "Waiting for job",
        );

        loop {
            if cancel.is_cancelled() {
                return Ok(self.cancelled(job, started));
            }

            polls += 1;
            let budget = deadline
                .saturating_duration_since(Instant::now())
                .max(MIN_QUERY_BUDGET);
            let query = tokio::time::timeout(budget, self.backend.status(job));

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(self.cancelled(job, started)),
                outcome = query => outcome,
            };

            match outcome {
                Ok(Ok(status)) => {
                    if last_state != Some(status.label()) {
                        tracing::info!(job_id = %job, state = status.label(), polls, "Job state changed");
                        last_state = Some(status.label());
                        emit(
                            self.events.as_ref(),
                            JobEvent::StateChanged {
                                job_id: job.to_string(),
                                state: status.label(),
                            },
                        );
                    } else {
                        tracing::debug!(job_id = %job, state = status.label(), polls, "Job status polled");
                    }
                    if status.is_terminal() {
                        return Ok(status);
                    }
                }
                Ok(Err(e)) if self.policy.is_retriable(&e) => {
                    transient_errors += 1;
                    tracing::warn!(
                        job_id = %job,
                        polls,
                        transient_errors,
                        error = %e,
                        "Status query failed, will retry",
                    );
                }
                Ok(Err(e)) => {
                    tracing::error!(job_id = %job, polls, error = %e, "Status query failed");
                    return Err(e);
                }
                Err(_) => {
                    transient_errors += 1;
                    tracing::warn!(
                        job_id = %job,
                        polls,
                        budget_ms = budget.as_millis() as u64,
                        "Status query exceeded the remaining wait budget",
                    );
                }
            }

            let now = Instant::now();
            if now >= deadline {
                let elapsed = now - started;
                tracing::warn!(
                    job_id = %job,
                    polls,
                    transient_errors,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Job did not finish within the wait budget; leaving it running",
                );
                emit(
                    self.events.as_ref(),
                    JobEvent::TimedOut {
                        job_id: job.to_string(),
                        elapsed_ms: elapsed.as_millis() as u64,
                    },
                );
                return Ok(JobStatus::TimedOut { elapsed });
            }

            // Wait before the next poll, respecting cancellation.
            let pause = delay.min(deadline - now);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(self.cancelled(job, started)),
                _ = tokio::time::sleep(pause) => {}
            }

            delay = self.policy.next_delay(delay);
        }
    }

    fn cancelled(&self, job: &JobHandle, started: Instant) -> JobStatus {
        let elapsed = started.elapsed();
        tracing::info!(
            job_id = %job,
            elapsed_ms = elapsed.as_millis() as u64,
            "Stopped waiting for job (cancelled); leaving it running",
        );
        emit(
            self.events.as_ref(),
            JobEvent::Cancelled {
                job_id: job.to_string(),
                elapsed_ms: elapsed.as_millis() as u64,
            },
        );
        JobStatus::Cancelled { elapsed }
    }
}
