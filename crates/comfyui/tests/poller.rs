//! Integration tests for the job status poller.
//!
//! All tests run on a paused Tokio clock, so multi-second waits complete
//! instantly while elapsed-time assertions stay exact.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use common::{unreachable, ScriptedBackend};
use faceswap_comfyui::backend::BackendError;
use faceswap_comfyui::events::{self, JobEvent};
use faceswap_comfyui::poller::JobPoller;
use faceswap_comfyui::retry::RetryPolicy;
use faceswap_core::status::{JobStatus, OutputArtifact};
use faceswap_core::types::JobHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const SECOND: Duration = Duration::from_secs(1);

fn job() -> JobHandle {
    JobHandle::new("abc")
}

fn out_png() -> OutputArtifact {
    OutputArtifact::new("out.png", "", "output")
}

// ---------------------------------------------------------------------------
// Test: terminal states
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn returns_completed_after_progress_states() {
    let backend = ScriptedBackend::new(vec![
        Ok(JobStatus::Queued),
        Ok(JobStatus::Running),
        Ok(JobStatus::Completed(vec![out_png()])),
    ]);
    let poller = JobPoller::new(backend.clone(), SECOND);

    let started = Instant::now();
    let status = poller
        .await_job(&job(), Duration::from_secs(300), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(status, JobStatus::Completed(vec![out_png()]));
    assert_eq!(backend.poll_count(), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn returns_failed_with_backend_reason() {
    let backend = ScriptedBackend::new(vec![
        Ok(JobStatus::Running),
        Ok(JobStatus::Failed("No face detected in source image".into())),
    ]);
    let poller = JobPoller::new(backend, SECOND);

    let status = poller
        .await_job(&job(), Duration::from_secs(30), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(status, JobStatus::Failed("No face detected in source image".into()));
}

// ---------------------------------------------------------------------------
// Test: wall-clock budget
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn times_out_after_max_wait_not_before_five_polls() {
    let backend = ScriptedBackend::new(vec![Ok(JobStatus::Running)]);
    let poller = JobPoller::new(backend.clone(), SECOND);

    let started = Instant::now();
    let status = poller
        .await_job(&job(), Duration::from_secs(5), &CancellationToken::new())
        .await
        .unwrap();

    assert_matches!(status, JobStatus::TimedOut { elapsed } if elapsed == Duration::from_secs(5));
    assert_eq!(started.elapsed(), Duration::from_secs(5));
    assert!(backend.poll_count() >= 5, "polled only {} times", backend.poll_count());
}

#[tokio::test(start_paused = true)]
async fn zero_poll_interval_still_sleeps_between_queries() {
    let backend = ScriptedBackend::new(vec![Ok(JobStatus::Running)]);
    let poller = JobPoller::new(backend.clone(), Duration::ZERO);

    let started = Instant::now();
    let status = poller
        .await_job(&job(), Duration::from_millis(200), &CancellationToken::new())
        .await
        .unwrap();

    assert_matches!(status, JobStatus::TimedOut { .. });
    assert_eq!(started.elapsed(), Duration::from_millis(200));
    // One query at t=0, then one per MIN_DELAY tick up to the deadline.
    assert_eq!(backend.poll_count(), 21);
}

#[tokio::test(start_paused = true)]
async fn transient_errors_do_not_shorten_or_extend_the_budget() {
    let mut script: Vec<Result<JobStatus, BackendError>> = (0..20).map(|_| Err(unreachable())).collect();
    script.push(Err(BackendError::Rejected {
        status: 503,
        detail: "busy".into(),
    }));
    let backend = ScriptedBackend::new(script);
    let poller = JobPoller::new(backend.clone(), Duration::from_millis(200));

    let started = Instant::now();
    let status = poller
        .await_job(&job(), Duration::from_secs(3), &CancellationToken::new())
        .await
        .unwrap();

    assert_matches!(status, JobStatus::TimedOut { .. });
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(3));
    assert!(elapsed <= Duration::from_secs(3) + Duration::from_millis(200));
    assert!(backend.poll_count() > 10);
}

#[tokio::test(start_paused = true)]
async fn transient_errors_then_completion_succeeds() {
    let backend = ScriptedBackend::new(vec![
        Err(unreachable()),
        Err(BackendError::Rejected {
            status: 404,
            detail: "not found".into(),
        }),
        Ok(JobStatus::Running),
        Ok(JobStatus::Completed(vec![out_png()])),
    ]);
    let poller = JobPoller::new(backend, SECOND);

    let status = poller
        .await_job(&job(), Duration::from_secs(60), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(status, JobStatus::Completed(vec![out_png()]));
}

#[tokio::test(start_paused = true)]
async fn backoff_sleeps_are_clamped_to_the_deadline() {
    let backend = ScriptedBackend::new(vec![Ok(JobStatus::Running)]);
    let policy = RetryPolicy::exponential(SECOND, Duration::from_secs(60), 2.0);
    let poller = JobPoller::with_policy(backend.clone(), policy);

    let started = Instant::now();
    let status = poller
        .await_job(&job(), Duration::from_secs(10), &CancellationToken::new())
        .await
        .unwrap();

    // Polls at 0, 1, 3, 7 and finally at the 10s deadline.
    assert_matches!(status, JobStatus::TimedOut { .. });
    assert_eq!(started.elapsed(), Duration::from_secs(10));
    assert_eq!(backend.poll_count(), 5);
}

// ---------------------------------------------------------------------------
// Test: errors that are not transient
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn non_transient_error_is_returned() {
    let backend = ScriptedBackend::new(vec![
        Ok(JobStatus::Queued),
        Err(BackendError::MalformedResponse {
            detail: "expected object".into(),
        }),
    ]);
    let poller = JobPoller::new(backend, SECOND);

    let err = poller
        .await_job(&job(), Duration::from_secs(60), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_matches!(err, BackendError::MalformedResponse { .. });
}

// ---------------------------------------------------------------------------
// Test: cancellation
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn cancelled_before_start_returns_immediately() {
    let backend = ScriptedBackend::new(vec![Ok(JobStatus::Running)]);
    let poller = JobPoller::new(backend.clone(), SECOND);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let status = poller
        .await_job(&job(), Duration::from_secs(60), &cancel)
        .await
        .unwrap();
    assert_matches!(status, JobStatus::Cancelled { .. });
    assert_eq!(backend.poll_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_wait_is_distinct_from_timeout() {
    let backend = ScriptedBackend::new(vec![Ok(JobStatus::Running)]);
    let poller = JobPoller::new(backend, SECOND);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(2500)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let status = poller
        .await_job(&job(), Duration::from_secs(60), &cancel)
        .await
        .unwrap();

    assert_matches!(status, JobStatus::Cancelled { elapsed } if elapsed == Duration::from_millis(2500));
    assert_eq!(started.elapsed(), Duration::from_millis(2500));
}

// ---------------------------------------------------------------------------
// Test: events
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn emits_state_changes_once_per_transition() {
    let backend = ScriptedBackend::new(vec![
        Ok(JobStatus::Queued),
        Ok(JobStatus::Queued),
        Ok(JobStatus::Running),
        Ok(JobStatus::Running),
        Ok(JobStatus::Completed(vec![out_png()])),
    ]);
    let (tx, mut rx) = events::channel();
    let poller = JobPoller::new(Arc::clone(&backend) as _, SECOND).with_events(tx);

    poller
        .await_job(&job(), Duration::from_secs(60), &CancellationToken::new())
        .await
        .unwrap();

    let mut states = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let JobEvent::StateChanged { state, .. } = event {
            states.push(state);
        }
    }
    assert_eq!(states, vec!["queued", "running", "completed"]);
}

#[tokio::test(start_paused = true)]
async fn emits_timed_out_event() {
    let backend = ScriptedBackend::new(vec![Ok(JobStatus::Running)]);
    let (tx, mut rx) = events::channel();
    let poller = JobPoller::new(backend, SECOND).with_events(tx);

    poller
        .await_job(&job(), Duration::from_secs(2), &CancellationToken::new())
        .await
        .unwrap();

    let mut last = None;
    while let Ok(event) = rx.try_recv() {
        last = Some(event);
    }
    assert_eq!(
        last,
        Some(JobEvent::TimedOut {
            job_id: "abc".into(),
            elapsed_ms: 2000
        })
    );
}
