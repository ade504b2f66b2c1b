//! Backend readiness probing.
//!
//! A freshly started render backend takes a while before it answers. The
//! [`ReadinessProbe`] polls the backend's readiness endpoint at a fixed
//! interval until it answers, the timeout elapses or the
//! [`CancellationToken`] is triggered. It is independent of job
//! orchestration: callers run it once before accepting work.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::backend::RenderBackend;

/// Errors from waiting on backend readiness.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadinessError {
    #[error("Render backend at {url} did not become ready within {elapsed:?}: {last_error}")]
    NotReady {
        url: String,
        elapsed: Duration,
        last_error: String,
    },

    #[error("Readiness wait cancelled")]
    Cancelled,
}

/// One-shot health report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub ok: bool,
    pub backend_url: String,
}

/// Polls a backend until it is ready to accept jobs.
pub struct ReadinessProbe {
    backend: Arc<dyn RenderBackend>,
    timeout: Duration,
    interval: Duration,
}

impl ReadinessProbe {
    pub fn new(backend: Arc<dyn RenderBackend>, timeout: Duration, interval: Duration) -> Self {
        Self {
            backend,
            timeout,
            interval,
        }
    }

    /// Probe once.
    pub async fn health(&self) -> HealthReport {
        let ok = match self.backend.probe_ready().await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Readiness probe failed");
                false
            }
        };
        HealthReport {
            ok,
            backend_url: self.backend.base_url().to_string(),
        }
    }

    /// Block until the backend answers its readiness endpoint.
    pub async fn wait_ready(&self, cancel: &CancellationToken) -> Result<(), ReadinessError> {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ReadinessError::Cancelled),
                result = self.backend.probe_ready() => result,
            };

            let last_error = match result {
                Ok(()) => {
                    tracing::info!(
                        url = self.backend.base_url(),
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Render backend is ready",
                    );
                    return Ok(());
                }
                Err(e) => e.to_string(),
            };

            let now = Instant::now();
            if now >= deadline {
                tracing::error!(
                    url = self.backend.base_url(),
                    attempt,
                    error = %last_error,
                    "Render backend did not come up in time",
                );
                return Err(ReadinessError::NotReady {
                    url: self.backend.base_url().to_string(),
                    elapsed: now - started,
                    last_error,
                });
            }

            tracing::debug!(attempt, error = %last_error, "Render backend not ready yet");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ReadinessError::Cancelled),
                _ = tokio::time::sleep(self.interval.min(deadline - now)) => {}
            }
        }
    }
}
