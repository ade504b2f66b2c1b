mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use assert_matches::assert_matches;
use common::ScriptedBackend;
use faceswap_comfyui::readiness::{ReadinessError, ReadinessProbe};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const SECOND: Duration = Duration::from_secs(1);

#[tokio::test(start_paused = true)]
async fn waits_until_backend_answers() {
    let backend = ScriptedBackend::ready_after(3);
    let probe = ReadinessProbe::new(backend.clone(), Duration::from_secs(120), SECOND);

    let started = Instant::now();
    probe.wait_ready(&CancellationToken::new()).await.unwrap();

    assert_eq!(backend.probes.load(Ordering::SeqCst), 4);
    assert_eq!(started.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn gives_up_at_timeout_with_last_error() {
    let backend = ScriptedBackend::ready_after(u32::MAX);
    let probe = ReadinessProbe::new(backend.clone(), Duration::from_secs(3), SECOND);

    let err = probe.wait_ready(&CancellationToken::new()).await.unwrap_err();

    assert_matches!(
        &err,
        ReadinessError::NotReady { url, elapsed, last_error }
            if url == "http://render.test"
                && *elapsed == Duration::from_secs(3)
                && last_error.contains("connection reset by peer")
    );
    assert_eq!(backend.probes.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_waiting() {
    let backend = ScriptedBackend::ready_after(u32::MAX);
    let probe = ReadinessProbe::new(backend, Duration::from_secs(120), SECOND);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    assert_eq!(probe.wait_ready(&cancel).await, Err(ReadinessError::Cancelled));
    assert_eq!(started.elapsed(), Duration::from_millis(1500));
}

#[tokio::test]
async fn health_reports_backend_url() {
    let probe = ReadinessProbe::new(ScriptedBackend::ready_after(0), SECOND, SECOND);
    let report = probe.health().await;
    assert!(report.ok);
    assert_eq!(report.backend_url, "http://render.test");

    let down = ReadinessProbe::new(ScriptedBackend::ready_after(1), SECOND, SECOND);
    assert!(!down.health().await.ok);
}
