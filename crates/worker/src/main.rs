//! `faceswap-worker` -- runs one face-swap render job.
//!
//! Reads a single job request (JSON) from stdin, runs it against the
//! configured render backend and prints the JSON result on stdout. Logs go
//! to stderr. See [`config::WorkerConfig::from_env`] for the environment
//! variables; `RUST_LOG` and `LOG_FORMAT=json` control logging.

mod config;
mod request;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use faceswap_comfyui::api::ComfyUIApi;
use faceswap_comfyui::backend::RenderBackend;
use faceswap_comfyui::events;
use faceswap_comfyui::generic::GenericHttpBackend;
use faceswap_comfyui::readiness::ReadinessProbe;
use faceswap_core::graph::GraphDocument;
use faceswap_core::types::AssetReference;
use faceswap_pipeline::publish::{publish_all, LocalDirectoryPublisher};
use faceswap_pipeline::resolver::{AssetResolver, DefaultAssetResolver};
use faceswap_pipeline::{Orchestrator, RunOptions};

use config::{BackendDialect, WorkerConfig};
use request::JobRequest;

const DEFAULT_LOG_FILTER: &str = "faceswap_worker=info,faceswap_pipeline=info,faceswap_comfyui=info";

/// Interval between readiness probes while the backend starts up.
const READY_PROBE_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::from_env()?;

    let mut body = String::new();
    tokio::io::stdin()
        .read_to_string(&mut body)
        .await
        .context("Failed to read job request from stdin")?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    let worker = Worker::new(config)?;
    match worker.handle(&body, &cancel).await {
        Ok(result) => {
            println!("{result}");
            Ok(())
        }
        Err(e) => {
            let error = format!("{e:#}");
            tracing::error!(error = %error, "Job request failed");
            println!("{}", json!({ "ok": false, "error": error }));
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Resolve once SIGINT or (on Unix) SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, abandoning the wait"),
        () = terminate => tracing::info!("Received SIGTERM, abandoning the wait"),
    }
}

struct Worker {
    config: WorkerConfig,
    client: reqwest::Client,
    backend: Arc<dyn RenderBackend>,
}

impl Worker {
    fn new(config: WorkerConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let backend: Arc<dyn RenderBackend> = match config.dialect {
            BackendDialect::ComfyUi => {
                Arc::new(ComfyUIApi::with_client(client.clone(), config.backend_url.clone()))
            }
            BackendDialect::Generic => Arc::new(GenericHttpBackend::with_client(
                client.clone(),
                config.backend_url.clone(),
            )),
        };

        tracing::info!(
            backend_url = %config.backend_url,
            dialect = ?config.dialect,
            "Worker starting",
        );

        Ok(Self {
            config,
            client,
            backend,
        })
    }

    async fn handle(&self, body: &str, cancel: &CancellationToken) -> anyhow::Result<Value> {
        match JobRequest::parse(body)? {
            JobRequest::HealthCheck => {
                let report = self.readiness().health().await;
                Ok(json!({ "ok": report.ok, "backend_url": report.backend_url }))
            }
            JobRequest::FaceSwap { source, target } => self.face_swap(&source, &target, cancel).await,
        }
    }

    fn readiness(&self) -> ReadinessProbe {
        ReadinessProbe::new(
            Arc::clone(&self.backend),
            self.config.ready_timeout,
            READY_PROBE_INTERVAL,
        )
    }

    async fn face_swap(
        &self,
        source: &str,
        target: &str,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Value> {
        self.readiness().wait_ready(cancel).await?;

        let template = load_template(&self.config.workflow_template).await?;
        let resolver = DefaultAssetResolver::with_client(self.client.clone());
        let source = self.stage_asset(&resolver, "source", source).await?;
        let target = self.stage_asset(&resolver, "target", target).await?;

        let (events_tx, mut events_rx) = events::channel();
        tokio::spawn(async move {
            while let Ok(event) = events_rx.recv().await {
                tracing::debug!(event = ?event, "Job event");
            }
        });

        let opts = RunOptions {
            poll_interval: self.config.poll_interval,
            max_wait: self.config.max_wait,
            backoff_multiplier: self.config.poll_backoff_multiplier,
            max_poll_interval: self.config.poll_max_interval,
            cancel: cancel.clone(),
            events: Some(events_tx),
            ..RunOptions::default()
        };

        let outcome = Orchestrator::new(Arc::clone(&self.backend))
            .run(&template, &source, &target, &opts)
            .await?;

        let artifacts = match &self.config.output_dir {
            Some(dir) => {
                let publisher = LocalDirectoryPublisher::new(dir);
                json!(publish_all(self.backend.as_ref(), &publisher, &outcome.artifacts).await)
            }
            None => json!(outcome.artifacts),
        };

        Ok(json!({
            "ok": true,
            "backend_url": self.backend.base_url(),
            "job_id": outcome.job_id,
            "slots": outcome.slots,
            "artifacts": artifacts,
        }))
    }

    /// Resolve an input asset and upload it to the backend.
    async fn stage_asset(
        &self,
        resolver: &dyn AssetResolver,
        role: &str,
        location: &str,
    ) -> anyhow::Result<AssetReference> {
        let asset = resolver
            .resolve(location)
            .await
            .with_context(|| format!("Failed to resolve {role} asset"))?;
        let reference = self
            .backend
            .upload_asset(&format!("{role}_{}", asset.file_name), asset.bytes)
            .await
            .with_context(|| format!("Failed to upload {role} asset"))?;
        tracing::info!(role, reference = %reference, "Input asset staged");
        Ok(reference)
    }
}

async fn load_template(path: &Path) -> anyhow::Result<GraphDocument> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read workflow template {}", path.display()))?;
    GraphDocument::from_json_str(&text)
        .with_context(|| format!("Invalid workflow template {}", path.display()))
}
