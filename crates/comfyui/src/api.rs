//! REST client for the ComfyUI HTTP endpoints.
//!
//! Implements [`RenderBackend`] over the ComfyUI API: workflow submission
//! (`POST /prompt`), status via history and queue (`GET /history/{id}`,
//! `GET /queue`), artifact download (`GET /view`), input upload
//! (`POST /upload/image`) and readiness (`GET /system_stats`).

use async_trait::async_trait;
use serde::Deserialize;

use faceswap_core::graph::GraphDocument;
use faceswap_core::status::{JobStatus, OutputArtifact};
use faceswap_core::types::{AssetReference, JobHandle};

use crate::backend::{BackendError, RenderBackend};
use crate::history::{parse_history, QueueSnapshot};
use crate::http;

/// HTTP client for a single ComfyUI instance.
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
    /// Sent with every submission so ComfyUI can attribute prompts.
    client_id: String,
}

/// Response returned by the ComfyUI `/prompt` endpoint after
/// successfully queuing a workflow.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued prompt.
    #[serde(default)]
    pub prompt_id: Option<String>,
    /// Position in the execution queue.
    #[serde(default)]
    pub number: Option<i64>,
}

/// Response of `/upload/image`.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    name: String,
    #[serde(default)]
    subfolder: String,
}

impl ComfyUIApi {
    /// Create a new API client for a ComfyUI instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    pub fn new(api_url: String) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (useful for sharing timeouts and connection pools).
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self {
            client,
            api_url,
            client_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Fetch the queue to tell running prompts from pending ones.
    async fn queue_snapshot(&self) -> Result<QueueSnapshot, BackendError> {
        let url = http::join(&self.api_url, "queue");
        let response = http::send(self.client.get(&url), &url).await?;
        http::parse_json(response, &url).await
    }
}

#[async_trait]
impl RenderBackend for ComfyUIApi {
    fn base_url(&self) -> &str {
        &self.api_url
    }

    /// Sends `POST /prompt` with the workflow and client id. Validation
    /// failures come back as HTTP 400 with ComfyUI's `node_errors` body,
    /// which is surfaced verbatim.
    async fn submit(&self, doc: &GraphDocument) -> Result<JobHandle, BackendError> {
        let url = http::join(&self.api_url, "prompt");
        let body = serde_json::json!({
            "prompt": doc,
            "client_id": self.client_id,
        });

        let response = http::send(self.client.post(&url).json(&body), &url).await?;
        let submitted: SubmitResponse = http::parse_json(response, &url).await?;

        match submitted.prompt_id {
            Some(id) if !id.is_empty() => {
                tracing::debug!(prompt_id = %id, number = ?submitted.number, "Prompt queued");
                Ok(JobHandle::new(id))
            }
            _ => Err(BackendError::MalformedResponse {
                detail: "ComfyUI /prompt reply has no prompt_id".to_string(),
            }),
        }
    }

    /// History first; prompts without history are looked up in the queue.
    async fn status(&self, job: &JobHandle) -> Result<JobStatus, BackendError> {
        let url = http::join(&self.api_url, &format!("history/{}", job.as_str()));
        let response = http::send(self.client.get(&url), &url).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(JobStatus::Queued);
        }
        let body: serde_json::Value = http::parse_json(response, &url).await?;

        let entry = parse_history(&body, job.as_str()).map_err(|e| {
            BackendError::MalformedResponse {
                detail: format!("history entry for {job}: {e}"),
            }
        })?;

        match entry {
            Some(entry) => Ok(entry.to_status()),
            None => Ok(self.queue_snapshot().await?.status_of(job.as_str())),
        }
    }

    async fn fetch_artifact(&self, artifact: &OutputArtifact) -> Result<Vec<u8>, BackendError> {
        let url = http::join(&self.api_url, "view");
        let request = self.client.get(&url).query(&[
            ("filename", artifact.name.as_str()),
            ("subfolder", artifact.subgroup.as_str()),
            ("type", artifact.kind.as_str()),
        ]);
        let response = http::send(request, &url).await?;
        http::read_bytes(response, &url).await
    }

    /// Multipart `POST /upload/image`. The returned reference includes the
    /// subfolder when ComfyUI stored the file in one.
    async fn upload_asset(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<AssetReference, BackendError> {
        let url = http::join(&self.api_url, "upload/image");
        let form = reqwest::multipart::Form::new()
            .part(
                "image",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string()),
            )
            .text("overwrite", "true");

        let response = http::send(self.client.post(&url).multipart(form), &url).await?;
        let uploaded: UploadResponse = http::parse_json(response, &url).await?;

        let reference = if uploaded.subfolder.is_empty() {
            uploaded.name
        } else {
            format!("{}/{}", uploaded.subfolder, uploaded.name)
        };
        AssetReference::new(reference).map_err(|e| BackendError::MalformedResponse {
            detail: format!("ComfyUI /upload/image reply: {e}"),
        })
    }

    async fn probe_ready(&self) -> Result<(), BackendError> {
        let url = http::join(&self.api_url, "system_stats");
        let response = http::send(self.client.get(&url), &url).await?;
        http::check_status(response).await
    }
}
