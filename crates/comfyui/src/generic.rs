//! Client for render services exposing the plain job contract:
//!
//! | Method | Path                                  | Reply                                 |
//! |--------|---------------------------------------|---------------------------------------|
//! | POST   | `/submit`                             | `{"jobId": "..."}`                    |
//! | GET    | `/status/{jobId}`                     | `{"state", "outputs"?, "error"?}`     |
//! | GET    | `/artifact?name=&subgroup=&kind=`     | raw bytes                             |
//! | POST   | `/upload?name=`                       | `{"name": "..."}`                     |
//! | GET    | `/health`                             | any 2xx                               |

use async_trait::async_trait;
use serde::Deserialize;

use faceswap_core::graph::GraphDocument;
use faceswap_core::status::{JobStatus, OutputArtifact};
use faceswap_core::types::{AssetReference, JobHandle};

use crate::backend::{BackendError, RenderBackend};
use crate::http;

/// HTTP client for a render service speaking the plain job contract.
pub struct GenericHttpBackend {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitReply {
    #[serde(default)]
    job_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum WireState {
    Queued,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Deserialize)]
struct StatusReply {
    state: WireState,
    #[serde(default)]
    outputs: Option<Vec<OutputArtifact>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadReply {
    name: String,
}

impl StatusReply {
    fn into_status(self) -> JobStatus {
        match self.state {
            WireState::Queued => JobStatus::Queued,
            WireState::Running => JobStatus::Running,
            WireState::Completed => JobStatus::Completed(self.outputs.unwrap_or_default()),
            WireState::Failed => JobStatus::Failed(
                self.error
                    .unwrap_or_else(|| "Job failed without a reported reason".to_string()),
            ),
        }
    }
}

impl GenericHttpBackend {
    pub fn new(base_url: String) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl RenderBackend for GenericHttpBackend {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn submit(&self, doc: &GraphDocument) -> Result<JobHandle, BackendError> {
        let url = http::join(&self.base_url, "submit");
        let response = http::send(self.client.post(&url).json(doc), &url).await?;
        let reply: SubmitReply = http::parse_json(response, &url).await?;

        match reply.job_id {
            Some(id) if !id.is_empty() => Ok(JobHandle::new(id)),
            _ => Err(BackendError::MalformedResponse {
                detail: "submit reply has no jobId".to_string(),
            }),
        }
    }

    /// A 404 means the job is not visible yet and is reported as queued.
    async fn status(&self, job: &JobHandle) -> Result<JobStatus, BackendError> {
        let url = http::join(&self.base_url, &format!("status/{}", job.as_str()));
        let response = http::send(self.client.get(&url), &url).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(JobStatus::Queued);
        }
        let reply: StatusReply = http::parse_json(response, &url).await?;
        Ok(reply.into_status())
    }

    async fn fetch_artifact(&self, artifact: &OutputArtifact) -> Result<Vec<u8>, BackendError> {
        let url = http::join(&self.base_url, "artifact");
        let request = self.client.get(&url).query(&[
            ("name", artifact.name.as_str()),
            ("subgroup", artifact.subgroup.as_str()),
            ("kind", artifact.kind.as_str()),
        ]);
        let response = http::send(request, &url).await?;
        http::read_bytes(response, &url).await
    }

    async fn upload_asset(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<AssetReference, BackendError> {
        let url = http::join(&self.base_url, "upload");
        let request = self
            .client
            .post(&url)
            .query(&[("name", file_name)])
            .body(bytes);
        let response = http::send(request, &url).await?;
        let reply: UploadReply = http::parse_json(response, &url).await?;
        AssetReference::new(reply.name).map_err(|e| BackendError::MalformedResponse {
            detail: format!("upload reply: {e}"),
        })
    }

    async fn probe_ready(&self) -> Result<(), BackendError> {
        let url = http::join(&self.base_url, "health");
        let response = http::send(self.client.get(&url), &url).await?;
        http::check_status(response).await
    }
}
