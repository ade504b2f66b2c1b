#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use faceswap_comfyui::backend::{BackendError, RenderBackend};
use faceswap_core::graph::{GraphDocument, Node};
use faceswap_core::status::{JobStatus, OutputArtifact};
use faceswap_core::types::{AssetReference, JobHandle};

/// In-memory render backend for orchestration tests.
///
/// Records every submitted document and replays a scripted status
/// sequence; the last entry repeats once the script runs down to it.
pub struct FakeBackend {
    submit_result: Mutex<Option<Result<JobHandle, BackendError>>>,
    statuses: Mutex<VecDeque<Result<JobStatus, BackendError>>>,
    submitted: Mutex<Vec<GraphDocument>>,
    missing_artifacts: Vec<String>,
    polls: AtomicU32,
}

impl FakeBackend {
    pub fn new(statuses: Vec<Result<JobStatus, BackendError>>) -> Arc<Self> {
        Self::build(Ok(JobHandle::new("abc")), statuses, Vec::new())
    }

    pub fn rejecting(error: BackendError) -> Arc<Self> {
        Self::build(Err(error), vec![Ok(JobStatus::Queued)], Vec::new())
    }

    /// Backend whose `/artifact` endpoint fails for the named artifacts.
    pub fn with_missing_artifacts(
        statuses: Vec<Result<JobStatus, BackendError>>,
        missing: &[&str],
    ) -> Arc<Self> {
        Self::build(
            Ok(JobHandle::new("abc")),
            statuses,
            missing.iter().map(|s| s.to_string()).collect(),
        )
    }

    fn build(
        submit_result: Result<JobHandle, BackendError>,
        statuses: Vec<Result<JobStatus, BackendError>>,
        missing_artifacts: Vec<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            submit_result: Mutex::new(Some(submit_result)),
            statuses: Mutex::new(statuses.into()),
            submitted: Mutex::new(Vec::new()),
            missing_artifacts,
            polls: AtomicU32::new(0),
        })
    }

    pub fn submitted(&self) -> Vec<GraphDocument> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn poll_count(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RenderBackend for FakeBackend {
    fn base_url(&self) -> &str {
        "http://render.test"
    }

    async fn submit(&self, doc: &GraphDocument) -> Result<JobHandle, BackendError> {
        self.submitted.lock().unwrap().push(doc.clone());
        self.submit_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(JobHandle::new("abc")))
    }

    async fn status(&self, _job: &JobHandle) -> Result<JobStatus, BackendError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.statuses.lock().unwrap();
        if statuses.len() > 1 {
            statuses.pop_front().unwrap()
        } else {
            statuses.front().cloned().unwrap_or(Ok(JobStatus::Running))
        }
    }

    async fn fetch_artifact(&self, artifact: &OutputArtifact) -> Result<Vec<u8>, BackendError> {
        if self.missing_artifacts.contains(&artifact.name) {
            return Err(BackendError::Rejected {
                status: 404,
                detail: format!("{} not found", artifact.name),
            });
        }
        Ok(format!("bytes of {}", artifact.name).into_bytes())
    }

    async fn upload_asset(
        &self,
        file_name: &str,
        _bytes: Vec<u8>,
    ) -> Result<AssetReference, BackendError> {
        Ok(AssetReference::new(file_name).unwrap())
    }

    async fn probe_ready(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Two `LoadImage` nodes feeding a swap node and a save node.
pub fn faceswap_template() -> GraphDocument {
    GraphDocument::new()
        .with_node(
            "n1",
            Node::new("LoadImage")
                .with_parameter("image", "placeholder_source.png")
                .with_label("Source face"),
        )
        .with_node(
            "n2",
            Node::new("LoadImage")
                .with_parameter("image", "placeholder_target.png")
                .with_label("Target image"),
        )
        .with_node(
            "3",
            Node::new("ReActorFaceSwap")
                .with_parameter("source_image", serde_json::json!(["n1", 0]))
                .with_parameter("input_image", serde_json::json!(["n2", 0])),
        )
        .with_node(
            "4",
            Node::new("SaveImage")
                .with_parameter("images", serde_json::json!(["3", 0]))
                .with_parameter("filename_prefix", "swap"),
        )
}

pub fn asset(name: &str) -> AssetReference {
    AssetReference::new(name).unwrap()
}

pub fn out_png() -> OutputArtifact {
    OutputArtifact::new("out.png", "", "output")
}
