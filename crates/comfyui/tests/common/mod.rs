#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use faceswap_comfyui::backend::{BackendError, RenderBackend};
use faceswap_core::graph::GraphDocument;
use faceswap_core::status::{JobStatus, OutputArtifact};
use faceswap_core::types::{AssetReference, JobHandle};

/// In-memory render backend that replays a scripted status sequence.
///
/// When the script runs down to its last entry, that entry repeats
/// forever (e.g. a job stuck in `Running`).
pub struct ScriptedBackend {
    statuses: Mutex<VecDeque<Result<JobStatus, BackendError>>>,
    submit_results: Mutex<VecDeque<Result<JobHandle, BackendError>>>,
    ready_after: u32,
    pub polls: AtomicU32,
    pub submits: AtomicU32,
    pub probes: AtomicU32,
}

impl ScriptedBackend {
    pub fn new(statuses: Vec<Result<JobStatus, BackendError>>) -> Arc<Self> {
        Arc::new(Self {
            statuses: Mutex::new(statuses.into()),
            submit_results: Mutex::new(VecDeque::new()),
            ready_after: 0,
            polls: AtomicU32::new(0),
            submits: AtomicU32::new(0),
            probes: AtomicU32::new(0),
        })
    }

    pub fn with_submit_results(results: Vec<Result<JobHandle, BackendError>>) -> Arc<Self> {
        Arc::new(Self {
            statuses: Mutex::new(VecDeque::new()),
            submit_results: Mutex::new(results.into()),
            ready_after: 0,
            polls: AtomicU32::new(0),
            submits: AtomicU32::new(0),
            probes: AtomicU32::new(0),
        })
    }

    /// Readiness probes fail until `probes` have been made.
    pub fn ready_after(probes: u32) -> Arc<Self> {
        Arc::new(Self {
            statuses: Mutex::new(VecDeque::new()),
            submit_results: Mutex::new(VecDeque::new()),
            ready_after: probes,
            polls: AtomicU32::new(0),
            submits: AtomicU32::new(0),
            probes: AtomicU32::new(0),
        })
    }

    pub fn poll_count(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn submit_count(&self) -> u32 {
        self.submits.load(Ordering::SeqCst)
    }
}

pub fn unreachable() -> BackendError {
    BackendError::Unreachable {
        url: "http://render.test".into(),
        detail: "connection reset by peer".into(),
    }
}

#[async_trait]
impl RenderBackend for ScriptedBackend {
    fn base_url(&self) -> &str {
        "http://render.test"
    }

    async fn submit(&self, _doc: &GraphDocument) -> Result<JobHandle, BackendError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        self.submit_results
            .lock()
            .unwrap()
            .pop_front()
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
        Ok(artifact.name.as_bytes().to_vec())
    }

    async fn upload_asset(
        &self,
        file_name: &str,
        _bytes: Vec<u8>,
    ) -> Result<AssetReference, BackendError> {
        Ok(AssetReference::new(file_name).unwrap())
    }

    async fn probe_ready(&self) -> Result<(), BackendError> {
        let made = self.probes.fetch_add(1, Ordering::SeqCst) + 1;
        if made > self.ready_after {
            Ok(())
        } else {
            Err(unreachable())
        }
    }
}
