//! Publishing fetched output artifacts.
//!
//! After a job completes, [`publish_all`] downloads each artifact from the
//! render backend and hands the bytes to an [`ArtifactPublisher`]. A
//! failure to fetch or publish one artifact is logged and recorded as a
//! missing locator; it never fails the job result.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;

use faceswap_comfyui::backend::{BackendError, RenderBackend};
use faceswap_core::status::OutputArtifact;

/// Errors from publishing a single artifact.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Artifact name '{name}' is not a plain relative path")]
    InvalidName { name: String },

    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to fetch artifact: {0}")]
    Fetch(#[from] BackendError),
}

/// Stores artifact bytes somewhere callers can reach them.
#[async_trait]
pub trait ArtifactPublisher: Send + Sync {
    /// Store `bytes` and return a locator (URL) for them.
    async fn publish(&self, artifact: &OutputArtifact, bytes: &[u8]) -> Result<String, PublishError>;
}

/// An artifact descriptor with the locator it was published under, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedArtifact {
    #[serde(flatten)]
    pub artifact: OutputArtifact,
    pub locator: Option<String>,
}

/// Writes artifacts below a local directory, mirroring their subgroup.
///
/// Artifacts of kind `output` land at `root/subgroup/name`; any other kind
/// gets its own top-level directory (`root/temp/subgroup/name`) so equally
/// named outputs of different kinds never overwrite each other.
#[derive(Debug, Clone)]
pub struct LocalDirectoryPublisher {
    root: PathBuf,
}

impl LocalDirectoryPublisher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn target_path(&self, artifact: &OutputArtifact) -> Result<PathBuf, PublishError> {
        let mut path = self.root.clone();
        if !artifact.kind.is_empty() && artifact.kind != "output" {
            path.push(plain_relative(&artifact.kind)?);
        }
        if !artifact.subgroup.is_empty() {
            path.push(plain_relative(&artifact.subgroup)?);
        }
        path.push(plain_relative(&artifact.name)?);
        Ok(path)
    }
}

#[async_trait]
impl ArtifactPublisher for LocalDirectoryPublisher {
    async fn publish(&self, artifact: &OutputArtifact, bytes: &[u8]) -> Result<String, PublishError> {
        let path = self.target_path(artifact)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error(parent))?;
        }
        tokio::fs::write(&path, bytes).await.map_err(io_error(&path))?;
        let absolute = tokio::fs::canonicalize(&path).await.map_err(io_error(&path))?;

        Ok(format!("file://{}", absolute.display()))
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PublishError {
    let path = path.display().to_string();
    move |source| PublishError::Io { path, source }
}

/// Accept only names made of normal path components.
fn plain_relative(name: &str) -> Result<&Path, PublishError> {
    let path = Path::new(name);
    let plain = !name.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)));
    if plain {
        Ok(path)
    } else {
        Err(PublishError::InvalidName {
            name: name.to_string(),
        })
    }
}

/// Fetch every artifact from `backend` and publish it.
///
/// Returns one entry per artifact, in input order. Entries whose fetch or
/// publish failed carry `locator: None`.
pub async fn publish_all(
    backend: &dyn RenderBackend,
    publisher: &dyn ArtifactPublisher,
    artifacts: &[OutputArtifact],
) -> Vec<PublishedArtifact> {
    let mut published = Vec::with_capacity(artifacts.len());

    for artifact in artifacts {
        let locator = match publish_one(backend, publisher, artifact).await {
            Ok(locator) => {
                tracing::info!(artifact = %artifact.name, locator = %locator, "Artifact published");
                Some(locator)
            }
            Err(e) => {
                tracing::warn!(artifact = %artifact.name, error = %e, "Failed to publish artifact");
                None
            }
        };
        published.push(PublishedArtifact {
            artifact: artifact.clone(),
            locator,
        });
    }

    published
}

async fn publish_one(
    backend: &dyn RenderBackend,
    publisher: &dyn ArtifactPublisher,
    artifact: &OutputArtifact,
) -> Result<String, PublishError> {
    let bytes = backend.fetch_artifact(artifact).await?;
    publisher.publish(artifact, &bytes).await
}
