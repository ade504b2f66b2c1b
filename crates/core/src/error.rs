/// Errors raised while reading a workflow document.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Workflow JSON must be an object keyed by node id")]
    NotAnObject,

    #[error("Workflow JSON must contain at least one node")]
    Empty,

    #[error("Node '{node_id}' is invalid: {reason}")]
    InvalidNode { node_id: String, reason: String },

    #[error("Asset reference must not be empty")]
    EmptyAssetReference,

    #[error("Malformed workflow JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from binding asset references into a workflow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    /// An explicitly named slot does not exist in the document.
    #[error("Slot not found: node '{node_id}' has no parameter '{parameter}'")]
    SlotNotFound { node_id: String, parameter: String },

    /// Fewer than two distinct slots were available to bind.
    #[error("Insufficient asset slots: need 2, found {found}")]
    InsufficientSlots { found: usize },
}

/// Errors from turning a terminal job status into artifacts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectError {
    /// Collect was called on a status other than `Completed`.
    #[error("Cannot collect artifacts from a job in state '{state}'")]
    NotCompleted { state: &'static str },

    #[error("Job completed but produced no output artifacts")]
    NoArtifactsProduced,
}
