//! Job request parsing.
//!
//! A request is one JSON object: `{"op": "health_check"}` or
//! `{"op": "faceswap", "source_url": "...", "target_url": "..."}`. A
//! missing `op` means `health_check`.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("Invalid job request JSON: {0}")]
    Json(String),

    #[error("Unknown op '{0}'.")]
    UnknownOp(String),

    #[error("Provide 'source_url' and 'target_url'.")]
    MissingAssets,
}

#[derive(Debug, Deserialize)]
struct RawRequest {
    #[serde(default)]
    op: Option<String>,
    #[serde(default)]
    source_url: Option<String>,
    #[serde(default)]
    target_url: Option<String>,
}

/// A validated job request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRequest {
    HealthCheck,
    FaceSwap { source: String, target: String },
}

impl JobRequest {
    /// Parse a request body. Accepts the bare request object or one
    /// wrapped in `{"input": {...}}`.
    pub fn parse(body: &str) -> Result<Self, RequestError> {
        let mut value: serde_json::Value =
            serde_json::from_str(body).map_err(|e| RequestError::Json(e.to_string()))?;
        if let Some(input) = value.get_mut("input").map(serde_json::Value::take) {
            value = input;
        }
        let raw: RawRequest =
            serde_json::from_value(value).map_err(|e| RequestError::Json(e.to_string()))?;

        match raw.op.as_deref().unwrap_or("health_check") {
            "health_check" => Ok(JobRequest::HealthCheck),
            "faceswap" => {
                let non_empty = |s: Option<String>| s.filter(|s| !s.trim().is_empty());
                match (non_empty(raw.source_url), non_empty(raw.target_url)) {
                    (Some(source), Some(target)) => Ok(JobRequest::FaceSwap { source, target }),
                    _ => Err(RequestError::MissingAssets),
                }
            }
            other => Err(RequestError::UnknownOp(other.to_string())),
        }
    }
}
