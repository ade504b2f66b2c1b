//! Extraction of output artifacts from a finished job.

use std::collections::HashSet;

use crate::error::CollectError;
use crate::status::{JobStatus, OutputArtifact};

/// Artifacts of a `Completed` job, in backend order, without repeats.
///
/// Two descriptors are repeats when `name`, `subgroup` and `kind` are all
/// identical; the first occurrence is kept. A completed job with no
/// artifacts is an application failure. Calling this on any other status
/// is a caller bug and reported as [`CollectError::NotCompleted`].
pub fn collect_artifacts(status: &JobStatus) -> Result<Vec<OutputArtifact>, CollectError> {
    let JobStatus::Completed(outputs) = status else {
        return Err(CollectError::NotCompleted {
            state: status.label(),
        });
    };

    let mut seen = HashSet::with_capacity(outputs.len());
    let artifacts: Vec<OutputArtifact> = outputs
        .iter()
        .filter(|artifact| seen.insert(*artifact))
        .cloned()
        .collect();

    if artifacts.is_empty() {
        return Err(CollectError::NoArtifactsProduced);
    }
    Ok(artifacts)
}
