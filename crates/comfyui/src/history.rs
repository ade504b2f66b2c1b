//! ComfyUI `/history` and `/queue` payloads.
//!
//! `GET /history/{prompt_id}` answers `{}` until the prompt finishes, then
//! `{"<prompt_id>": {"outputs": {...}, "status": {...}}}`. Outputs are keyed
//! by output node id; each node maps media keys (`images`, `gifs`,
//! `videos`, ...) to lists of `{filename, subfolder, type}` records.
//! `GET /queue` lists running and pending prompts as
//! `[number, prompt_id, ...]` tuples.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use faceswap_core::status::{JobStatus, OutputArtifact};

/// `status_str` reported for failed or interrupted prompts.
const STATUS_ERROR: &str = "error";

/// Message name carrying the exception of a failed node.
const MSG_EXECUTION_ERROR: &str = "execution_error";

/// Message name recorded when a prompt was interrupted.
const MSG_EXECUTION_INTERRUPTED: &str = "execution_interrupted";

/// One finished prompt in the history.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEntry {
    /// Output node id -> media key -> value, in backend order.
    #[serde(default)]
    pub outputs: IndexMap<String, IndexMap<String, Value>>,
    #[serde(default)]
    pub status: Option<HistoryStatus>,
}

/// Execution summary of a finished prompt.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryStatus {
    #[serde(default)]
    pub status_str: Option<String>,
    #[serde(default)]
    pub completed: bool,
    /// `[name, data]` pairs such as `["execution_error", {...}]`.
    #[serde(default)]
    pub messages: Vec<(String, Value)>,
}

/// A file record inside a node's output lists.
#[derive(Debug, Clone, Deserialize)]
pub struct FileRecord {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// Payload of `GET /queue`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueSnapshot {
    #[serde(default)]
    pub queue_running: Vec<Vec<Value>>,
    #[serde(default)]
    pub queue_pending: Vec<Vec<Value>>,
}

impl QueueSnapshot {
    /// Queue-derived status of a prompt that has no history entry yet.
    ///
    /// A prompt missing from both lists has not become visible yet and
    /// is treated as queued.
    pub fn status_of(&self, prompt_id: &str) -> JobStatus {
        if contains_prompt(&self.queue_running, prompt_id) {
            JobStatus::Running
        } else {
            JobStatus::Queued
        }
    }
}

fn contains_prompt(entries: &[Vec<Value>], prompt_id: &str) -> bool {
    entries
        .iter()
        .any(|entry| entry.get(1).and_then(Value::as_str) == Some(prompt_id))
}

impl HistoryEntry {
    /// Map the entry to a job status.
    pub fn to_status(&self) -> JobStatus {
        let failed = self
            .status
            .as_ref()
            .is_some_and(|s| s.status_str.as_deref() == Some(STATUS_ERROR));
        if failed {
            return JobStatus::Failed(self.failure_reason());
        }

        let completed = self.status.as_ref().map_or(true, |s| {
            s.completed || s.status_str.as_deref() == Some("success")
        });
        if completed {
            JobStatus::Completed(self.artifacts())
        } else {
            JobStatus::Running
        }
    }

    /// Every file record across all output nodes, in backend order.
    pub fn artifacts(&self) -> Vec<OutputArtifact> {
        self.outputs
            .values()
            .flat_map(|media| media.values())
            .filter_map(Value::as_array)
            .flatten()
            .filter_map(|item| serde_json::from_value::<FileRecord>(item.clone()).ok())
            .map(|f| OutputArtifact::new(f.filename, f.subfolder, f.kind))
            .collect()
    }

    fn failure_reason(&self) -> String {
        let messages = self.status.iter().flat_map(|s| s.messages.iter());
        for (name, data) in messages {
            if name == MSG_EXECUTION_ERROR {
                if let Some(message) = data.get("exception_message").and_then(Value::as_str) {
                    return message.to_string();
                }
                return data.to_string();
            }
            if name == MSG_EXECUTION_INTERRUPTED {
                return "Execution interrupted".to_string();
            }
        }
        "Execution failed without a reported reason".to_string()
    }
}

/// Parse a `/history/{prompt_id}` body. `None` means the prompt has no
/// history entry yet.
pub fn parse_history(body: &Value, prompt_id: &str) -> Result<Option<HistoryEntry>, serde_json::Error> {
    match body.get(prompt_id) {
        Some(entry) => serde_json::from_value(entry.clone()).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(value: Value) -> HistoryEntry {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn missing_prompt_has_no_entry() {
        assert!(parse_history(&json!({}), "abc").unwrap().is_none());
    }

    #[test]
    fn successful_entry_collects_all_output_nodes_in_order() {
        let body = json!({
            "abc": {
                "outputs": {
                    "9": { "images": [
                        { "filename": "swap_00001_.png", "subfolder": "", "type": "output" },
                        { "filename": "swap_00002_.png", "subfolder": "", "type": "output" }
                    ] },
                    "4": { "gifs": [ { "filename": "anim.gif", "subfolder": "clips", "type": "output" } ],
                           "text": ["not a file"] }
                },
                "status": { "status_str": "success", "completed": true, "messages": [] }
            }
        });

        let status = parse_history(&body, "abc").unwrap().unwrap().to_status();
        assert_eq!(
            status,
            JobStatus::Completed(vec![
                OutputArtifact::new("swap_00001_.png", "", "output"),
                OutputArtifact::new("swap_00002_.png", "", "output"),
                OutputArtifact::new("anim.gif", "clips", "output"),
            ])
        );
    }

    #[test]
    fn error_entry_reports_exception_message() {
        let status = entry(json!({
            "outputs": {},
            "status": {
                "status_str": "error",
                "completed": false,
                "messages": [
                    ["execution_start", { "prompt_id": "abc" }],
                    ["execution_error", { "node_id": "7", "exception_message": "No face detected in source image", "exception_type": "RuntimeError" }]
                ]
            }
        }))
        .to_status();
        assert_eq!(status, JobStatus::Failed("No face detected in source image".into()));
    }

    #[test]
    fn interrupted_entry_is_failed() {
        let status = entry(json!({
            "status": { "status_str": "error", "messages": [["execution_interrupted", {}]] }
        }))
        .to_status();
        assert_eq!(status, JobStatus::Failed("Execution interrupted".into()));
    }

    #[test]
    fn entry_without_status_but_outputs_is_completed() {
        let status = entry(json!({
            "outputs": { "9": { "images": [{ "filename": "a.png", "type": "output" }] } }
        }))
        .to_status();
        assert_eq!(status, JobStatus::Completed(vec![OutputArtifact::new("a.png", "", "output")]));
    }

    #[test]
    fn incomplete_entry_is_running() {
        let status = entry(json!({
            "outputs": {},
            "status": { "status_str": "running", "completed": false }
        }))
        .to_status();
        assert_eq!(status, JobStatus::Running);
    }

    #[test]
    fn queue_snapshot_distinguishes_running_and_pending() {
        let queue: QueueSnapshot = serde_json::from_value(json!({
            "queue_running": [[4, "run-1", {}, {}, ["9"]]],
            "queue_pending": [[5, "pend-1", {}, {}, ["9"]]]
        }))
        .unwrap();

        assert_eq!(queue.status_of("run-1"), JobStatus::Running);
        assert_eq!(queue.status_of("pend-1"), JobStatus::Queued);
        assert_eq!(queue.status_of("unknown"), JobStatus::Queued);
    }
}
