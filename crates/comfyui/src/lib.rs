//! Render backend client library.
//!
//! Provides the [`RenderBackend`](backend::RenderBackend) seam with two
//! HTTP implementations (the ComfyUI API and the generic
//! submit/status/artifact contract), the job submitter and status
//! poller, a shared retry/backoff policy, backend readiness probing and
//! job lifecycle events.

pub mod api;
pub mod backend;
pub mod events;
pub mod generic;
pub mod history;
mod http;
pub mod poller;
pub mod readiness;
pub mod retry;
pub mod submit;
