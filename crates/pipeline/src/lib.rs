//! Face-swap job pipeline.
//!
//! Composes the pure graph logic of `faceswap-core` with a
//! [`RenderBackend`](faceswap_comfyui::backend::RenderBackend) into one
//! operation: patch the template, submit it, wait for the job and collect
//! its output artifacts. Also resolves input assets from URLs, `data:` URIs
//! or local paths and publishes fetched outputs.

pub mod error;
pub mod orchestrator;
pub mod publish;
pub mod resolver;

pub use error::JobError;
pub use orchestrator::{JobOutcome, Orchestrator, RunOptions};
