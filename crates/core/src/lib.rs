//! Pure graph and job-state logic for the face-swap render pipeline.
//!
//! Nothing in this crate performs I/O. It models the workflow graph
//! document, discovers and binds the two input-image slots, and turns a
//! terminal job status into output artifact descriptors. The HTTP side
//! lives in `faceswap-comfyui`; composition lives in `faceswap-pipeline`.

pub mod collect;
pub mod error;
pub mod graph;
pub mod patch;
pub mod slots;
pub mod status;
pub mod types;
