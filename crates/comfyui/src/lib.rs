//! ComfyUI job client.
//!
//! Stages input media into the engine's input directory, submits
//! injected workflows over the REST API, polls history until the
//! selected output node reports a result, and resolves that result to
//! a file in the engine's output directory.

pub mod api;
pub mod history;
pub mod job;
pub mod resolve;
pub mod staging;
