//! Speech-to-text, text-to-speech and lipsync jobs on a ComfyUI engine.
//!
//! [`Orchestrator`] is the entry point: it stages inputs, loads and
//! injects the task's workflow template, submits it and waits for the
//! result. Each task's node roles and output location live in
//! [`tasks`].

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod tasks;

pub use config::PipelineConfig;
pub use error::{ErrorKind, PipelineError};
pub use orchestrator::Orchestrator;
