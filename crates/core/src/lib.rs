//! Domain types for driving ComfyUI job graphs.
//!
//! Holds the typed workflow model, the parameter injector that writes
//! caller values into template nodes, and the on-disk template store.
//! Nothing in this crate talks to the engine over the network.

pub mod error;
pub mod injection;
pub mod task;
pub mod templates;
pub mod workflow;
