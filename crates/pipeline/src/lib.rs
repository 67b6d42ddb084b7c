//! Image generation pipeline.
//!
//! Ties the domain core to the ComfyUI client: inject parameters,
//! submit, wait for completion, fetch the save node's image, and
//! persist it next to a prompt sidecar.

pub mod error;
pub mod generator;
pub mod persist;
pub mod retrieve;

pub use error::GenerationError;
pub use generator::{GeneratorSettings, ImageGenerator};
pub use persist::{ArtifactStore, GeneratedImage};
