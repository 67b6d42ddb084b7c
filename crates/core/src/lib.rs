//! Domain core for the ComfyUI image-generation tool.
//!
//! Holds everything that does not talk to the network: the immutable
//! workflow template store, the aspect-ratio resolver, the per-call
//! parameter injector and the artifact naming rules.

pub mod aspect;
pub mod error;
pub mod injector;
pub mod naming;
pub mod types;
pub mod workflow;
