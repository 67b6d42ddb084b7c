//! ComfyUI REST client library.
//!
//! Provides the HTTP API wrapper (workflow submission, history and
//! artifact retrieval), typed history payloads, and the completion
//! poller used to wait for a submitted prompt to finish.

pub mod api;
pub mod history;
pub mod poller;

#[cfg(any(test, feature = "mock"))]
pub mod mock;
