//! Completion polling for submitted prompts.
//!
//! ComfyUI only lists a prompt in `/history` once it has been picked up,
//! so the poller treats an absent entry as "still pending". Each pending
//! round sleeps for a fixed interval; the whole wait is bounded by
//! [`PollConfig::timeout`].

use std::time::Duration;

use tokio::time::Instant;

use crate::api::{ComfyUIApi, ComfyUIApiError};
use crate::history::{HistoryEntry, JobStatus};

/// Tunable parameters for [`wait_for_completion`].
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// Delay between two history queries.
    pub interval: Duration,
    /// Upper bound on the total wait.
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Errors from [`wait_for_completion`].
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// A history query failed.
    #[error(transparent)]
    Api(#[from] ComfyUIApiError),

    /// The prompt did not finish within the configured bound.
    #[error("Prompt {prompt_id} did not finish within {}s", timeout.as_secs())]
    Timeout {
        prompt_id: String,
        timeout: Duration,
    },
}

/// Poll `/history/{prompt_id}` until the prompt completes.
///
/// Returns the terminal history entry. Fails with
/// [`PollError::Timeout`] once `config.timeout` has elapsed, or with
/// [`PollError::Api`] on the first failed query.
pub async fn wait_for_completion(
    api: &ComfyUIApi,
    prompt_id: &str,
    config: &PollConfig,
) -> Result<HistoryEntry, PollError> {
    let started = Instant::now();

    match tokio::time::timeout(config.timeout, poll_until_complete(api, prompt_id, config)).await
    {
        Ok(result) => {
            if result.is_ok() {
                tracing::info!(
                    prompt_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Prompt completed",
                );
            }
            result
        }
        Err(_) => {
            tracing::warn!(
                prompt_id,
                timeout_secs = config.timeout.as_secs(),
                "Gave up waiting for prompt",
            );
            Err(PollError::Timeout {
                prompt_id: prompt_id.to_string(),
                timeout: config.timeout,
            })
        }
    }
}

async fn poll_until_complete(
    api: &ComfyUIApi,
    prompt_id: &str,
    config: &PollConfig,
) -> Result<HistoryEntry, PollError> {
    let mut status = JobStatus::Submitted;
    let mut polls = 0u32;

    loop {
        polls += 1;
        let mut history = api.get_history(prompt_id).await?;
        let entry = history.remove(prompt_id);
        let next = JobStatus::from_entry(entry.as_ref());

        if next != status {
            if !status.can_transition_to(next) {
                tracing::warn!(prompt_id, from = ?status, to = ?next, "Unexpected status change");
            }
            tracing::debug!(prompt_id, from = ?status, to = ?next, polls, "Prompt status changed");
            status = next;
        }

        if status.is_terminal() {
            if let Some(entry) = entry {
                return Ok(entry);
            }
        }

        tokio::time::sleep(config.interval).await;
    }
}
