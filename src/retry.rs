//! Retry policy for artifact downloads.
//!
//! Downloads are attempted once by default. When more attempts are
//! configured, each retry waits `min(backoff_step * (attempt - 1), max_backoff)`.

use std::future::Future;
use std::time::Duration;

use log::{error, info};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per artifact, including the first one
    pub max_attempts: u32,
    pub backoff_step_secs: u64,
    pub max_backoff_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff_step_secs: 5,
            max_backoff_secs: 30,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Wait before the given (1-based) attempt.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let secs = self
            .backoff_step_secs
            .saturating_mul(u64::from(attempt.saturating_sub(1)));
        Duration::from_secs(secs.min(self.max_backoff_secs))
    }
}

/// Run `operation` until it succeeds or the policy's attempts are used up.
/// Returns the last error on exhaustion.
pub async fn retry_with_backoff<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        if attempt > 1 {
            let backoff = policy.backoff_for(attempt);
            info!(
                "Retrying {} (attempt {}/{}), waiting for {} seconds...",
                operation_name,
                attempt,
                max_attempts,
                backoff.as_secs()
            );
            tokio::time::sleep(backoff).await;
        }

        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts => {
                if max_attempts > 1 {
                    error!(
                        "All {} attempts failed for {}. Last error: {}",
                        max_attempts, operation_name, e
                    );
                }
                return Err(e);
            }
            Err(e) => {
                error!(
                    "Attempt {}/{} failed for {}: {}",
                    attempt, max_attempts, operation_name, e
                );
            }
        }
    }
}
