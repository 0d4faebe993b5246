// Bounded retry with exponential backoff and an overall deadline.
// Every call to a remote collaborator (document source, embeddings, chat model)
// goes through `RetryPolicy::run` so a flaky network does not kill a long ingestion.

use crate::core::errors::RagError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one. `1` disables retrying.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Upper bound for all attempts and sleeps combined.
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(16),
            deadline: Some(Duration::from_secs(120)),
        }
    }
}

impl RetryPolicy {
    /// Policy that makes exactly one attempt.
    #[cfg(test)]
    pub fn no_retry() -> Self {
        Self::immediate(1)
    }

    /// Up to `max_attempts` attempts with no backoff and no deadline.
    #[cfg(test)]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            deadline: None,
        }
    }

    /// Backoff before attempt `attempt + 1` (attempt is 1-based), with up to 25% jitter.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let base = self
            .initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff);

        let jitter_cap = base.as_millis() as u64 / 4;
        if jitter_cap == 0 {
            return base;
        }
        let jitter = rand::thread_rng().gen_range(0..=jitter_cap);
        (base + Duration::from_millis(jitter)).min(self.max_backoff.max(base))
    }

    /// Runs `op` until it succeeds, fails permanently, or the attempts/deadline run out.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, RagError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RagError>>,
    {
        let max_attempts = self.max_attempts.max(1);

        let attempts = async {
            let mut attempt = 1u32;
            loop {
                match op().await {
                    Ok(value) => return Ok(value),
                    Err(err) if err.is_transient() && attempt < max_attempts => {
                        let wait = self.backoff_for(attempt);
                        tracing::warn!(
                            operation,
                            attempt,
                            max_attempts,
                            wait_ms = wait.as_millis() as u64,
                            "Transient failure, retrying: {}",
                            err
                        );
                        tokio::time::sleep(wait).await;
                        attempt += 1;
                    }
                    Err(err) => return Err(err),
                }
            }
        };

        match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, attempts)
                .await
                .map_err(|_| RagError::DeadlineExceeded {
                    operation: operation.to_string(),
                    deadline,
                })?,
            None => attempts.await,
        }
    }
}
