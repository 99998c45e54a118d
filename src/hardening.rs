use crate::constants::RETRYABLE_STATUS_CODES;
use crate::types::{BetwiseError, ObservedError, Result};
use std::future::Future;
use std::time::Duration;

/// Jittered exponential backoff for opening a model response. Only the
/// initial request is retried; a stream that fails midway is not replayed.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 500)
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
        }
    }

    pub async fn execute_with_retry<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match operation().await {
                Ok(val) => return Ok(val),
                Err(e) if attempts < self.max_attempts && Self::is_retryable(&e) => {
                    let delay = self.delay_for(attempts);
                    tracing::warn!(
                        "[RETRY] Request failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempts,
                        self.max_attempts,
                        e.inner,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Base delay doubled per attempt, with up to 25% jitter either way.
    fn delay_for(&self, attempt: u32) -> Duration {
        let base_delay = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        let jitter_range = base_delay / 4;
        let jitter = if jitter_range > 0 {
            fastrand::i64(-(jitter_range as i64)..jitter_range as i64)
        } else {
            0
        };
        Duration::from_millis((base_delay as i64 + jitter).max(1) as u64)
    }

    pub fn is_retryable(err: &ObservedError) -> bool {
        match &err.inner {
            BetwiseError::Network(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            BetwiseError::Io(_) => true,
            BetwiseError::Upstream(status, _) => RETRYABLE_STATUS_CODES.contains(&status.as_u16()),
            _ => false,
        }
    }
}
