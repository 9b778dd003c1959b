use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use refrain_common::{RefrainError, Result};

use crate::pacing::Pacer;

/// Why a single upstream request failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FetchFailure {
    /// Transport error, timeout or 5xx. Worth retrying.
    #[error("transient failure: {0}")]
    Transient(String),
    /// 4xx or an upstream status code other than success. Retrying won't help.
    #[error("rejected: {0}")]
    Rejected(String),
    /// The payload could not be decoded at all.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Result of fetching one page after retries.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome<T> {
    Fetched(T),
    /// The retry budget ran out or the upstream refused. The caller records it and moves on.
    Abandoned(FetchFailure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Sleep `base_delay * 2^attempt` between attempts.
    pub base_delay: Duration,
    /// Upper bound for a single attempt.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            timeout: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .checked_mul(2u32.saturating_pow(attempt))
            .unwrap_or(Duration::MAX)
    }

    /// Run `op` until it succeeds, fails permanently, or the attempt budget is spent.
    /// Every attempt is followed by `pacer`'s delay, success or not.
    ///
    /// Only an undecodable payload becomes `Err`; everything else is a [`PageOutcome`].
    pub async fn fetch<T, F, Fut>(&self, pacer: &Pacer, mut op: F) -> Result<PageOutcome<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, FetchFailure>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last = FetchFailure::Transient("no attempt made".to_string());

        for attempt in 0..attempts {
            let result = match tokio::time::timeout(self.timeout, op()).await {
                Ok(r) => r,
                Err(_) => Err(FetchFailure::Transient(format!(
                    "timed out after {}s",
                    self.timeout.as_secs()
                ))),
            };
            pacer.pause().await;

            match result {
                Ok(value) => return Ok(PageOutcome::Fetched(value)),
                Err(FetchFailure::Malformed(msg)) => return Err(RefrainError::Upstream(msg)),
                Err(failure @ FetchFailure::Rejected(_)) => return Ok(PageOutcome::Abandoned(failure)),
                Err(failure @ FetchFailure::Transient(_)) => {
                    if attempt + 1 < attempts {
                        let backoff = self.backoff(attempt);
                        warn!(
                            attempt = attempt + 1,
                            backoff_ms = backoff.as_millis() as u64,
                            error = %failure,
                            "Transient fetch failure, retrying after backoff"
                        );
                        tokio::time::sleep(backoff).await;
                    }
                    last = failure;
                }
            }
        }

        Ok(PageOutcome::Abandoned(last))
    }
}
