use std::{sync::Arc, time::Duration};

use log::warn;
use tokio::time::sleep;

use crate::{FetcherError, RepositoryFetcher, SearchPage, SearchRequest};

/// Decides whether a failed fetch is retried, and after how long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// The delay applied when a throttled response does not tell how long to wait.
    pub throttled_delay: Duration,

    /// The base delay for exponential backoff on transient failures.
    pub transient_base_delay: Duration,

    /// The upper bound of a single transient backoff.
    pub transient_max_delay: Duration,

    /// The maximum number of retries of transient failures for one page, `0` for no limit.
    pub max_transient_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            throttled_delay: Duration::from_secs(60),
            transient_base_delay: Duration::from_secs(5),
            transient_max_delay: Duration::from_secs(300),
            max_transient_retries: 10,
        }
    }
}

impl RetryPolicy {
    fn calculate_exponential_backoff_delay(&self, attempt: u32) -> Duration {
        self.transient_base_delay
            .saturating_mul(2u32.pow(attempt.saturating_sub(1).min(31)))
            .min(self.transient_max_delay)
    }

    /// Returns the delay before retrying, or the error to propagate.
    ///
    /// `transient_attempts` counts the transient failures seen so far for the page, this one included.
    pub fn decide(
        &self,
        error: FetcherError,
        transient_attempts: u32,
    ) -> Result<Duration, FetcherError> {
        match error {
            FetcherError::Throttled { retry_after } => {
                Ok(retry_after.unwrap_or(self.throttled_delay))
            }
            FetcherError::Transport(_)
                if self.max_transient_retries > 0
                    && transient_attempts > self.max_transient_retries =>
            {
                Err(FetcherError::RetriesExhausted {
                    attempts: transient_attempts,
                    source: Box::new(error),
                })
            }
            FetcherError::Transport(_) => {
                Ok(self.calculate_exponential_backoff_delay(transient_attempts))
            }
            FetcherError::Http { .. }
            | FetcherError::Protocol(_)
            | FetcherError::RetriesExhausted { .. } => Err(error),
        }
    }
}

/// A fetcher that retries the same page according to a [RetryPolicy].
pub struct FetcherRetrier {
    /// The fetcher to be retried.
    fetcher: Arc<dyn RepositoryFetcher>,

    /// The retry policy.
    policy: RetryPolicy,
}

impl FetcherRetrier {
    /// Creates a new `FetcherRetrier` instance with the given retry policy.
    pub fn new(fetcher: Arc<dyn RepositoryFetcher>, policy: RetryPolicy) -> Self {
        Self { fetcher, policy }
    }
}

#[async_trait::async_trait]
impl RepositoryFetcher for FetcherRetrier {
    /// Retries the request while the policy allows it.
    async fn fetch(&self, request: &SearchRequest) -> Result<SearchPage, FetcherError> {
        let mut attempts = 0;
        let mut transient_attempts = 0;

        loop {
            attempts += 1;
            match self.fetcher.fetch(request).await {
                Ok(page) => return Ok(page),
                Err(e) => {
                    if matches!(e, FetcherError::Transport(_)) {
                        transient_attempts += 1;
                    }
                    warn!("Fetch attempt #{attempts} failed for {request}: {e}");
                    let delay = self.policy.decide(e, transient_attempts)?;
                    warn!("Retrying in {delay:?}");
                    sleep(delay).await;
                }
            }
        }
    }
}
