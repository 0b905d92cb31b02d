use std::{sync::Arc, time::Duration};

use anyhow::Context;
use log::warn;
use tokio::time::sleep;

use crate::{RepositoryPersister, RepositoryRecord, StdResult};

/// Retries a [RepositoryPersister] with exponential backoff, up to a maximum number of attempts.
///
/// Upserts are idempotent, so a batch whose outcome is unknown can safely be written again.
pub struct PersisterRetrier {
    persister: Arc<dyn RepositoryPersister>,
    max_attempts: u32,
    base_delay: Duration,
}

impl PersisterRetrier {
    /// Creates a new `PersisterRetrier` instance.
    pub fn new(
        persister: Arc<dyn RepositoryPersister>,
        max_attempts: u32,
        base_delay: Duration,
    ) -> Self {
        Self {
            persister,
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    fn backoff_delay(&self, failed_attempts: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.pow(failed_attempts.saturating_sub(1).min(31)))
    }
}

#[async_trait::async_trait]
impl RepositoryPersister for PersisterRetrier {
    async fn persist(&self, repositories: &[RepositoryRecord]) -> StdResult<u64> {
        let mut failed_attempts = 0;

        loop {
            let result = self.persister.persist(repositories).await;
            match result {
                Ok(rows_affected) => return Ok(rows_affected),
                Err(e) if failed_attempts + 1 >= self.max_attempts => {
                    return Err(e).with_context(|| {
                        format!(
                            "Failed to persist {} repositories after {} attempts",
                            repositories.len(),
                            failed_attempts + 1
                        )
                    });
                }
                Err(e) => {
                    failed_attempts += 1;
                    let delay = self.backoff_delay(failed_attempts);
                    warn!("Persist attempt #{failed_attempts} failed, retrying in {delay:?}: {e}");
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use mockall::predicate::eq;
    use tokio::time::Instant;

    use super::*;
    use crate::MockRepositoryPersister;

    fn batch() -> Vec<RepositoryRecord> {
        vec![RepositoryRecord::dummy("1", 100)]
    }

    #[tokio::test(start_paused = true)]
    async fn persist_success_on_first_attempt() {
        let persister = {
            let mut persister = MockRepositoryPersister::new();
            persister
                .expect_persist()
                .with(eq(batch()))
                .returning(|_| Ok(1))
                .times(1);

            persister
        };
        let retrier = PersisterRetrier::new(Arc::new(persister), 3, Duration::from_millis(10));

        let rows_affected = retrier.persist(&batch()).await.unwrap();

        assert_eq!(rows_affected, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn persist_success_after_backing_off() {
        let persister = {
            let mut persister = MockRepositoryPersister::new();
            persister
                .expect_persist()
                .returning(|_| Err(anyhow!("Connection reset")))
                .times(2);
            persister.expect_persist().returning(|_| Ok(1)).times(1);

            persister
        };
        let retrier = PersisterRetrier::new(Arc::new(persister), 3, Duration::from_secs(1));
        let start = Instant::now();

        let rows_affected = retrier.persist(&batch()).await.unwrap();

        assert_eq!(rows_affected, 1);
        assert!(start.elapsed() >= Duration::from_secs(1 + 2));
    }

    #[tokio::test(start_paused = true)]
    async fn persist_failure_after_max_attempts() {
        let persister = {
            let mut persister = MockRepositoryPersister::new();
            persister
                .expect_persist()
                .returning(|_| Err(anyhow!("Connection reset")))
                .times(3);

            persister
        };
        let retrier = PersisterRetrier::new(Arc::new(persister), 3, Duration::from_millis(10));

        retrier
            .persist(&batch())
            .await
            .expect_err("Should return an error after max attempts");
    }
}
