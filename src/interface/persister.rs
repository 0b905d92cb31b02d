use crate::{RepositoryRecord, StdResult};

/// A trait for persisting repository data to a storage medium.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RepositoryPersister: Sync + Send {
    /// Inserts or updates the repositories, keyed by their identifier, and returns the number of rows affected.
    async fn persist(&self, data: &[RepositoryRecord]) -> StdResult<u64>;
}
