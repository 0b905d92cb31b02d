use std::collections::{HashMap, hash_map::Entry};

use chrono::{DateTime, Utc};
use log::debug;
use tokio::sync::RwLock;

use crate::{RepositoryId, RepositoryPersister, RepositoryRecord, StdResult};

/// A stored repository row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRepository {
    /// The repository as first inserted, with the latest number of stars.
    pub repository: RepositoryRecord,

    /// The last time the repository was persisted.
    pub last_seen_at: DateTime<Utc>,
}

/// A persister that keeps repositories in memory, with the same upsert semantics as the database.
#[derive(Debug, Default)]
pub struct InMemoryPersister {
    rows: RwLock<HashMap<RepositoryId, StoredRepository>>,
}

impl InMemoryPersister {
    /// Creates a new empty `InMemoryPersister`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieves the number of stored repositories.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Whether no repository is stored.
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Retrieves a stored repository.
    pub async fn get(&self, repo_id: &RepositoryId) -> Option<StoredRepository> {
        self.rows.read().await.get(repo_id).cloned()
    }
}

#[async_trait::async_trait]
impl RepositoryPersister for InMemoryPersister {
    async fn persist(&self, data: &[RepositoryRecord]) -> StdResult<u64> {
        let now = Utc::now();
        let mut rows = self.rows.write().await;
        for repository in data {
            match rows.entry(repository.repo_id().clone()) {
                Entry::Occupied(mut entry) => {
                    let stored = entry.get_mut();
                    stored.repository = stored
                        .repository
                        .clone()
                        .with_stargazer_count(*repository.stargazer_count());
                    stored.last_seen_at = now;
                    debug!("Updated {repository}");
                }
                Entry::Vacant(entry) => {
                    entry.insert(StoredRepository {
                        repository: repository.clone(),
                        last_seen_at: now,
                    });
                    debug!("Inserted {repository}");
                }
            }
        }

        Ok(data.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn persist_same_repository_twice_keeps_one_row() {
        let persister = InMemoryPersister::new();
        let repository = RepositoryRecord::dummy("1", 10);

        persister.persist(&[repository.clone()]).await.unwrap();
        persister.persist(&[repository.clone()]).await.unwrap();

        let stored = persister.get(repository.repo_id()).await.unwrap();
        assert_eq!(persister.len().await, 1);
        assert_eq!(stored.repository, repository);
    }

    #[tokio::test]
    async fn persist_updates_stars_without_new_row() {
        let persister = InMemoryPersister::new();
        let repository = RepositoryRecord::dummy("1", 10);
        persister.persist(&[repository.clone()]).await.unwrap();
        let first_seen_at = persister
            .get(repository.repo_id())
            .await
            .unwrap()
            .last_seen_at;

        let rows_affected = persister
            .persist(&[repository.clone().with_stargazer_count(25)])
            .await
            .unwrap();

        let stored = persister.get(repository.repo_id()).await.unwrap();
        assert_eq!(rows_affected, 1);
        assert_eq!(persister.len().await, 1);
        assert_eq!(*stored.repository.stargazer_count(), 25);
        assert_eq!(stored.repository.full_name(), repository.full_name());
        assert!(stored.last_seen_at >= first_seen_at);
    }

    #[tokio::test]
    async fn persist_reports_rows_affected() {
        let persister = InMemoryPersister::new();

        let rows_affected = persister
            .persist(&[
                RepositoryRecord::dummy("1", 10),
                RepositoryRecord::dummy("2", 20),
            ])
            .await
            .unwrap();

        assert_eq!(rows_affected, 2);
        assert!(!persister.is_empty().await);
    }
}
