use std::collections::HashMap;

use log::{debug, info};
use sqlx::{PgPool, Postgres, QueryBuilder, postgres::PgPoolOptions};

use crate::{RepositoryId, RepositoryPersister, RepositoryRecord, StdResult};

const CREATE_REPOSITORIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS repositories (
    repo_id TEXT PRIMARY KEY,
    owner_login TEXT NOT NULL,
    name TEXT NOT NULL,
    full_name TEXT NOT NULL,
    url TEXT NOT NULL,
    stargazer_count BIGINT NOT NULL,
    fetched_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
)
"#;

const CREATE_STARGAZER_COUNT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS repositories_stargazer_count_idx
    ON repositories (stargazer_count DESC)
"#;

const UPSERT_CONFLICT_CLAUSE: &str = " ON CONFLICT (repo_id) DO UPDATE SET \
    stargazer_count = EXCLUDED.stargazer_count, fetched_at = CURRENT_TIMESTAMP";

/// Keeps the last observation of each repository, in order of first appearance.
///
/// A single upsert statement cannot touch the same row twice.
pub(crate) fn latest_observations(data: &[RepositoryRecord]) -> Vec<&RepositoryRecord> {
    let mut positions: HashMap<&RepositoryId, usize> = HashMap::new();
    let mut repositories: Vec<&RepositoryRecord> = Vec::with_capacity(data.len());
    for repository in data {
        match positions.get(repository.repo_id()).copied() {
            Some(position) => repositories[position] = repository,
            None => {
                positions.insert(repository.repo_id(), repositories.len());
                repositories.push(repository);
            }
        }
    }

    repositories
}

/// Builds one statement inserting the repositories, or refreshing stars and fetch time of the
/// rows already stored.
fn upsert_query(repositories: Vec<&RepositoryRecord>) -> QueryBuilder<'static, Postgres> {
    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "INSERT INTO repositories (repo_id, owner_login, name, full_name, url, stargazer_count) ",
    );
    query_builder.push_values(repositories, |mut row, repository| {
        row.push_bind(repository.repo_id().to_string())
            .push_bind(repository.owner_login().to_owned())
            .push_bind(repository.name().to_owned())
            .push_bind(repository.full_name().to_owned())
            .push_bind(repository.url().to_owned())
            .push_bind(*repository.stargazer_count() as i64);
    });
    query_builder.push(UPSERT_CONFLICT_CLAUSE);

    query_builder
}

/// A persister that stores repository metadata in a PostgreSQL database.
pub struct PostgresSqlPersister {
    pool: PgPool,
}

impl PostgresSqlPersister {
    /// Creates a new `PostgresSqlPersister` instance.
    pub async fn try_new(connection_string: &str) -> StdResult<Self> {
        Ok(Self {
            pool: PgPoolOptions::new()
                .max_connections(1)
                .connect(connection_string)
                .await?,
        })
    }

    /// Creates the repositories table and its indexes if they do not exist yet.
    pub async fn migrate(&self) -> StdResult<()> {
        sqlx::query(CREATE_REPOSITORIES_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::query(CREATE_STARGAZER_COUNT_INDEX)
            .execute(&self.pool)
            .await?;
        info!("Database schema is up to date");

        Ok(())
    }
}

#[async_trait::async_trait]
impl RepositoryPersister for PostgresSqlPersister {
    async fn persist(&self, data: &[RepositoryRecord]) -> StdResult<u64> {
        let repositories = latest_observations(data);
        if repositories.is_empty() {
            return Ok(0);
        }

        let rows_affected = upsert_query(repositories)
            .build()
            .execute(&self.pool)
            .await?
            .rows_affected();
        debug!("Upserted {rows_affected} repositories");

        Ok(rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_observations_keeps_last_stars_in_first_position() {
        let data = vec![
            RepositoryRecord::dummy("1", 10),
            RepositoryRecord::dummy("2", 20),
            RepositoryRecord::dummy("1", 15),
        ];

        let repositories = latest_observations(&data);

        assert_eq!(
            vec![
                &RepositoryRecord::dummy("1", 15),
                &RepositoryRecord::dummy("2", 20)
            ],
            repositories
        );
    }

    #[test]
    fn upsert_query_inserts_each_repository_once_and_refreshes_stars_on_conflict() {
        let data = vec![
            RepositoryRecord::dummy("1", 10),
            RepositoryRecord::dummy("2", 20),
            RepositoryRecord::dummy("1", 15),
        ];

        let query_builder = upsert_query(latest_observations(&data));

        assert_eq!(
            query_builder.sql(),
            "INSERT INTO repositories (repo_id, owner_login, name, full_name, url, stargazer_count) \
            VALUES ($1, $2, $3, $4, $5, $6), ($7, $8, $9, $10, $11, $12) \
            ON CONFLICT (repo_id) DO UPDATE SET \
            stargazer_count = EXCLUDED.stargazer_count, fetched_at = CURRENT_TIMESTAMP"
        );
    }
}
