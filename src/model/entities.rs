use std::{fmt::Display, ops::Deref};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The opaque identifier assigned to a repository by GitHub.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryId(pub String);

impl Deref for RepositoryId {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for RepositoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The number of stars a repository has.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StarsCounter(pub u32);

impl Deref for StarsCounter {
    type Target = u32;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for StarsCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata of a GitHub repository, as observed by one search result.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRecord {
    /// The unique identifier of the repository.
    repo_id: RepositoryId,

    /// The login of the repository owner, empty when unknown.
    owner_login: String,

    /// The short name of the repository.
    name: String,

    /// The combined `owner/name` identifier.
    full_name: String,

    /// The canonical web address of the repository.
    url: String,

    /// The number of stars the repository had when observed.
    stargazer_count: StarsCounter,
}

impl RepositoryRecord {
    /// Creates a new `RepositoryRecord`, deriving owner and name from the combined `owner/name` identifier.
    pub fn new(repo_id: &str, full_name: &str, url: &str, stargazer_count: u32) -> Self {
        let (owner_login, name) = match full_name.split_once('/') {
            Some((owner_login, name)) => (owner_login, name),
            None => ("", full_name),
        };

        Self {
            repo_id: RepositoryId(repo_id.to_string()),
            owner_login: owner_login.to_string(),
            name: name.to_string(),
            full_name: full_name.to_string(),
            url: url.to_string(),
            stargazer_count: StarsCounter(stargazer_count),
        }
    }

    /// Retrieves the repository identifier.
    pub fn repo_id(&self) -> &RepositoryId {
        &self.repo_id
    }

    /// Retrieves the owner login.
    pub fn owner_login(&self) -> &str {
        &self.owner_login
    }

    /// Retrieves the repository name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Retrieves the combined `owner/name` identifier.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Retrieves the repository url.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Retrieves the number of stars of the repository.
    pub fn stargazer_count(&self) -> StarsCounter {
        self.stargazer_count
    }

    /// Returns the same repository observed with another number of stars.
    pub fn with_stargazer_count(self, stargazer_count: u32) -> Self {
        Self {
            stargazer_count: StarsCounter(stargazer_count),
            ..self
        }
    }

    /// Creates a dummy `RepositoryRecord` for testing purposes.
    #[cfg(test)]
    pub(crate) fn dummy(repo_id: &str, stargazer_count: u32) -> Self {
        Self::new(
            repo_id,
            &format!("org-{repo_id}/repository-{repo_id}"),
            &format!("https://github.com/org-{repo_id}/repository-{repo_id}"),
            stargazer_count,
        )
    }
}

impl Display for RepositoryRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Repository: {} ({}), Stars: {}",
            self.full_name, self.repo_id, self.stargazer_count
        )
    }
}

/// A snapshot of the API rate limit, taken from a single response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    /// The remaining number of calls in the current window.
    pub remaining: i64,

    /// The time at which the budget refills.
    pub reset_at: DateTime<Utc>,
}

impl RateLimitSnapshot {
    /// Creates a new `RateLimitSnapshot`.
    pub fn new(remaining: i64, reset_at: DateTime<Utc>) -> Self {
        Self {
            remaining,
            reset_at,
        }
    }

    /// A pessimistic snapshot for responses carrying no rate limit information.
    pub fn unknown(now: DateTime<Utc>) -> Self {
        Self::new(0, now + chrono::Duration::hours(1))
    }

    #[cfg(test)]
    /// Creates a dummy `RateLimitSnapshot` with a comfortable budget for testing purposes.
    pub fn dummy() -> Self {
        Self::new(4999, Utc::now() + chrono::Duration::hours(1))
    }
}

impl Display for RateLimitSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RateLimit: remaining={}, reset={}",
            self.remaining,
            self.reset_at.to_rfc3339()
        )
    }
}

/// The outcome of a crawl.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// The total number of repositories to be fetched
    pub total_repositories_target: u32,

    /// The total number of distinct repositories handed to the persister
    pub total_persisted_repositories: u32,

    /// The total number of rows affected in storage
    pub total_rows_affected: u64,

    /// The total number of fetcher calls made
    pub total_fetcher_calls: u32,
}

impl Display for CrawlSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Repositories: done={}/{}, rows affected={}, Requests: done={}",
            self.total_persisted_repositories,
            self.total_repositories_target,
            self.total_rows_affected,
            self.total_fetcher_calls
        )
    }
}
