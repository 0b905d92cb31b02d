use super::{RateLimitSnapshot, RepositoryRecord};

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPage {
    /// Retrieved repositories and their metadata
    pub(crate) repositories: Vec<RepositoryRecord>,

    /// The cursor of the next page, absent on the last page
    pub(crate) next_cursor: Option<String>,

    /// The API rate limit information
    pub(crate) rate_limit: RateLimitSnapshot,

    /// The total number of results reported for the search term
    pub(crate) repository_count: Option<u32>,
}

impl SearchPage {
    /// Creates a new `SearchPage` instance.
    pub fn new(
        repositories: Vec<RepositoryRecord>,
        next_cursor: Option<String>,
        rate_limit: RateLimitSnapshot,
        repository_count: Option<u32>,
    ) -> Self {
        Self {
            repositories,
            next_cursor,
            rate_limit,
            repository_count,
        }
    }

    /// Retrieves the list of repositories.
    pub fn repositories(&self) -> &[RepositoryRecord] {
        &self.repositories
    }

    /// Retrieves the cursor of the next page.
    pub fn next_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref()
    }

    /// Retrieves the API rate limit information.
    pub fn rate_limit(&self) -> &RateLimitSnapshot {
        &self.rate_limit
    }

    /// Retrieves the total number of results reported for the search term.
    pub fn repository_count(&self) -> Option<u32> {
        self.repository_count
    }
}
