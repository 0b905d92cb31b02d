use crate::{FetcherError, SearchPage, SearchRequest};

/// A trait for fetching one page of search results from the API.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RepositoryFetcher: Sync + Send {
    /// Fetches the page described by the request.
    async fn fetch(&self, request: &SearchRequest) -> Result<SearchPage, FetcherError>;
}
