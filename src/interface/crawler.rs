use crate::{CrawlSummary, QueryPlanner, StdResult};

/// A trait for crawling GitHub repositories and persisting them.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RepositoryCrawler: Sync + Send {
    /// Crawl the GitHub API for repositories until the target is reached or the plan is exhausted.
    async fn crawl(
        &self,
        planner: QueryPlanner,
        total_repositories: u32,
    ) -> StdResult<CrawlSummary>;
}
