use std::sync::Arc;

use log::{debug, info};

use crate::{
    CrawlController, CrawlSummary, QueryPlanner, RateGovernor, RepositoryCrawler,
    RepositoryFetcher, RepositoryPersister, StdResult,
};

/// A sequential crawler, persisting each batch of new repositories as soon as it is fetched.
pub struct SequentialCrawler {
    fetcher: Arc<dyn RepositoryFetcher>,
    persister: Arc<dyn RepositoryPersister>,
    governor: RateGovernor,
    page_size: u16,
}

impl SequentialCrawler {
    /// Creates a new `SequentialCrawler` instance with the given fetcher and persister.
    pub fn new(
        fetcher: Arc<dyn RepositoryFetcher>,
        persister: Arc<dyn RepositoryPersister>,
        governor: RateGovernor,
        page_size: u16,
    ) -> Self {
        Self {
            fetcher,
            persister,
            governor,
            page_size,
        }
    }
}

#[async_trait::async_trait]
impl RepositoryCrawler for SequentialCrawler {
    async fn crawl(
        &self,
        planner: QueryPlanner,
        total_repositories: u32,
    ) -> StdResult<CrawlSummary> {
        let mut controller = CrawlController::new(
            self.fetcher.clone(),
            self.governor.clone(),
            planner,
            self.page_size,
            total_repositories,
        );
        let mut summary = CrawlSummary {
            total_repositories_target: total_repositories,
            ..CrawlSummary::default()
        };

        while let Some(batch) = controller.next_batch().await? {
            for repository in &batch {
                debug!("Fetched {repository}");
            }
            summary.total_rows_affected += self.persister.persist(&batch).await?;
            summary.total_persisted_repositories += batch.len() as u32;
            info!("Crawled {} repos...", summary.total_persisted_repositories);
        }
        summary.total_fetcher_calls = controller.fetcher_calls();

        Ok(summary)
    }
}
