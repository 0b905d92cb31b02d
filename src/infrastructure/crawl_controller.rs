use std::{collections::HashSet, sync::Arc};

use anyhow::Context;
use futures::Stream;
use log::info;

use crate::{
    QueryPlanner, RateGovernor, RateLimitSnapshot, RepositoryFetcher, RepositoryId,
    RepositoryRecord, SEARCH_RESULTS_CAP, SearchRequest, StdResult,
};

/// The phase of a crawl
#[derive(Debug, Clone, PartialEq, Eq)]
enum CrawlPhase {
    /// Selecting the next search term
    Planning,

    /// Fetching the pages of the current search term
    Paging(SearchRequest),

    /// Target reached, plan exhausted, or aborted
    Done,
}

/// Drives a crawl one page at a time and yields batches of repositories never seen before.
///
/// The controller owns the set of emitted identifiers and the collected count for the lifetime
/// of one crawl. Batches are produced on demand with [CrawlController::next_batch], in fetch order.
pub struct CrawlController {
    fetcher: Arc<dyn RepositoryFetcher>,
    governor: RateGovernor,
    planner: QueryPlanner,
    page_size: u16,
    total_repositories_target: u32,
    phase: CrawlPhase,
    repositories_seen: HashSet<RepositoryId>,
    total_collected_repositories: u32,
    total_fetcher_calls: u32,
    last_rate_limit: Option<RateLimitSnapshot>,
}

impl CrawlController {
    /// Creates a new `CrawlController` instance.
    pub fn new(
        fetcher: Arc<dyn RepositoryFetcher>,
        governor: RateGovernor,
        planner: QueryPlanner,
        page_size: u16,
        total_repositories_target: u32,
    ) -> Self {
        Self {
            fetcher,
            governor,
            planner,
            page_size,
            total_repositories_target,
            phase: CrawlPhase::Planning,
            repositories_seen: HashSet::new(),
            total_collected_repositories: 0,
            total_fetcher_calls: 0,
            last_rate_limit: None,
        }
    }

    /// Retrieves the number of repositories emitted so far.
    pub fn collected(&self) -> u32 {
        self.total_collected_repositories
    }

    /// Retrieves the number of pages requested so far.
    pub fn fetcher_calls(&self) -> u32 {
        self.total_fetcher_calls
    }

    /// Returns the next non empty batch of new repositories, or `None` once the crawl is done.
    ///
    /// A fatal fetch error is returned as is and ends the crawl.
    pub async fn next_batch(&mut self) -> StdResult<Option<Vec<RepositoryRecord>>> {
        loop {
            match std::mem::replace(&mut self.phase, CrawlPhase::Done) {
                CrawlPhase::Done => return Ok(None),
                CrawlPhase::Planning => {
                    if self.total_collected_repositories >= self.total_repositories_target {
                        continue;
                    }
                    match self.planner.next() {
                        Some(term) => {
                            info!("Crawling search term '{term}'");
                            let request = SearchRequest::new(term, self.page_size, None);
                            self.phase = CrawlPhase::Paging(request);
                        }
                        None => info!("All search terms have been crawled"),
                    }
                }
                CrawlPhase::Paging(request) => {
                    let batch = self.process_page(request).await?;
                    if !batch.is_empty() {
                        return Ok(Some(batch));
                    }
                }
            }
        }
    }

    async fn process_page(&mut self, request: SearchRequest) -> StdResult<Vec<RepositoryRecord>> {
        if let Some(rate_limit) = self.last_rate_limit.take() {
            self.governor.pace(&rate_limit).await;
        }
        self.total_fetcher_calls += 1;
        let page = self
            .fetcher
            .fetch(&request)
            .await
            .with_context(|| format!("Failed to fetch {request}"))?;
        self.last_rate_limit = Some(page.rate_limit.clone());

        let exceeds_results_cap = request.is_first_page()
            && page
                .repository_count()
                .is_some_and(|count| count > SEARCH_RESULTS_CAP);
        self.phase = if exceeds_results_cap && self.planner.refine(request.term()) {
            CrawlPhase::Planning
        } else {
            match page.next_cursor {
                Some(cursor) => CrawlPhase::Paging(request.next_page(cursor)),
                None => CrawlPhase::Planning,
            }
        };

        let total_fetched = page.repositories.len();
        let batch = page
            .repositories
            .into_iter()
            .filter(|repository| self.repositories_seen.insert(repository.repo_id().clone()))
            .collect::<Vec<_>>();
        self.total_collected_repositories += batch.len() as u32;
        info!(
            "Repositories: new={}/{total_fetched}, collected={}/{}, Requests: done={}, {}",
            batch.len(),
            self.total_collected_repositories,
            self.total_repositories_target,
            self.total_fetcher_calls,
            page.rate_limit
        );
        if self.total_collected_repositories >= self.total_repositories_target {
            info!(
                "Target of {} repositories reached",
                self.total_repositories_target
            );
            self.phase = CrawlPhase::Done;
        }

        Ok(batch)
    }

    /// Turns the controller into a stream of batches.
    pub fn into_stream(self) -> impl Stream<Item = StdResult<Vec<RepositoryRecord>>> + Send {
        futures::stream::try_unfold(self, |mut controller| async move {
            let batch = controller.next_batch().await?;

            Ok::<_, anyhow::Error>(batch.map(|batch| (batch, controller)))
        })
    }
}
