use std::{collections::VecDeque, fmt};

use log::{info, warn};

use crate::{SearchTerm, StarRange};

/// The maximum number of results the search API returns for a single query.
pub const SEARCH_RESULTS_CAP: u32 = 1000;

/// The languages used to partition the search space.
pub const DEFAULT_LANGUAGES: [&str; 10] = [
    "Python",
    "JavaScript",
    "Java",
    "Go",
    "TypeScript",
    "C#",
    "PHP",
    "C++",
    "Ruby",
    "Rust",
];

/// The lower bounds of the star bands crossed with each language, most popular first.
pub const DEFAULT_STAR_THRESHOLDS: [u32; 9] = [10001, 5001, 1001, 501, 101, 51, 11, 2, 0];

const MAX_SPLIT_DEPTH: u8 = 16;

/// Turns descending lower bounds into disjoint star bands.
///
/// The first band is open, each following one stops right below the previous lower bound.
pub fn star_bands(thresholds: &[u32]) -> Vec<StarRange> {
    let mut upper_bound: Option<u32> = None;
    let mut bands = Vec::with_capacity(thresholds.len());
    for &min in thresholds {
        match upper_bound {
            None => bands.push(StarRange::at_least(min)),
            Some(max) if max >= min => bands.push(StarRange::between(min, max)),
            Some(_) => continue,
        }
        upper_bound = min.checked_sub(1);
        if upper_bound.is_none() {
            break;
        }
    }

    bands
}

/// Plans the search terms of a crawl.
///
/// Terms are produced lazily and only once: languages crossed with disjoint star bands, most
/// popular first, then broad fallback terms without a language filter. Terms reported to exceed
/// the result cap can be split with [QueryPlanner::refine], the halves being visited before the
/// rest of the plan.
pub struct QueryPlanner {
    planned: Box<dyn Iterator<Item = SearchTerm> + Send>,
    refined: VecDeque<SearchTerm>,
}

impl QueryPlanner {
    /// Creates a new `QueryPlanner` visiting the given terms in order.
    pub fn new<I>(terms: I) -> Self
    where
        I: IntoIterator<Item = SearchTerm>,
        I::IntoIter: Send + 'static,
    {
        Self {
            planned: Box::new(terms.into_iter()),
            refined: VecDeque::new(),
        }
    }

    /// Creates the planner covering the most popular repositories of GitHub.
    pub fn github_default() -> Self {
        let bands = star_bands(&DEFAULT_STAR_THRESHOLDS);
        let partitioned = DEFAULT_LANGUAGES.into_iter().flat_map(move |language| {
            bands
                .clone()
                .into_iter()
                .map(move |stars| SearchTerm::new(stars, Some(language)))
        });
        let fallback_thresholds: Vec<u32> = (1..=20).rev().map(|step| step * 10 + 1).collect();
        let fallback = star_bands(&fallback_thresholds)
            .into_iter()
            .map(|stars| SearchTerm::new(stars, None));

        Self::new(partitioned.chain(fallback))
    }

    /// Splits a term whose results exceed the cap, and queues the halves ahead of the plan.
    ///
    /// Returns `false` when the term cannot be narrowed any further.
    pub fn refine(&mut self, term: &SearchTerm) -> bool {
        if term.depth() >= MAX_SPLIT_DEPTH {
            warn!("Search term '{term}' exceeds the results cap and reached max split depth");
            return false;
        }
        match term.split() {
            Some((upper, lower)) => {
                info!(
                    "Search term '{term}' exceeds the results cap, split into '{upper}' and '{lower}'"
                );
                self.refined.push_front(lower);
                self.refined.push_front(upper);
                true
            }
            None => {
                warn!("Search term '{term}' exceeds the results cap and cannot be split");
                false
            }
        }
    }
}

impl fmt::Debug for QueryPlanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryPlanner")
            .field("refined", &self.refined)
            .finish_non_exhaustive()
    }
}

impl Iterator for QueryPlanner {
    type Item = SearchTerm;

    fn next(&mut self) -> Option<Self::Item> {
        self.refined.pop_front().or_else(|| self.planned.next())
    }
}
