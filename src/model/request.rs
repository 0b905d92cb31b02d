use std::fmt::Display;

use serde::Serialize;

/// A range of star counts, inclusive on both ends.
#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy, Hash)]
pub struct StarRange {
    /// The minimum number of stars.
    pub(crate) min: u32,

    /// The maximum number of stars, unbounded when absent.
    pub(crate) max: Option<u32>,
}

impl StarRange {
    /// Creates a range with no upper bound.
    pub fn at_least(min: u32) -> Self {
        Self { min, max: None }
    }

    /// Creates a bounded range.
    pub fn between(min: u32, max: u32) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    /// Splits the range in two disjoint halves, higher half first.
    ///
    /// Bounded ranges are bisected. Open ranges `>=N` become `N..2N+10` and `>=2N+11`, so the
    /// sparse popular end keeps getting narrowed on subsequent splits. A single-value range
    /// cannot be split.
    pub fn split(&self) -> Option<(StarRange, StarRange)> {
        match self.max {
            Some(max) if max > self.min => {
                let middle = self.min + (max - self.min) / 2;
                Some((
                    StarRange::between(middle + 1, max),
                    StarRange::between(self.min, middle),
                ))
            }
            Some(_) => None,
            None => {
                let upper_min = self.min.checked_mul(2)?.checked_add(11)?;
                Some((
                    StarRange::at_least(upper_min),
                    StarRange::between(self.min, upper_min - 1),
                ))
            }
        }
    }
}

impl Display for StarRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "stars:{}", self.min),
            Some(max) => write!(f, "stars:{}..{}", self.min, max),
            None => write!(f, "stars:>={}", self.min),
        }
    }
}

/// A search term submitted to the GitHub search API.
#[derive(Debug, Serialize, PartialEq, Eq, Clone, Hash)]
pub struct SearchTerm {
    /// The language filter.
    pub(crate) language: Option<String>,

    /// The star count filter.
    pub(crate) stars: StarRange,

    /// How many times this term has been split from a broader one.
    pub(crate) depth: u8,
}

impl SearchTerm {
    /// Creates a new `SearchTerm` with the given star range and optional language.
    pub fn new(stars: StarRange, language: Option<&str>) -> Self {
        Self {
            language: language.map(|language| language.to_string()),
            stars,
            depth: 0,
        }
    }

    /// Renders the query string understood by the search API.
    pub fn query(&self) -> String {
        match &self.language {
            Some(language) => format!("{} language:{language}", self.stars),
            None => self.stars.to_string(),
        }
    }

    /// Splits the term on its star range, keeping the language filter.
    pub fn split(&self) -> Option<(SearchTerm, SearchTerm)> {
        let (upper, lower) = self.stars.split()?;
        let child = |stars| Self {
            language: self.language.clone(),
            stars,
            depth: self.depth.saturating_add(1),
        };

        Some((child(upper), child(lower)))
    }

    /// Retrieves the split depth of the term.
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Creates a dummy `SearchTerm` for testing purposes.
    #[cfg(test)]
    pub(crate) fn dummy() -> Self {
        Self::new(StarRange::at_least(100), Some("Rust"))
    }
}

impl Display for SearchTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.query())
    }
}

/// A request for one page of a search term's results.
#[derive(Debug, Serialize, PartialEq, Eq, Clone, Hash)]
pub struct SearchRequest {
    /// The search term.
    pub(crate) term: SearchTerm,

    /// The number of repositories to return.
    pub(crate) first: u16,

    /// The cursor for pagination.
    pub(crate) after: Option<String>,
}

impl SearchRequest {
    /// Creates a new `SearchRequest` with the given term, first, and after values.
    pub fn new(term: SearchTerm, first: u16, after: Option<String>) -> Self {
        Self { term, first, after }
    }

    /// Builds the request for the page following this one.
    pub fn next_page(&self, cursor: String) -> Self {
        Self::new(self.term.clone(), self.first, Some(cursor))
    }

    /// Whether this request targets the first page of its term.
    pub fn is_first_page(&self) -> bool {
        self.after.is_none()
    }

    /// Retrieves the search term.
    pub fn term(&self) -> &SearchTerm {
        &self.term
    }

    /// Creates a dummy `SearchRequest` for testing purposes.
    #[cfg(test)]
    pub(crate) fn dummy() -> Self {
        Self::new(SearchTerm::dummy(), 10, None)
    }
}

impl Display for SearchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SearchRequest: query={}, first={}, after={:?}",
            self.term, self.first, self.after
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_queries() {
        assert_eq!(
            SearchTerm::new(StarRange::at_least(10001), Some("C++")).query(),
            "stars:>=10001 language:C++"
        );
        assert_eq!(
            SearchTerm::new(StarRange::between(11, 20), None).query(),
            "stars:11..20"
        );
        assert_eq!(
            SearchTerm::new(StarRange::between(7, 7), None).query(),
            "stars:7"
        );
    }

    #[test]
    fn split_bounded_range_bisects() {
        let (upper, lower) = StarRange::between(10, 20).split().unwrap();

        assert_eq!(upper, StarRange::between(16, 20));
        assert_eq!(lower, StarRange::between(10, 15));
    }

    #[test]
    fn split_open_range_keeps_upper_end_open() {
        let (upper, lower) = StarRange::at_least(100).split().unwrap();

        assert_eq!(upper, StarRange::at_least(211));
        assert_eq!(lower, StarRange::between(100, 210));
    }

    #[test]
    fn split_single_value_range_is_impossible() {
        assert_eq!(StarRange::between(3, 3).split(), None);
    }

    #[test]
    fn split_term_keeps_language_and_increments_depth() {
        let term = SearchTerm::new(StarRange::at_least(0), Some("Go"));

        let (upper, lower) = term.split().unwrap();

        assert_eq!(upper.query(), "stars:>=11 language:Go");
        assert_eq!(lower.query(), "stars:0..10 language:Go");
        assert_eq!(upper.depth(), 1);
        assert_eq!(lower.depth(), 1);
    }

    #[test]
    fn next_page_keeps_term() {
        let request = SearchRequest::dummy();

        let next = request.next_page("cursor".to_string());

        assert_eq!(next.term(), request.term());
        assert!(!next.is_first_page());
        assert!(request.is_first_page());
    }
}
