#![allow(non_snake_case)]

use std::time::Duration;

use chrono::{DateTime, Utc};
use log::debug;
use reqwest::{
    Client, StatusCode,
    header::{HeaderMap, RETRY_AFTER, USER_AGENT},
};
use serde::{Deserialize, Serialize};

use crate::{
    FetcherError, RateLimitSnapshot, RepositoryFetcher, RepositoryRecord, SearchPage,
    SearchRequest, StdResult,
};

/// The GraphQL production endpoint for GitHub.
pub const GITHUB_GRAPHQL_ENDPOINT: &str = "https://api.github.com/graphql";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const SEARCH_QUERY: &str = r#"
query ($query: String!, $first: Int!, $after: String) {
  search(query: $query, type: REPOSITORY, first: $first, after: $after) {
    repositoryCount
    edges {
      node {
        ... on Repository {
          id
          nameWithOwner
          url
          stargazerCount
        }
      }
    }
    pageInfo {
      endCursor
      hasNextPage
    }
  }
  rateLimit {
    remaining
    resetAt
  }
}
"#;

#[derive(Deserialize, Debug)]
struct GraphQlResponse {
    data: Option<SearchQueryData>,
    errors: Option<Vec<serde_json::Value>>,
}

#[derive(Deserialize, Debug)]
struct SearchQueryData {
    search: Option<SearchResult>,
    rateLimit: Option<RateLimit>,
}

#[derive(Deserialize, Debug)]
struct SearchResult {
    repositoryCount: Option<u32>,
    edges: Option<Vec<serde_json::Value>>,
    pageInfo: Option<PageInfo>,
}

#[derive(Deserialize, Debug)]
struct SearchEdge {
    node: RepositoryNode,
}

#[derive(Deserialize, Debug)]
struct RepositoryNode {
    id: String,
    nameWithOwner: String,
    url: String,
    stargazerCount: u32,
}

#[derive(Deserialize, Debug)]
struct PageInfo {
    endCursor: Option<String>,
    hasNextPage: bool,
}

#[derive(Deserialize, Debug)]
struct RateLimit {
    remaining: i64,
    resetAt: DateTime<Utc>,
}

impl From<RateLimit> for RateLimitSnapshot {
    fn from(rate_limit: RateLimit) -> Self {
        Self::new(rate_limit.remaining, rate_limit.resetAt)
    }
}

impl From<RepositoryNode> for RepositoryRecord {
    fn from(node: RepositoryNode) -> Self {
        RepositoryRecord::new(
            &node.id,
            &node.nameWithOwner,
            &node.url,
            node.stargazerCount,
        )
    }
}

/// A GraphQL query for searching GitHub
#[derive(Debug, Serialize)]
struct GraphQlSearchQuery {
    /// The search query string.
    query: String,
    /// The number of repositories to return.
    first: u16,
    /// The cursor for pagination.
    after: Option<String>,
}

impl From<&SearchRequest> for GraphQlSearchQuery {
    fn from(request: &SearchRequest) -> Self {
        Self {
            query: request.term.query(),
            first: request.first,
            after: request.after.to_owned(),
        }
    }
}

#[derive(Debug, Serialize)]
struct GraphQlPayload {
    query: &'static str,
    variables: GraphQlSearchQuery,
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Reads the rate limit advertised in the `x-ratelimit-*` response headers.
fn parse_rate_limit_headers(headers: &HeaderMap) -> Option<RateLimitSnapshot> {
    let remaining = header_value(headers, "x-ratelimit-remaining")?
        .parse::<i64>()
        .ok()?;
    let reset_epoch = header_value(headers, "x-ratelimit-reset")?
        .parse::<i64>()
        .ok()?;
    let reset_at = DateTime::from_timestamp(reset_epoch, 0)?;

    Some(RateLimitSnapshot::new(remaining, reset_at))
}

/// Classifies a non successful HTTP response.
///
/// A 403 is a throttle when it tells how long to wait, reports an exhausted budget, or mentions a
/// rate limit in its body (secondary limits may come without any rate limit header).
fn classify_status(status: StatusCode, headers: &HeaderMap, body: String) -> FetcherError {
    let retry_after = headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let budget_exhausted = header_value(headers, "x-ratelimit-remaining") == Some("0");
    let mentions_rate_limit = body.to_lowercase().contains("rate limit");
    let is_throttled = status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN
            && (headers.contains_key(RETRY_AFTER) || budget_exhausted || mentions_rate_limit));

    if is_throttled {
        FetcherError::Throttled { retry_after }
    } else {
        FetcherError::Http {
            status: status.as_u16(),
            message: body,
        }
    }
}

/// Parses the result edges, skipping any node that is malformed or lacks an identifier.
fn parse_repositories(edges: Vec<serde_json::Value>) -> Vec<RepositoryRecord> {
    edges
        .into_iter()
        .filter_map(|edge| match serde_json::from_value::<SearchEdge>(edge) {
            Ok(edge) if !edge.node.id.is_empty() => Some(edge.node.into()),
            Ok(_) => {
                debug!("Skipped search result without identifier");
                None
            }
            Err(e) => {
                debug!("Skipped malformed search result: {e}");
                None
            }
        })
        .collect()
}

/// Fetches repository data from the GitHub GraphQL API.
pub struct GraphQlFetcher {
    client: Client,
    endpoint: String,
    token: String,
}

impl GraphQlFetcher {
    /// Creates a new `GraphQlFetcher` instance for the given endpoint and bearer token.
    pub fn try_new(endpoint: &str, token: &str) -> StdResult<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            token: token.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl RepositoryFetcher for GraphQlFetcher {
    async fn fetch(&self, request: &SearchRequest) -> Result<SearchPage, FetcherError> {
        debug!("Fetching {request}");
        let payload = GraphQlPayload {
            query: SEARCH_QUERY,
            variables: request.into(),
        };
        let response = self
            .client
            .post(&self.endpoint)
            .header(USER_AGENT, env!("CARGO_PKG_NAME"))
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| FetcherError::Transport(e.to_string()))?;
        let status = response.status();
        let headers = response.headers().clone();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &headers, body));
        }

        let body = response
            .json::<GraphQlResponse>()
            .await
            .map_err(|e| FetcherError::Transport(format!("Failed to decode response: {e}")))?;
        if let Some(errors) = body.errors.filter(|errors| !errors.is_empty()) {
            return Err(FetcherError::Protocol(
                serde_json::Value::Array(errors).to_string(),
            ));
        }

        let (search, rate_limit) = match body.data {
            Some(data) => (data.search, data.rateLimit),
            None => (None, None),
        };
        let rate_limit = rate_limit
            .map(RateLimitSnapshot::from)
            .or_else(|| parse_rate_limit_headers(&headers))
            .unwrap_or_else(|| RateLimitSnapshot::unknown(Utc::now()));
        let Some(search) = search else {
            return Ok(SearchPage::new(vec![], None, rate_limit, None));
        };
        let next_cursor = search
            .pageInfo
            .filter(|page_info| page_info.hasNextPage)
            .and_then(|page_info| page_info.endCursor);

        Ok(SearchPage::new(
            parse_repositories(search.edges.unwrap_or_default()),
            next_cursor,
            rate_limit,
            search.repositoryCount,
        ))
    }
}
