use std::time::Duration;

use thiserror::Error;

/// The standard result type used throughout the application.
pub type StdResult<T> = Result<T, anyhow::Error>;

/// Fetcher error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetcherError {
    /// The remote API asked us to slow down
    #[error("Throttled by remote API (retry after {retry_after:?})")]
    Throttled { retry_after: Option<Duration> },

    /// Non successful HTTP status other than throttling
    #[error("Remote API answered with status {status}: {message}")]
    Http { status: u16, message: String },

    /// Error list embedded in an otherwise successful response
    #[error("Remote API returned errors: {0}")]
    Protocol(String),

    /// Network level failure, or a body that could not be decoded
    #[error("Transport error: {0}")]
    Transport(String),

    /// Transient failures persisted beyond the retry budget
    #[error("Failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        source: Box<FetcherError>,
    },
}
