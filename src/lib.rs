//! Crawls repository metadata from the GitHub GraphQL search API and stores it durably.

mod infrastructure;
mod interface;
mod model;

pub use infrastructure::*;
pub use interface::*;
pub use model::*;
