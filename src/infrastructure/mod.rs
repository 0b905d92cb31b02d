mod crawl_controller;
mod crawler_sequential;
mod fetcher_graphql;
mod fetcher_retrier;
mod persister_memory;
mod persister_postgresql;
mod persister_retrier;
mod query_planner;
mod rate_governor;

pub use crawl_controller::*;
pub use crawler_sequential::*;
pub use fetcher_graphql::*;
pub use fetcher_retrier::*;
pub use persister_memory::*;
pub use persister_postgresql::*;
pub use persister_retrier::*;
pub use query_planner::*;
pub use rate_governor::*;
