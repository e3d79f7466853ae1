//! Search module - bridges HTTP requests to an asynchronous search engine / 搜索模块
//!
//! Architecture principles / 架构原则：
//! - The engine is an external collaborator behind [`SearchBackend`]
//! - [`SearchCoordinator`] owns the single in-flight query and its result set
//! - Call direction: HTTP → Coordinator → Backend, completion flows back through [`ResultSink`]

pub mod backend;
pub mod coordinator;
pub mod pager;
pub mod query;

use std::time::Duration;

pub use backend::{CoreHttpBackend, LocalSearchBackend, SearchBackend};
pub use coordinator::{ResultSet, ResultSink, SearchCoordinator, SearchTicket};
pub use pager::{page, Page};
pub use query::Query;

/// Search failures surfaced to the HTTP layer / 搜索错误
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("waiting for search results too long")]
    TimedOut(Duration),

    #[error("search failed: {0}")]
    Backend(String),
}
