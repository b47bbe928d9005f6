//! Library search: cached indexes plus the request/response surface

mod cache;
mod service;

pub use cache::{IndexCache, SharedIndex};
pub use service::{
    SearchRequest, SearchResult, SearchService, DEFAULT_K, DEFAULT_MAX_K,
    DEFAULT_MAX_REPORTED_INVALID_IDS,
};
