//! Web-search backend boundary.

pub mod tavily;

pub use tavily::TavilyClient;

use crate::error::SearchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One search result snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub excerpt: String,
}

/// A search provider: query string in, ordered result snippets out.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError>;
}
