//! Tavily search API client.

use super::{SearchBackend, SearchHit};
use crate::config::AgentConfig;
use crate::error::SearchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Client for the Tavily `/search` endpoint.
#[derive(Debug, Clone)]
pub struct TavilyClient {
    base_url: String,
    api_key: String,
    max_results: u32,
    timeout: Duration,
    http: reqwest::Client,
}

// -- Request / response types -----------------------------------------------

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ResultPayload>,
}

#[derive(Debug, Deserialize)]
struct ResultPayload {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl TavilyClient {
    /// Create a new Tavily client.
    pub fn new(base_url: &str, api_key: &str, max_results: u32, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            max_results,
            timeout,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(
            &config.search_api_url,
            &config.search_api_key,
            config.search_max_results,
            config.search_timeout(),
        )
    }

    async fn send(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        let url = format!("{}/search", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&SearchRequest {
                api_key: &self.api_key,
                query,
                max_results: self.max_results,
            })
            .send()
            .await
            .map_err(|e| SearchError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: SearchResponse = resp
            .json()
            .await
            .map_err(|e| SearchError::Decode(e.to_string()))?;

        Ok(body
            .results
            .into_iter()
            .map(|r| SearchHit {
                title: r.title,
                url: r.url,
                excerpt: r.content,
            })
            .collect())
    }
}

#[async_trait]
impl SearchBackend for TavilyClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        if self.api_key.trim().is_empty() {
            return Err(SearchError::MissingApiKey);
        }
        debug!("Tavily search: {}", query);

        let hits = tokio::time::timeout(self.timeout, self.send(query))
            .await
            .map_err(|_| SearchError::Timeout(self.timeout))??;

        debug!("Tavily returned {} results", hits.len());
        Ok(hits)
    }
}
