//! Configuration schema for config.toml.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Base instructions given to the model on every run.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Chat model used by the agent loop.
    pub model: String,

    /// Base URL of the OpenAI-compatible inference API.
    pub inference_api_url: String,

    /// Inference API key (`OPENAI_API_KEY` takes precedence).
    pub inference_api_key: String,

    /// Sampling temperature.
    pub temperature: f64,

    /// Maximum tokens per model turn.
    pub max_tokens_per_turn: u32,

    /// Timeout for one model call, in seconds.
    pub model_timeout_secs: u64,

    /// Extra attempts after a failed model call.
    pub model_max_retries: u32,

    /// Maximum number of model turns per run.
    pub max_iterations: usize,

    /// Timeout for a whole run, in seconds.
    pub run_timeout_secs: u64,

    /// Execute the tool calls of one turn concurrently.
    pub parallel_tool_calls: bool,

    /// Base system prompt; tool guidance is appended to it.
    pub system_prompt: String,

    /// Base URL of the Tavily search API.
    pub search_api_url: String,

    /// Tavily API key (`TAVILY_API_KEY` takes precedence).
    pub search_api_key: String,

    /// Results returned per web search.
    pub search_max_results: u32,

    /// Timeout for one web search, in seconds.
    pub search_timeout_secs: u64,

    /// Log level (debug, info, warn, error).
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".into(),
            inference_api_url: "https://api.openai.com".into(),
            inference_api_key: String::new(),
            temperature: 0.7,
            max_tokens_per_turn: 1024,
            model_timeout_secs: 60,
            model_max_retries: 2,
            max_iterations: 15,
            run_timeout_secs: 300,
            parallel_tool_calls: true,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            search_api_url: "https://api.tavily.com".into(),
            search_api_key: String::new(),
            search_max_results: 5,
            search_timeout_secs: 20,
            log_level: "info".into(),
        }
    }
}

impl AgentConfig {
    /// Fill credentials from the environment when set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(key) = env_nonempty("OPENAI_API_KEY") {
            self.inference_api_key = key;
        }
        if let Some(key) = env_nonempty("TAVILY_API_KEY") {
            self.search_api_key = key;
        }
        self
    }

    /// Reject settings the agent loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            bail!("max_iterations must be at least 1");
        }
        if self.model_timeout_secs == 0 || self.run_timeout_secs == 0 || self.search_timeout_secs == 0 {
            bail!("timeouts must be greater than zero seconds");
        }
        if self.search_max_results == 0 {
            bail!("search_max_results must be at least 1");
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            bail!("temperature must be between 0 and 2, got {}", self.temperature);
        }
        Ok(())
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
