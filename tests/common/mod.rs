//! Shared test doubles: scripted model services and stub backends.

#![allow(dead_code)]

use async_trait::async_trait;
use math_agent::agent::{Agent, LoopOptions};
use math_agent::cas::{CasBackend, CasError, SymbolicEngine};
use math_agent::error::{ModelError, SearchError};
use math_agent::inference::ModelService;
use math_agent::search::{SearchBackend, SearchHit};
use math_agent::tools::{ToolDefinition, ToolRegistry};
use math_agent::types::*;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Build a tool call with an explicit id.
pub fn call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    }
}

pub fn tool_calls(calls: Vec<ToolCall>) -> ModelReply {
    ModelReply::ToolCalls {
        content: None,
        calls,
    }
}

pub fn final_answer(text: &str) -> ModelReply {
    ModelReply::Final(text.to_string())
}

fn usage() -> TokenUsage {
    TokenUsage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    }
}

/// Model that replays a fixed script of replies and records what it was sent.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<ModelReply, ModelError>>>,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(replies: Vec<ModelReply>) -> Self {
        Self::with_results(replies.into_iter().map(Ok).collect())
    }

    pub fn with_results(replies: Vec<Result<ModelReply, ModelError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Messages received on each call, in call order.
    pub fn seen(&self) -> Vec<Vec<ChatMessage>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelService for ScriptedModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolDefinition],
    ) -> Result<ModelResponse, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(messages.to_vec());
        let next = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::Malformed("script exhausted".into())));
        next.map(|reply| ModelResponse {
            reply,
            usage: usage(),
        })
    }
}

/// Model that never stops asking for another addition.
#[derive(Default)]
pub struct LoopingModel {
    calls: AtomicUsize,
}

impl LoopingModel {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelService for LoopingModel {
    async fn complete(
        &self,
        _messages: &[ChatMessage],
        _tools: &[ToolDefinition],
    ) -> Result<ModelResponse, ModelError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ModelResponse {
            reply: tool_calls(vec![call(
                &format!("call_{}", n),
                "add",
                serde_json::json!({"a": n, "b": 1}),
            )]),
            usage: usage(),
        })
    }
}

/// Model that takes `delay` before answering.
pub struct SlowModel {
    pub delay: Duration,
}

#[async_trait]
impl ModelService for SlowModel {
    async fn complete(
        &self,
        _messages: &[ChatMessage],
        _tools: &[ToolDefinition],
    ) -> Result<ModelResponse, ModelError> {
        tokio::time::sleep(self.delay).await;
        Ok(ModelResponse {
            reply: final_answer("too late"),
            usage: usage(),
        })
    }
}

/// Search backend returning canned hits.
pub struct StubSearch {
    pub hits: Vec<SearchHit>,
}

impl StubSearch {
    pub fn laplace() -> Self {
        Self {
            hits: vec![SearchHit {
                title: "Laplace transform".into(),
                url: "https://en.wikipedia.org/wiki/Laplace_transform".into(),
                excerpt: "F(s) = integral from 0 to infinity of f(t)*exp(-s*t) dt".into(),
            }],
        }
    }
}

#[async_trait]
impl SearchBackend for StubSearch {
    async fn search(&self, _query: &str) -> Result<Vec<SearchHit>, SearchError> {
        Ok(self.hits.clone())
    }
}

/// Search backend that answers after `delay` and records that it finished.
pub struct SlowSearch {
    pub delay: Duration,
    pub finished: Arc<AtomicBool>,
}

impl SlowSearch {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            finished: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl SearchBackend for SlowSearch {
    async fn search(&self, _query: &str) -> Result<Vec<SearchHit>, SearchError> {
        tokio::time::sleep(self.delay).await;
        self.finished.store(true, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

/// Search backend that is always down.
pub struct OfflineSearch;

#[async_trait]
impl SearchBackend for OfflineSearch {
    async fn search(&self, _query: &str) -> Result<Vec<SearchHit>, SearchError> {
        Err(SearchError::MissingApiKey)
    }
}

/// Symbolic backend whose derivative crashes.
pub struct CrashingCas;

impl CasBackend for CrashingCas {
    fn derivative(&self, _expression: &str, _variable: &str) -> Result<String, CasError> {
        panic!("derivative backend crashed");
    }

    fn indefinite_integral(&self, expression: &str, variable: &str) -> Result<String, CasError> {
        SymbolicEngine::new().indefinite_integral(expression, variable)
    }

    fn definite_integral(
        &self,
        expression: &str,
        variable: &str,
        lower: f64,
        upper: f64,
    ) -> Result<String, CasError> {
        SymbolicEngine::new().definite_integral(expression, variable, lower, upper)
    }
}

pub fn registry() -> Arc<ToolRegistry> {
    Arc::new(
        ToolRegistry::with_default_tools(
            Arc::new(SymbolicEngine::new()),
            Arc::new(StubSearch::laplace()),
        )
        .unwrap(),
    )
}

pub fn options(max_iterations: usize) -> LoopOptions {
    LoopOptions {
        max_iterations,
        model_timeout: Duration::from_secs(5),
        run_timeout: Duration::from_secs(30),
        parallel_tool_calls: true,
        system_prompt: "You are a helpful assistant.".into(),
    }
}

pub fn agent(model: Arc<dyn ModelService>, max_iterations: usize) -> Agent {
    Agent::new(model, registry(), options(max_iterations))
}
