//! Core tool-calling loop: ask the model, run the tools it requests, feed
//! the results back, repeat until it answers.
//!
//! Each run walks the state machine
//! `AwaitingModel -> (ExecutingTool -> AwaitingModel)* -> Done`, or ends in
//! `Failed` with an [`AgentError`]. The number of model turns is bounded by
//! [`LoopOptions::max_iterations`].

use crate::agent::{context, system_prompt};
use crate::config::AgentConfig;
use crate::error::{AgentError, ModelError, ToolError};
use crate::inference::ModelService;
use crate::tools::{ToolRegistry, ToolValue};
use crate::types::*;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Knobs for one agent run.
#[derive(Debug, Clone)]
pub struct LoopOptions {
    /// Maximum number of model turns.
    pub max_iterations: usize,
    /// Bound on each model call.
    pub model_timeout: Duration,
    /// Bound on the whole run.
    pub run_timeout: Duration,
    /// Run the tool calls of one turn concurrently.
    pub parallel_tool_calls: bool,
    /// Base system prompt; tool guidance is appended.
    pub system_prompt: String,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

impl LoopOptions {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            // Covers every attempt of the client's retry budget plus backoff.
            model_timeout: config.model_timeout() * (config.model_max_retries + 1)
                + Duration::from_secs(u64::from(config.model_max_retries) * 2),
            run_timeout: config.run_timeout(),
            parallel_tool_calls: config.parallel_tool_calls,
            system_prompt: config.system_prompt.clone(),
        }
    }
}

/// Successful outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    pub answer: String,
    pub conversation: ConversationState,
    /// Every state entered, in order, ending with `Done`.
    pub trace: Vec<AgentState>,
    pub model_turns: usize,
    pub usage: TokenUsage,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// The agent: a model service, a tool registry and loop options.
pub struct Agent {
    model: Arc<dyn ModelService>,
    registry: Arc<ToolRegistry>,
    options: LoopOptions,
}

/// Mutable state of a run in progress.
struct Run {
    conversation: ConversationState,
    trace: Vec<AgentState>,
    usage: TokenUsage,
    started_at: DateTime<Utc>,
}

impl Run {
    fn enter(&mut self, turn: usize, next: AgentState) {
        if let Some(prev) = self.trace.last() {
            info!("[Turn {}] {} -> {}", turn, prev, next);
        }
        self.trace.push(next);
    }
}

impl Agent {
    pub fn new(
        model: Arc<dyn ModelService>,
        registry: Arc<ToolRegistry>,
        options: LoopOptions,
    ) -> Self {
        Self {
            model,
            registry,
            options,
        }
    }

    pub fn options(&self) -> &LoopOptions {
        &self.options
    }

    /// Run one request to completion.
    pub async fn run(&self, request: &str) -> Result<Completion, AgentError> {
        self.run_with_cancel(request, CancellationToken::new()).await
    }

    /// Like [`Agent::run`], aborting with `Cancelled` when `cancel` fires.
    pub async fn run_with_cancel(
        &self,
        request: &str,
        cancel: CancellationToken,
    ) -> Result<Completion, AgentError> {
        info!("Starting run: {}", truncate(request, 200));

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            res = tokio::time::timeout(self.options.run_timeout, self.drive(request)) => {
                res.unwrap_or(Err(AgentError::RunTimeout(self.options.run_timeout)))
            }
        };

        match &outcome {
            Ok(done) => info!(
                "Run finished after {} model turns ({} tokens)",
                done.model_turns, done.usage.total_tokens
            ),
            Err(e) => error!("Run {} ({}): {}", AgentState::Failed, e.kind(), e),
        }
        outcome
    }

    async fn drive(&self, request: &str) -> Result<Completion, AgentError> {
        let tools = self.registry.schema();
        let prompt = system_prompt::build_system_prompt(&self.options.system_prompt, &tools);
        let limit = self.options.max_iterations;

        let mut run = Run {
            conversation: ConversationState::new(request),
            trace: vec![AgentState::AwaitingModel],
            usage: TokenUsage::default(),
            started_at: Utc::now(),
        };

        for turn in 1..=limit {
            let messages = context::build_messages(&prompt, &run.conversation);
            let response = tokio::time::timeout(
                self.options.model_timeout,
                self.model.complete(&messages, &tools),
            )
            .await
            .map_err(|_| AgentError::ModelTimeout(self.options.model_timeout))??;
            run.usage.accumulate(&response.usage);

            let (content, calls) = match response.reply {
                ModelReply::Final(answer) => return Ok(self.finish(run, turn, answer)),
                ModelReply::ToolCalls { content, calls } if calls.is_empty() => match content {
                    Some(answer) => return Ok(self.finish(run, turn, answer)),
                    None => {
                        return Err(AgentError::Model(ModelError::Malformed(
                            "tool-call reply without any calls".into(),
                        )))
                    }
                },
                ModelReply::ToolCalls { content, calls } => (content, calls),
            };

            if let Some(text) = content.as_deref() {
                info!("[Turn {}] Agent: {}", turn, truncate(text, 200));
            }
            let calls = with_call_ids(calls);
            run.conversation.push(Turn::ToolRequests {
                content,
                calls: calls.clone(),
            });
            run.enter(turn, AgentState::ExecutingTool);

            let results = self.execute_calls(turn, &calls).await?;
            for result in results {
                run.conversation.push(Turn::ToolResult(result));
            }

            if turn == limit {
                warn!("[Turn {}] Iteration limit reached with tool calls still pending", turn);
                break;
            }
            run.enter(turn, AgentState::AwaitingModel);
        }

        Err(AgentError::MaxIterationsExceeded { limit })
    }

    fn finish(&self, mut run: Run, turn: usize, answer: String) -> Completion {
        info!("[Turn {}] Final answer: {}", turn, truncate(&answer, 200));
        run.conversation.push(Turn::Assistant {
            content: answer.clone(),
        });
        run.enter(turn, AgentState::Done);
        Completion {
            answer,
            conversation: run.conversation,
            trace: run.trace,
            model_turns: turn,
            usage: run.usage,
            started_at: run.started_at,
            finished_at: Utc::now(),
        }
    }

    /// Run every call of one turn and return the results in request order.
    async fn execute_calls(
        &self,
        turn: usize,
        calls: &[ToolCall],
    ) -> Result<Vec<ToolResult>, AgentError> {
        for call in calls {
            info!("[Turn {}] Tool: {}({})", turn, call.name, call.arguments);
        }

        let outcomes = if self.options.parallel_tool_calls {
            join_all(calls.iter().map(|call| self.spawn_call(call))).await
        } else {
            let mut outcomes = Vec::with_capacity(calls.len());
            for call in calls {
                outcomes.push(self.spawn_call(call).await);
            }
            outcomes
        };

        let mut results = Vec::with_capacity(calls.len());
        for (call, outcome) in calls.iter().zip(outcomes) {
            let outcome = outcome.unwrap_or_else(|e| {
                Err(ToolError::ToolExecution {
                    tool: call.name.clone(),
                    reason: describe_join_error(e),
                })
            });
            let result = match outcome {
                Ok(value) => {
                    let output = value.to_string();
                    info!("[Turn {}] Tool result ({}): {}", turn, call.name, truncate(&output, 200));
                    ToolResult {
                        tool_call_id: call.id.clone(),
                        tool_name: call.name.clone(),
                        output,
                        success: true,
                        error: None,
                    }
                }
                Err(e) if e.is_fatal() => {
                    error!("[Turn {}] Fatal tool error ({}): {}", turn, call.name, e);
                    return Err(AgentError::Tool(e));
                }
                Err(e) => {
                    warn!("[Turn {}] Tool error ({}): {}", turn, call.name, e);
                    ToolResult {
                        tool_call_id: call.id.clone(),
                        tool_name: call.name.clone(),
                        output: format!("Error ({}): {}", e.kind(), e),
                        success: false,
                        error: Some(e.report()),
                    }
                }
            };
            results.push(result);
        }
        Ok(results)
    }

    fn spawn_call(&self, call: &ToolCall) -> ToolTask {
        let registry = Arc::clone(&self.registry);
        let name = call.name.clone();
        let arguments = call.arguments.clone();
        ToolTask(tokio::spawn(async move { registry.invoke(&name, &arguments).await }))
    }
}

/// A spawned tool call. Dropping it aborts the task, so a run that times out
/// or is cancelled leaves no tool work running.
struct ToolTask(JoinHandle<Result<ToolValue, ToolError>>);

impl Future for ToolTask {
    type Output = Result<Result<ToolValue, ToolError>, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

impl Drop for ToolTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Give every call an id so its result can be matched to it.
fn with_call_ids(calls: Vec<ToolCall>) -> Vec<ToolCall> {
    calls
        .into_iter()
        .map(|mut call| {
            if call.id.trim().is_empty() {
                call.id = format!("call_{}", ulid::Ulid::new());
                debug!("Assigned id {} to {} call", call.id, call.name);
            }
            call
        })
        .collect()
}

fn describe_join_error(err: JoinError) -> String {
    if !err.is_panic() {
        return "task was cancelled".into();
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {}", msg)
    } else {
        "panicked".into()
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_ids_are_generated() {
        let calls = with_call_ids(vec![
            ToolCall {
                id: String::new(),
                name: "add".into(),
                arguments: json!({}),
            },
            ToolCall {
                id: "call_7".into(),
                name: "add".into(),
                arguments: json!({}),
            },
        ]);
        assert!(calls[0].id.starts_with("call_"));
        assert!(calls[0].id.len() > "call_".len());
        assert_eq!(calls[1].id, "call_7");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("αβγδ", 2), "αβ...");
    }

    #[test]
    fn options_follow_config() {
        let config = AgentConfig {
            max_iterations: 4,
            parallel_tool_calls: false,
            ..AgentConfig::default()
        };
        let options = LoopOptions::from_config(&config);
        assert_eq!(options.max_iterations, 4);
        assert!(!options.parallel_tool_calls);
        assert!(options.model_timeout >= config.model_timeout());
    }
}
