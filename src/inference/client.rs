//! Model inference via an OpenAI-compatible chat-completions API.
//!
//! Supports tool-use (function calling) in the OpenAI format.

use super::ModelService;
use crate::config::AgentConfig;
use crate::error::ModelError;
use crate::tools::ToolDefinition;
use crate::types::*;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Inference client for `/v1/chat/completions`.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
    http: reqwest::Client,
}

// -- OpenAI-compatible request/response types --------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<MessagePayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolPayload<'a>>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct MessagePayload {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ToolCallPayload>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ToolPayload<'a> {
    r#type: &'a str,
    function: FunctionPayload<'a>,
}

#[derive(Debug, Serialize)]
struct FunctionPayload<'a> {
    name: &'a str,
    description: &'a str,
    parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ToolCallPayload {
    #[serde(default)]
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    function: FunctionCallPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCallPayload {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<UsagePayload>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallPayload>,
}

#[derive(Debug, Deserialize)]
struct UsagePayload {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl InferenceClient {
    /// Create a new inference client with default sampling and retry settings.
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            timeout: Duration::from_secs(60),
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
            http: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(&config.inference_api_url, &config.inference_api_key, &config.model)
            .with_sampling(config.temperature, config.max_tokens_per_turn)
            .with_timeout(config.model_timeout())
            .with_retries(config.model_max_retries, Duration::from_millis(500))
    }

    pub fn with_sampling(mut self, temperature: f64, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Bound on a single attempt.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Retry budget; the n-th retry waits `n * backoff`.
    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = backoff;
        self
    }

    fn build_request<'a>(
        &'a self,
        messages: &[ChatMessage],
        tools: &'a [ToolDefinition],
    ) -> ChatRequest<'a> {
        let msg_payloads: Vec<MessagePayload> = messages
            .iter()
            .map(|m| {
                let tool_calls = (!m.tool_calls.is_empty()).then(|| {
                    m.tool_calls
                        .iter()
                        .map(|tc| ToolCallPayload {
                            id: tc.id.clone(),
                            r#type: function_type(),
                            function: FunctionCallPayload {
                                name: tc.name.clone(),
                                arguments: match &tc.arguments {
                                    serde_json::Value::String(raw) => raw.clone(),
                                    other => other.to_string(),
                                },
                            },
                        })
                        .collect()
                });
                MessagePayload {
                    role: match m.role {
                        ChatRole::System => "system".into(),
                        ChatRole::User => "user".into(),
                        ChatRole::Assistant => "assistant".into(),
                        ChatRole::Tool => "tool".into(),
                    },
                    content: if m.content.is_empty() && tool_calls.is_some() {
                        None
                    } else {
                        Some(m.content.clone())
                    },
                    tool_calls,
                    tool_call_id: m.tool_call_id.clone(),
                }
            })
            .collect();

        let tool_payloads: Option<Vec<ToolPayload>> = if tools.is_empty() {
            None
        } else {
            Some(
                tools
                    .iter()
                    .map(|t| ToolPayload {
                        r#type: "function",
                        function: FunctionPayload {
                            name: &t.name,
                            description: &t.description,
                            parameters: t.parameters_json(),
                        },
                    })
                    .collect(),
            )
        };

        ChatRequest {
            model: &self.model,
            messages: msg_payloads,
            tools: tool_payloads,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    /// One round trip to the API.
    async fn attempt(&self, request: &ChatRequest<'_>) -> Result<ModelResponse, ModelError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ModelError::Malformed(format!("Failed to parse inference response: {}", e)))?;

        parse_response(body)
    }
}

fn parse_response(body: ChatResponse) -> Result<ModelResponse, ModelError> {
    let usage = body
        .usage
        .map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        })
        .unwrap_or_default();

    let choice = body
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ModelError::Malformed("response has no choices".into()))?;

    let content = choice.message.content.filter(|c| !c.trim().is_empty());

    if !choice.message.tool_calls.is_empty() {
        // Arguments that are not valid JSON are kept verbatim so that
        // validation can report them back to the model.
        let calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|tc| {
                let raw = tc.function.arguments;
                let arguments = if raw.trim().is_empty() {
                    serde_json::Value::Object(serde_json::Map::new())
                } else {
                    serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
                };
                ToolCall {
                    id: tc.id,
                    name: tc.function.name,
                    arguments,
                }
            })
            .collect();
        return Ok(ModelResponse {
            reply: ModelReply::ToolCalls { content, calls },
            usage,
        });
    }

    match content {
        Some(text) => Ok(ModelResponse {
            reply: ModelReply::Final(text),
            usage,
        }),
        None => Err(ModelError::Malformed(
            "reply contained neither text nor tool calls".into(),
        )),
    }
}

#[async_trait]
impl ModelService for InferenceClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelResponse, ModelError> {
        let request = self.build_request(messages, tools);
        debug!(
            "Inference request to model {}: {} messages, {} tools",
            self.model,
            messages.len(),
            tools.len()
        );

        let mut attempt: u32 = 0;
        loop {
            let outcome = match tokio::time::timeout(self.timeout, self.attempt(&request)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ModelError::Timeout(self.timeout)),
            };

            let err = match outcome {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };
            if !err.is_retryable() {
                return Err(err);
            }
            if attempt >= self.max_retries {
                return Err(ModelError::RetriesExhausted {
                    attempts: attempt + 1,
                    last: Box::new(err),
                });
            }

            attempt += 1;
            warn!(
                "Inference attempt {}/{} failed: {}",
                attempt,
                self.max_retries + 1,
                err
            );
            tokio::time::sleep(self.retry_backoff * attempt).await;
        }
    }
}
