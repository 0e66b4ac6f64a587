//! Shared types used across the agent runtime.

use crate::error::ErrorReport;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Agent state machine
// ---------------------------------------------------------------------------

/// States an agent run moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Waiting for the model to pick the next action.
    AwaitingModel,
    /// Running the tool calls the model requested.
    ExecutingTool,
    /// The model produced a final answer.
    Done,
    /// The run was aborted with an error report.
    Failed,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingModel => write!(f, "awaiting_model"),
            Self::ExecutingTool => write!(f, "executing_tool"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl Default for AgentState {
    fn default() -> Self {
        Self::AwaitingModel
    }
}

// ---------------------------------------------------------------------------
// Inference types
// ---------------------------------------------------------------------------

/// A chat message as sent to the model service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    /// Tool calls requested by an assistant message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// The call a `tool` message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(ChatRole::System, content.into())
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(ChatRole::User, content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(ChatRole::Assistant, content.into())
    }

    fn plain(role: ChatRole, content: String) -> Self {
        Self {
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call request from the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Result of executing a tool call, as recorded in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub tool_name: String,
    /// Text handed back to the model: the rendered value or the error.
    pub output: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

/// What the model decided to do next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelReply {
    /// Run these tools, then ask again.
    ToolCalls {
        content: Option<String>,
        calls: Vec<ToolCall>,
    },
    /// Final natural-language answer.
    Final(String),
}

/// A model reply together with the tokens it cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub reply: ModelReply,
    pub usage: TokenUsage,
}

/// Token usage from an inference call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// One entry of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Turn {
    User { content: String },
    ToolRequests {
        content: Option<String>,
        calls: Vec<ToolCall>,
    },
    ToolResult(ToolResult),
    Assistant { content: String },
}

/// Ordered history of one agent run. Only ever appended to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    turns: Vec<Turn>,
}

impl ConversationState {
    /// Start a conversation with the user's request.
    pub fn new(request: &str) -> Self {
        Self {
            turns: vec![Turn::User {
                content: request.to_string(),
            }],
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn tool_results(&self) -> impl Iterator<Item = &ToolResult> {
        self.turns.iter().filter_map(|t| match t {
            Turn::ToolResult(r) => Some(r),
            _ => None,
        })
    }

    /// The final answer, when the last turn is one.
    pub fn final_answer(&self) -> Option<&str> {
        match self.turns.last() {
            Some(Turn::Assistant { content }) => Some(content),
            _ => None,
        }
    }
}
