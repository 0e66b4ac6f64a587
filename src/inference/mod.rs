//! Model-service boundary.
//!
//! The agent loop only talks to a [`ModelService`]; [`InferenceClient`]
//! implements it against an OpenAI-compatible chat-completions API.

pub mod client;

pub use client::InferenceClient;

use crate::error::ModelError;
use crate::tools::ToolDefinition;
use crate::types::{ChatMessage, ModelResponse};
use async_trait::async_trait;

/// Something that, given the conversation so far and the tool catalog,
/// decides the next action.
#[async_trait]
pub trait ModelService: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelResponse, ModelError>;
}
