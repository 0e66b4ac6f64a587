//! Message context builder for the agent loop.
//!
//! Turns the conversation of a run into the message list sent to the model.

use crate::types::*;
use tracing::debug;

/// Build the full message history for a model call.
pub fn build_messages(system_prompt: &str, conversation: &ConversationState) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(conversation.len() + 1);
    messages.push(ChatMessage::system(system_prompt));

    for turn in conversation.turns() {
        messages.push(match turn {
            Turn::User { content } => ChatMessage::user(content.clone()),
            Turn::Assistant { content } => ChatMessage::assistant(content.clone()),
            Turn::ToolRequests { content, calls } => ChatMessage {
                role: ChatRole::Assistant,
                content: content.clone().unwrap_or_default(),
                tool_calls: calls.clone(),
                tool_call_id: None,
            },
            Turn::ToolResult(result) => ChatMessage {
                role: ChatRole::Tool,
                content: result.output.clone(),
                tool_calls: Vec::new(),
                tool_call_id: Some(result.tool_call_id.clone()),
            },
        });
    }

    debug!("Built {} messages for the model", messages.len());
    messages
}
