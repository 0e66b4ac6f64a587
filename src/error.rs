//! Error taxonomy for tools, backends, the model service and the agent loop.
//!
//! Every error can be turned into an [`ErrorReport`]: a machine-readable
//! [`ErrorKind`] plus a human-readable message. Tool errors are split into
//! recoverable ones, which are fed back to the model as failed tool results,
//! and fatal ones, which abort the run.

use crate::cas::CasError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Machine-readable error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownTool,
    ArgumentValidation,
    DivisionByZero,
    NonFiniteResult,
    ExpressionParse,
    UnknownVariable,
    CasBackend,
    SearchUnavailable,
    ToolExecution,
    DuplicateName,
    ModelUnavailable,
    MalformedModelResponse,
    ModelTimeout,
    MaxIterationsExceeded,
    RunTimeout,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UnknownTool => "unknown_tool",
            Self::ArgumentValidation => "argument_validation",
            Self::DivisionByZero => "division_by_zero",
            Self::NonFiniteResult => "non_finite_result",
            Self::ExpressionParse => "expression_parse",
            Self::UnknownVariable => "unknown_variable",
            Self::CasBackend => "cas_backend",
            Self::SearchUnavailable => "search_unavailable",
            Self::ToolExecution => "tool_execution",
            Self::DuplicateName => "duplicate_name",
            Self::ModelUnavailable => "model_unavailable",
            Self::MalformedModelResponse => "malformed_model_response",
            Self::ModelTimeout => "model_timeout",
            Self::MaxIterationsExceeded => "max_iterations_exceeded",
            Self::RunTimeout => "run_timeout",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Structured error surfaced to callers and fed back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorReport {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

// ---------------------------------------------------------------------------
// Tool errors
// ---------------------------------------------------------------------------

/// Failure of a single tool invocation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("invalid arguments for '{tool}': {reason}")]
    ArgumentValidation { tool: String, reason: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("{0} has no finite real result")]
    NonFiniteResult(String),

    #[error("could not parse expression: {0}")]
    ExpressionParse(String),

    #[error("'{0}' cannot be used as a variable")]
    UnknownVariable(String),

    #[error("symbolic computation failed: {0}")]
    CasBackend(String),

    #[error("web search unavailable: {0}")]
    SearchUnavailable(String),

    #[error("tool '{tool}' crashed: {reason}")]
    ToolExecution { tool: String, reason: String },
}

impl ToolError {
    pub fn invalid_args(tool: &str, reason: impl Into<String>) -> Self {
        Self::ArgumentValidation {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownTool(_) => ErrorKind::UnknownTool,
            Self::ArgumentValidation { .. } => ErrorKind::ArgumentValidation,
            Self::DivisionByZero => ErrorKind::DivisionByZero,
            Self::NonFiniteResult(_) => ErrorKind::NonFiniteResult,
            Self::ExpressionParse(_) => ErrorKind::ExpressionParse,
            Self::UnknownVariable(_) => ErrorKind::UnknownVariable,
            Self::CasBackend(_) => ErrorKind::CasBackend,
            Self::SearchUnavailable(_) => ErrorKind::SearchUnavailable,
            Self::ToolExecution { .. } => ErrorKind::ToolExecution,
        }
    }

    /// Fatal errors abort the run instead of being fed back to the model.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ToolExecution { .. })
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::new(self.kind(), self.to_string())
    }
}

impl From<CasError> for ToolError {
    fn from(err: CasError) -> Self {
        match err {
            CasError::Parse { .. } => Self::ExpressionParse(err.to_string()),
            CasError::InvalidSymbol(name) => Self::UnknownVariable(name),
            CasError::Unsupported(_) | CasError::Evaluation(_) => Self::CasBackend(err.to_string()),
        }
    }
}

impl From<SearchError> for ToolError {
    fn from(err: SearchError) -> Self {
        Self::SearchUnavailable(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Registry errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("a tool named '{0}' is already registered")]
    DuplicateName(String),
}

impl RegistryError {
    pub fn report(&self) -> ErrorReport {
        ErrorReport::new(ErrorKind::DuplicateName, self.to_string())
    }
}

// ---------------------------------------------------------------------------
// Backend errors
// ---------------------------------------------------------------------------

/// Failure talking to the web-search backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchError {
    #[error("no search API key configured")]
    MissingApiKey,

    #[error("search request timed out after {0:?}")]
    Timeout(Duration),

    #[error("search backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("search request failed: {0}")]
    Transport(String),

    #[error("could not decode search response: {0}")]
    Decode(String),
}

/// Failure talking to the model service.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("model service unreachable: {0}")]
    Transport(String),

    #[error("model service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed model response: {0}")]
    Malformed(String),

    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("model service failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<ModelError> },
}

impl ModelError {
    /// Whether another attempt might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Malformed(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::RetriesExhausted { .. } => false,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) | Self::Status { .. } => ErrorKind::ModelUnavailable,
            Self::Malformed(_) => ErrorKind::MalformedModelResponse,
            Self::Timeout(_) => ErrorKind::ModelTimeout,
            Self::RetriesExhausted { last, .. } => last.kind(),
        }
    }
}

// ---------------------------------------------------------------------------
// Agent errors
// ---------------------------------------------------------------------------

/// Why an agent run ended in the `Failed` state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AgentError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("model did not answer within {0:?}")]
    ModelTimeout(Duration),

    #[error("no final answer after {limit} model turns")]
    MaxIterationsExceeded { limit: usize },

    #[error("run did not finish within {0:?}")]
    RunTimeout(Duration),

    #[error("fatal tool failure: {0}")]
    Tool(ToolError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("run cancelled")]
    Cancelled,
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Model(e) => e.kind(),
            Self::ModelTimeout(_) => ErrorKind::ModelTimeout,
            Self::MaxIterationsExceeded { .. } => ErrorKind::MaxIterationsExceeded,
            Self::RunTimeout(_) => ErrorKind::RunTimeout,
            Self::Tool(e) => e.kind(),
            Self::Registry(_) => ErrorKind::DuplicateName,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::new(self.kind(), self.to_string())
    }
}
