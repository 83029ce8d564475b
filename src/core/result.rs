//! Agent results and task-level error codes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::task::TaskId;

/// Task-level failure codes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No worker is registered under the task's assigned agent id.
    NoAgent,
    /// An unexpected error escaped the orchestrator's execution path.
    ExecutionFailed,
    /// The conversational path could not produce an answer.
    QuestionHandlingFailed,
    /// Post-execution verification failed under the strict policy.
    VerificationFailed,
    /// A worker reported that its task failed.
    AgentFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoAgent => "NO_AGENT",
            ErrorCode::ExecutionFailed => "EXECUTION_FAILED",
            ErrorCode::QuestionHandlingFailed => "QUESTION_HANDLING_FAILED",
            ErrorCode::VerificationFailed => "VERIFICATION_FAILED",
            ErrorCode::AgentFailed => "AGENT_FAILED",
        }
    }

    /// Whether a caller may retry after this failure.
    pub fn default_recoverable(&self) -> bool {
        !matches!(self, ErrorCode::NoAgent)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure details attached to an unsuccessful `AgentResult`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentError {
    pub code: ErrorCode,
    pub message: String,
    pub recoverable: bool,
}

impl AgentError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            recoverable: code.default_recoverable(),
        }
    }

    pub fn with_recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }
}

/// Outcome of one task, or of a whole plan when returned by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResult {
    pub task_id: TaskId,
    pub agent_id: String,
    pub success: bool,
    /// Identifiers of produced artifacts (usually `res://` paths).
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default)]
    pub output: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<AgentError>,
    #[serde(default)]
    pub tokens_used: u64,
    /// Wall-clock milliseconds.
    #[serde(default)]
    pub execution_time: u64,
}

impl AgentResult {
    pub fn success(task_id: TaskId, agent_id: &str, output: Value) -> Self {
        Self {
            task_id,
            agent_id: agent_id.to_string(),
            success: true,
            artifacts: Vec::new(),
            output,
            error: None,
            tokens_used: 0,
            execution_time: 0,
        }
    }

    pub fn failure(task_id: TaskId, agent_id: &str, error: AgentError) -> Self {
        Self {
            task_id,
            agent_id: agent_id.to_string(),
            success: false,
            artifacts: Vec::new(),
            output: Value::Null,
            error: Some(error),
            tokens_used: 0,
            execution_time: 0,
        }
    }

    pub fn with_artifacts(mut self, artifacts: Vec<String>) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn with_tokens(mut self, tokens_used: u64) -> Self {
        self.tokens_used = tokens_used;
        self
    }

    pub fn with_execution_time(mut self, millis: u64) -> Self {
        self.execution_time = millis;
        self
    }

    /// The failure code, if this result is a failure.
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|e| e.code)
    }
}
