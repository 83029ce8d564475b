//! Worker contract and per-agent status.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{AgentResult, AgentTask, TaskId};
use crate::error::Result;

/// Static description of a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub name: String,
    pub role: String,
}

impl AgentConfig {
    pub fn new(id: &str, name: &str, role: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            role: role.to_string(),
        }
    }
}

/// Activity of a worker as seen by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum AgentStatus {
    #[default]
    Idle,
    Working { task_id: TaskId },
    Error,
}

impl AgentStatus {
    pub fn is_working(&self) -> bool {
        matches!(self, AgentStatus::Working { .. })
    }

    /// Status label published on the message bus.
    pub fn label(&self) -> &'static str {
        match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Working { .. } => "working",
            AgentStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Working { task_id } => write!(f, "working on {}", task_id.short()),
            other => write!(f, "{}", other.label()),
        }
    }
}

/// A specialized worker.
///
/// Workers report task failure as an unsuccessful `AgentResult`; an `Err`
/// means the worker itself broke.
#[async_trait]
pub trait Agent: Send + Sync {
    fn config(&self) -> AgentConfig;

    fn can_handle(&self, task: &AgentTask) -> bool;

    async fn execute(&self, task: &AgentTask) -> Result<AgentResult>;
}
