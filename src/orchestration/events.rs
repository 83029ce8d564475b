//! Progress notifications emitted by the orchestrator.

use serde_json::Value;

use super::phase::OrchestratorState;
use crate::core::{PlanProjection, TaskId};

/// Where a dispatched task stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskProgress {
    Working,
    Completed,
    Failed,
}

/// Events delivered over the orchestrator's progress channel.
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorEvent {
    StateChanged {
        from: OrchestratorState,
        to: OrchestratorState,
    },
    PlanCreated(PlanProjection),
    AgentStatus {
        agent_id: String,
        task_id: TaskId,
        progress: TaskProgress,
    },
    /// A worker's `status_update` message, forwarded as-is.
    StatusUpdate { from: String, payload: Value },
}

/// Receives a read-only view of every plan before it executes.
pub trait PlanObserver: Send + Sync {
    fn on_plan_created(&self, projection: &PlanProjection);
}
