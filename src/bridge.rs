//! Host automation bridge and the progress mirror built on it.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::core::TaskPlan;
use crate::error::Result;
use crate::{clog_debug, clog_warn};

/// Invokes a named tool in the host editor.
#[async_trait]
pub trait ToolBridge: Send + Sync {
    async fn execute_tool(&self, name: &str, params: Value) -> Result<Value>;
}

/// Status of one mirrored plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::InProgress => "in_progress",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
        }
    }
}

/// Mirrors plan progress into the host's step list.
///
/// Every call is best-effort: bridge failures are logged and swallowed.
#[derive(Clone)]
pub struct ProgressMirror {
    bridge: Arc<dyn ToolBridge>,
    enabled: bool,
}

impl ProgressMirror {
    pub fn new(bridge: Arc<dyn ToolBridge>, enabled: bool) -> Self {
        Self { bridge, enabled }
    }

    /// Publish the plan's tasks as pending steps, indexed by plan order.
    pub async fn publish_plan(&self, plan: &TaskPlan) {
        if !self.enabled {
            return;
        }
        let steps: Vec<Value> = plan
            .tasks
            .iter()
            .enumerate()
            .map(|(index, task)| {
                json!({
                    "index": index,
                    "description": task.description,
                    "type": task.task_type.as_str(),
                    "agent": task.assigned_agent,
                    "status": StepStatus::Pending.as_str(),
                })
            })
            .collect();

        let params = json!({ "name": plan.user_request, "steps": steps });
        if let Err(e) = self.bridge.execute_tool("set_task_plan", params).await {
            clog_warn!("Failed to publish plan {}: {}", plan.id.short(), e);
        }
    }

    pub async fn update_step(&self, step_index: usize, status: StepStatus) {
        if !self.enabled {
            return;
        }
        clog_debug!("Plan step {} -> {}", step_index, status.as_str());
        let params = json!({ "step_index": step_index, "status": status.as_str() });
        if let Err(e) = self.bridge.execute_tool("update_plan", params).await {
            clog_warn!("Failed to update plan step {}: {}", step_index, e);
        }
    }
}
