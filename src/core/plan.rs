//! Task plans: the tasks of one request, their edges, and their leveling.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use super::task::{AgentTask, TaskDependency, TaskId, TaskType};

/// Unique identifier for a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(pub Uuid);

impl PlanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for PlanId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle to a project-state snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointId(pub String);

impl std::fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Created,
    Executing,
    Completed,
    Failed,
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanStatus::Created => write!(f, "created"),
            PlanStatus::Executing => write!(f, "executing"),
            PlanStatus::Completed => write!(f, "completed"),
            PlanStatus::Failed => write!(f, "failed"),
        }
    }
}

/// The decomposition of one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPlan {
    pub id: PlanId,
    pub user_request: String,
    pub tasks: Vec<AgentTask>,
    pub dependencies: Vec<TaskDependency>,
    /// Topological levels; every member of a level may run concurrently.
    pub parallel_groups: Vec<Vec<TaskId>>,
    pub status: PlanStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<CheckpointId>,
}

impl TaskPlan {
    /// Create an empty plan for a request.
    pub fn new(user_request: &str) -> Self {
        Self {
            id: PlanId::new(),
            user_request: user_request.to_string(),
            tasks: Vec::new(),
            dependencies: Vec::new(),
            parallel_groups: Vec::new(),
            status: PlanStatus::Created,
            checkpoint_id: None,
        }
    }

    pub fn get_task(&self, id: &TaskId) -> Option<&AgentTask> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// Position of a task in `tasks`, which is also its progress step index.
    pub fn task_index(&self, id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| &t.id == id)
    }

    /// Resolve a group of ids to tasks, skipping ids the plan does not know.
    pub fn resolve_group(&self, group: &[TaskId]) -> Vec<AgentTask> {
        group
            .iter()
            .filter_map(|id| self.get_task(id))
            .cloned()
            .collect()
    }

    /// Task types in plan order.
    pub fn task_types(&self) -> Vec<TaskType> {
        self.tasks.iter().map(|t| t.task_type).collect()
    }

    pub fn tasks_of_type(&self, task_type: TaskType) -> Vec<&AgentTask> {
        self.tasks
            .iter()
            .filter(|t| t.task_type == task_type)
            .collect()
    }

    /// Index of the group containing `id`.
    pub fn group_of(&self, id: &TaskId) -> Option<usize> {
        self.parallel_groups
            .iter()
            .position(|group| group.contains(id))
    }

    /// Tasks that no group schedules (non-empty only after a cycle).
    pub fn unscheduled(&self) -> Vec<TaskId> {
        let scheduled: HashSet<&TaskId> = self.parallel_groups.iter().flatten().collect();
        self.tasks
            .iter()
            .map(|t| t.id)
            .filter(|id| !scheduled.contains(id))
            .collect()
    }

    pub fn is_fully_scheduled(&self) -> bool {
        self.unscheduled().is_empty()
    }

    /// Read-only view for hosts that display the plan.
    pub fn projection(&self) -> PlanProjection {
        PlanProjection {
            id: self.id,
            tasks: self
                .tasks
                .iter()
                .map(|t| ProjectedTask {
                    id: t.id,
                    task_type: t.task_type,
                    description: t.description.clone(),
                    assigned_agent: t.assigned_agent.clone(),
                    status: "pending".to_string(),
                })
                .collect(),
        }
    }
}

/// Host-visible snapshot of a freshly created plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanProjection {
    pub id: PlanId,
    pub tasks: Vec<ProjectedTask>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedTask {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub description: String,
    pub assigned_agent: String,
    pub status: String,
}
