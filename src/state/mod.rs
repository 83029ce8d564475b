//! Project state and the store that owns the current-plan pointer.
//!
//! The orchestrator reads state once before planning and writes the current
//! plan once before execution. Checkpoints snapshot the project so a failed
//! plan can be rolled back.

mod memory;

pub use memory::MemoryStateStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::{CheckpointId, PlanId, PlanStatus, TaskPlan};
use crate::error::Result;

/// What the planner and the conversational path know about the project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectState {
    /// Scene path to root node type.
    #[serde(default)]
    pub scenes: BTreeMap<String, String>,
    /// Asset path to asset kind.
    #[serde(default)]
    pub assets: BTreeMap<String, String>,
    #[serde(default)]
    pub open_scenes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_plan_id: Option<PlanId>,
}

impl ProjectState {
    /// The scene new nodes and scripts land in when a request names none.
    pub fn active_scene(&self) -> Option<&str> {
        self.open_scenes
            .first()
            .or_else(|| self.scenes.keys().next())
            .map(String::as_str)
    }
}

/// Single-writer owner of project state, plans, and checkpoints.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get_state(&self) -> Result<ProjectState>;

    /// Make `plan` the current plan, superseding any previous one.
    async fn set_current_plan(&self, plan: TaskPlan) -> Result<()>;

    async fn get_current_plan(&self) -> Result<Option<TaskPlan>>;

    async fn update_plan_status(&self, plan_id: PlanId, status: PlanStatus) -> Result<()>;

    async fn create_checkpoint(&self, label: &str, author_id: &str) -> Result<CheckpointId>;

    /// Restore the snapshot taken by `create_checkpoint`. Returns `false`
    /// when no checkpoint has that id.
    async fn rollback_to_checkpoint(&self, id: &CheckpointId) -> Result<bool>;
}
