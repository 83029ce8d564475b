//! In-process `StateStore` for hosts without persistence and for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ProjectState, StateStore};
use crate::core::{CheckpointId, PlanId, PlanStatus, TaskPlan};
use crate::error::{Error, Result};
use crate::{clog, clog_debug, clog_warn};

#[derive(Debug, Clone)]
struct Checkpoint {
    label: String,
    author_id: String,
    created_at: DateTime<Utc>,
    snapshot: ProjectState,
}

#[derive(Debug, Default)]
struct Inner {
    project: ProjectState,
    plans: HashMap<PlanId, TaskPlan>,
    checkpoints: HashMap<CheckpointId, Checkpoint>,
}

/// Keeps every state change behind one lock.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    inner: RwLock<Inner>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(project: ProjectState) -> Self {
        Self {
            inner: RwLock::new(Inner {
                project,
                ..Default::default()
            }),
        }
    }

    pub async fn put_scene(&self, path: &str, root_type: &str) {
        self.inner
            .write()
            .await
            .project
            .scenes
            .insert(path.to_string(), root_type.to_string());
    }

    pub async fn put_asset(&self, path: &str, kind: &str) {
        self.inner
            .write()
            .await
            .project
            .assets
            .insert(path.to_string(), kind.to_string());
    }

    pub async fn checkpoint_count(&self) -> usize {
        self.inner.read().await.checkpoints.len()
    }

    /// Label and author recorded for a checkpoint.
    pub async fn checkpoint_info(&self, id: &CheckpointId) -> Option<(String, String)> {
        self.inner
            .read()
            .await
            .checkpoints
            .get(id)
            .map(|c| (c.label.clone(), c.author_id.clone()))
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get_state(&self) -> Result<ProjectState> {
        Ok(self.inner.read().await.project.clone())
    }

    async fn set_current_plan(&self, plan: TaskPlan) -> Result<()> {
        let mut inner = self.inner.write().await;
        clog_debug!("Current plan -> {}", plan.id.short());
        inner.project.current_plan_id = Some(plan.id);
        inner.plans.insert(plan.id, plan);
        Ok(())
    }

    async fn get_current_plan(&self) -> Result<Option<TaskPlan>> {
        let inner = self.inner.read().await;
        Ok(inner
            .project
            .current_plan_id
            .and_then(|id| inner.plans.get(&id))
            .cloned())
    }

    async fn update_plan_status(&self, plan_id: PlanId, status: PlanStatus) -> Result<()> {
        let mut inner = self.inner.write().await;
        let plan = inner
            .plans
            .get_mut(&plan_id)
            .ok_or_else(|| Error::StateStore(format!("Unknown plan {}", plan_id)))?;
        plan.status = status;
        Ok(())
    }

    async fn create_checkpoint(&self, label: &str, author_id: &str) -> Result<CheckpointId> {
        let mut inner = self.inner.write().await;
        let id = CheckpointId(format!("checkpoint-{}", Uuid::new_v4()));
        let checkpoint = Checkpoint {
            label: label.to_string(),
            author_id: author_id.to_string(),
            created_at: Utc::now(),
            snapshot: inner.project.clone(),
        };
        clog!("Checkpoint {} created by {}: {}", id, author_id, label);
        inner.checkpoints.insert(id.clone(), checkpoint);
        Ok(id)
    }

    async fn rollback_to_checkpoint(&self, id: &CheckpointId) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let Some(checkpoint) = inner.checkpoints.get(id).cloned() else {
            clog_warn!("Rollback to unknown checkpoint {}", id);
            return Ok(false);
        };
        clog!(
            "Rolling back to {} ({}, taken {})",
            id,
            checkpoint.label,
            checkpoint.created_at.format("%H:%M:%S")
        );
        inner.project = checkpoint.snapshot;
        Ok(true)
    }
}
