//! Agent pool: the registry of workers the orchestrator dispatches to.
//!
//! Workers are looked up by the `assigned_agent` id carried on each task.
//! The pool also tracks what each worker is doing so hosts can show it.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::agent::{Agent, AgentConfig, AgentStatus};
use crate::core::AgentTask;
use crate::error::{Error, Result};

struct PoolEntry {
    agent: Arc<dyn Agent>,
    status: AgentStatus,
}

/// Registry of workers keyed by agent id.
///
/// Status updates come from concurrently running dispatches, so the map
/// sits behind a lock; lookups hand out cheap `Arc` clones.
///
/// # Example
///
/// ```ignore
/// let pool = AgentPool::new();
/// pool.register(Arc::new(SceneAgent::default()));
/// assert!(pool.get("scene_agent").is_some());
/// ```
#[derive(Default)]
pub struct AgentPool {
    agents: RwLock<BTreeMap<String, PoolEntry>>,
}

impl AgentPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker under its configured id, replacing any previous one.
    pub fn register(&self, agent: Arc<dyn Agent>) -> AgentConfig {
        let config = agent.config();
        if let Ok(mut agents) = self.agents.write() {
            agents.insert(
                config.id.clone(),
                PoolEntry {
                    agent,
                    status: AgentStatus::Idle,
                },
            );
        }
        config
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Agent>> {
        self.agents
            .read()
            .ok()
            .and_then(|agents| agents.get(id).map(|e| e.agent.clone()))
    }

    /// Like [`AgentPool::get`], but a missing worker is an error.
    pub fn require(&self, id: &str) -> Result<Arc<dyn Agent>> {
        self.get(id)
            .ok_or_else(|| Error::AgentNotFound(id.to_string()))
    }

    /// First registered worker (in id order) that accepts `task`.
    pub fn find_capable(&self, task: &AgentTask) -> Option<Arc<dyn Agent>> {
        self.agents.read().ok().and_then(|agents| {
            agents
                .values()
                .find(|e| e.agent.can_handle(task))
                .map(|e| e.agent.clone())
        })
    }

    pub fn status(&self, id: &str) -> Option<AgentStatus> {
        self.agents
            .read()
            .ok()
            .and_then(|agents| agents.get(id).map(|e| e.status))
    }

    pub fn set_status(&self, id: &str, status: AgentStatus) -> Result<()> {
        let mut agents = self
            .agents
            .write()
            .map_err(|e| Error::Validation(format!("agent pool lock poisoned: {}", e)))?;
        let entry = agents
            .get_mut(id)
            .ok_or_else(|| Error::AgentNotFound(id.to_string()))?;
        entry.status = status;
        Ok(())
    }

    pub fn configs(&self) -> Vec<AgentConfig> {
        self.agents
            .read()
            .map(|agents| agents.values().map(|e| e.agent.config()).collect())
            .unwrap_or_default()
    }

    /// Ids of workers currently running a task.
    pub fn working(&self) -> Vec<String> {
        self.agents
            .read()
            .map(|agents| {
                agents
                    .iter()
                    .filter(|(_, e)| e.status.is_working())
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.agents.read().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
