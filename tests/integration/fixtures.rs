//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - Scripted workers that succeed, fail, error, or wait on a barrier
//! - A scripted LLM and a recording tool bridge
//! - A harness wiring an orchestrator to in-memory collaborators

use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Barrier};

use async_trait::async_trait;
use conductor::agent::{Agent, AgentConfig};
use conductor::bridge::ToolBridge;
use conductor::bus::InMemoryBus;
use conductor::config::Config;
use conductor::core::{AgentError, AgentResult, AgentTask, ErrorCode, TaskId, TaskType};
use conductor::llm::LlmClient;
use conductor::orchestration::{
    AgentPool, Orchestrator, OrchestratorEvent, OrchestratorState, PlanObserver, Services,
};
use conductor::state::MemoryStateStore;
use conductor::{Error, Result};

/// Every worker id the deterministic planner assigns.
pub const DEFAULT_AGENT_IDS: [&str; 7] = [
    "scene_agent",
    "script_agent",
    "character_agent",
    "tileset_agent",
    "integration_agent",
    "validation_agent",
    "general_agent",
];

enum Behavior {
    Succeed,
    Fail,
    Error,
    Gate(Arc<Barrier>),
}

/// A worker whose outcome is fixed up front and which counts its calls.
pub struct ScriptedAgent {
    id: String,
    behavior: Behavior,
    calls: AtomicUsize,
    seen: Mutex<Vec<TaskId>>,
}

impl ScriptedAgent {
    fn build(id: &str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            behavior,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn ok(id: &str) -> Arc<Self> {
        Self::build(id, Behavior::Succeed)
    }

    /// Reports an `AGENT_FAILED` result.
    pub fn failing(id: &str) -> Arc<Self> {
        Self::build(id, Behavior::Fail)
    }

    /// Returns `Err` from `execute`.
    pub fn erroring(id: &str) -> Arc<Self> {
        Self::build(id, Behavior::Error)
    }

    /// Succeeds only once every holder of `barrier` has arrived.
    pub fn gated(id: &str, barrier: Arc<Barrier>) -> Arc<Self> {
        Self::build(id, Behavior::Gate(barrier))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<TaskId> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn config(&self) -> AgentConfig {
        AgentConfig::new(&self.id, &self.id, "worker")
    }

    fn can_handle(&self, _task: &AgentTask) -> bool {
        true
    }

    async fn execute(&self, task: &AgentTask) -> Result<AgentResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(task.id);

        match &self.behavior {
            Behavior::Fail => Ok(AgentResult::failure(
                task.id,
                &self.id,
                AgentError::new(ErrorCode::AgentFailed, format!("{} refused", self.id)),
            )),
            Behavior::Error => Err(Error::Validation("boom".to_string())),
            Behavior::Gate(barrier) => {
                barrier.wait().await;
                Ok(AgentResult::success(task.id, &self.id, json!({ "gated": true })))
            }
            Behavior::Succeed => Ok(AgentResult::success(
                task.id,
                &self.id,
                json!({ "type": task.task_type.as_str() }),
            )
            .with_artifacts(vec![format!("res://{}/{}.tres", self.id, task.id.short())])
            .with_tokens(10)),
        }
    }
}

/// Agents for every default worker id, all succeeding.
pub fn default_agents() -> Vec<Arc<ScriptedAgent>> {
    DEFAULT_AGENT_IDS.iter().map(|id| ScriptedAgent::ok(id)).collect()
}

/// Replace the agent with the same id.
pub fn with_agent(mut agents: Vec<Arc<ScriptedAgent>>, agent: Arc<ScriptedAgent>) -> Vec<Arc<ScriptedAgent>> {
    agents.retain(|a| a.id != agent.id);
    agents.push(agent);
    agents
}

/// LLM that answers every prompt with the same reply, or fails.
pub struct ScriptedLlm {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn offline() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn send(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply
            .clone()
            .ok_or_else(|| Error::Llm("model unavailable".to_string()))
    }
}

/// Bridge that records every tool call and answers with canned data.
#[derive(Default)]
pub struct RecordingBridge {
    calls: Mutex<Vec<(String, Value)>>,
    offline: bool,
}

impl RecordingBridge {
    pub fn offline() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            offline: true,
        })
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_named(&self, name: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|(n, _)| n == name)
            .map(|(_, params)| params)
            .collect()
    }
}

#[async_trait]
impl ToolBridge for RecordingBridge {
    async fn execute_tool(&self, name: &str, params: Value) -> Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), params));
        if self.offline {
            return Err(Error::Bridge("editor not connected".to_string()));
        }
        Ok(match name {
            "get_scene_tree" => json!({ "name": "Main", "type": "Node2D", "children": [] }),
            "list_files" => json!(["res://Main.tscn", "res://scripts/player.gd"]),
            _ => json!({ "success": true }),
        })
    }
}

/// Config that keeps the planner deterministic.
pub fn offline_config() -> Config {
    let mut config = Config::default();
    config.planner.use_llm = false;
    config
}

/// An orchestrator wired to in-memory collaborators, plus handles to them.
pub struct Harness {
    pub orchestrator: Orchestrator,
    pub pool: Arc<AgentPool>,
    pub store: Arc<MemoryStateStore>,
    pub bus: Arc<InMemoryBus>,
    pub bridge: Arc<RecordingBridge>,
    pub llm: Arc<ScriptedLlm>,
    pub events: mpsc::Receiver<OrchestratorEvent>,
}

impl Harness {
    pub fn new(agents: Vec<Arc<ScriptedAgent>>) -> Self {
        Self::build(agents, offline_config(), ScriptedLlm::offline(), Arc::new(RecordingBridge::default()))
    }

    pub fn build(
        agents: Vec<Arc<ScriptedAgent>>,
        config: Config,
        llm: Arc<ScriptedLlm>,
        bridge: Arc<RecordingBridge>,
    ) -> Self {
        Self::build_observed(agents, config, llm, bridge, None)
    }

    pub fn build_observed(
        agents: Vec<Arc<ScriptedAgent>>,
        config: Config,
        llm: Arc<ScriptedLlm>,
        bridge: Arc<RecordingBridge>,
        observer: Option<Arc<dyn PlanObserver>>,
    ) -> Self {
        let pool = Arc::new(AgentPool::new());
        for agent in agents {
            pool.register(agent);
        }
        let store = Arc::new(MemoryStateStore::new());
        let bus = Arc::new(InMemoryBus::new());
        let (tx, events) = mpsc::channel(1024);

        let services = Services {
            pool: pool.clone(),
            store: store.clone(),
            bus: bus.clone(),
            bridge: bridge.clone(),
            llm: llm.clone(),
        };
        let mut orchestrator = Orchestrator::new(&config, services).with_events(tx);
        if let Some(observer) = observer {
            orchestrator = orchestrator.with_observer(observer);
        }

        Self {
            orchestrator,
            pool,
            store,
            bus,
            bridge,
            llm,
            events,
        }
    }

    pub fn drain_events(&mut self) -> Vec<OrchestratorEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// The states entered so far, in order.
    pub fn states(&mut self) -> Vec<OrchestratorState> {
        self.drain_events()
            .into_iter()
            .filter_map(|e| match e {
                OrchestratorEvent::StateChanged { to, .. } => Some(to),
                _ => None,
            })
            .collect()
    }
}

/// A task pinned to `agent`.
pub fn task_for(agent: &str, task_type: TaskType) -> AgentTask {
    AgentTask::new(task_type, &format!("{} work", agent)).with_agent(agent)
}

/// Ids listed under `completedTasks` in a plan result.
pub fn completed_tasks(result: &AgentResult) -> Vec<TaskId> {
    serde_json::from_value(result.output["completedTasks"].clone()).unwrap()
}
