//! Session message bus between the orchestrator and workers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::agent::{AgentConfig, AgentStatus};
use crate::clog_trace;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    TaskRequest,
    TaskResult,
    StatusUpdate,
    ErrorReport,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::TaskRequest => "task_request",
            MessageKind::TaskResult => "task_result",
            MessageKind::StatusUpdate => "status_update",
            MessageKind::ErrorReport => "error_report",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusMessage {
    pub id: Uuid,
    pub from: String,
    pub to: String,
    pub kind: MessageKind,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl BusMessage {
    pub fn new(from: &str, to: &str, kind: MessageKind, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            from: from.to_string(),
            to: to.to_string(),
            kind,
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// Registration record for a bus participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: String,
    pub name: String,
    pub role: String,
    pub status: AgentStatus,
}

impl From<AgentConfig> for AgentInfo {
    fn from(config: AgentConfig) -> Self {
        Self {
            id: config.id,
            name: config.name,
            role: config.role,
            status: AgentStatus::Idle,
        }
    }
}

pub type MessageHandler = Arc<dyn Fn(&BusMessage) + Send + Sync>;

#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn register_agent(&self, info: AgentInfo) -> Result<()>;

    /// Install a handler for messages addressed to `agent_id`.
    async fn on_message(&self, agent_id: &str, handler: MessageHandler) -> Result<()>;

    async fn sessions_send(
        &self,
        from: &str,
        to: &str,
        payload: Value,
        kind: MessageKind,
    ) -> Result<()>;

    async fn update_agent_info(&self, agent_id: &str, status: AgentStatus) -> Result<()>;
}

/// Messages an [`InMemoryBus`] keeps for inspection by default.
pub const DEFAULT_HISTORY_LIMIT: usize = 256;

/// Process-local bus that delivers synchronously to registered handlers.
///
/// Keeps the most recent messages (up to its history limit) so hosts and
/// tests can inspect traffic.
pub struct InMemoryBus {
    agents: RwLock<HashMap<String, AgentInfo>>,
    handlers: RwLock<HashMap<String, Vec<MessageHandler>>>,
    history: RwLock<VecDeque<BusMessage>>,
    history_limit: usize,
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
            handlers: RwLock::new(HashMap::new()),
            history: RwLock::new(VecDeque::new()),
            history_limit,
        }
    }

    pub async fn agent(&self, agent_id: &str) -> Option<AgentInfo> {
        self.agents.read().await.get(agent_id).cloned()
    }

    /// Retained messages, oldest first.
    pub async fn history(&self) -> Vec<BusMessage> {
        self.history.read().await.iter().cloned().collect()
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn register_agent(&self, info: AgentInfo) -> Result<()> {
        self.agents.write().await.insert(info.id.clone(), info);
        Ok(())
    }

    async fn on_message(&self, agent_id: &str, handler: MessageHandler) -> Result<()> {
        self.handlers
            .write()
            .await
            .entry(agent_id.to_string())
            .or_default()
            .push(handler);
        Ok(())
    }

    async fn sessions_send(
        &self,
        from: &str,
        to: &str,
        payload: Value,
        kind: MessageKind,
    ) -> Result<()> {
        let message = BusMessage::new(from, to, kind, payload);
        clog_trace!("bus {} -> {} [{}]", from, to, kind.as_str());

        let handlers = self.handlers.read().await.get(to).cloned().unwrap_or_default();
        for handler in &handlers {
            handler(&message);
        }
        let mut history = self.history.write().await;
        history.push_back(message);
        while history.len() > self.history_limit {
            history.pop_front();
        }
        Ok(())
    }

    async fn update_agent_info(&self, agent_id: &str, status: AgentStatus) -> Result<()> {
        if let Some(info) = self.agents.write().await.get_mut(agent_id) {
            info.status = status;
        }
        Ok(())
    }
}
