//! Task data model for the execution plan.
//!
//! Tasks are the atomic units of work handed to agents. Each task carries
//! its type, the worker it is assigned to, the tasks it depends on, and an
//! opaque input payload extracted from the request.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Unique identifier for a task within a plan.
///
/// Uses UUID v4 for generation and provides a short form display
/// for human-readable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Create a new unique task identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The fixed vocabulary of work a plan can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    CreateScene,
    CreateScript,
    AttachScript,
    GenerateCharacter,
    GenerateTileset,
    AddNode,
    IntegrateAsset,
    ValidateProject,
    Custom,
}

impl TaskType {
    /// Every task type, in detection order.
    pub const ALL: [TaskType; 9] = [
        TaskType::CreateScene,
        TaskType::CreateScript,
        TaskType::AttachScript,
        TaskType::GenerateCharacter,
        TaskType::GenerateTileset,
        TaskType::AddNode,
        TaskType::IntegrateAsset,
        TaskType::ValidateProject,
        TaskType::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::CreateScene => "create_scene",
            TaskType::CreateScript => "create_script",
            TaskType::AttachScript => "attach_script",
            TaskType::GenerateCharacter => "generate_character",
            TaskType::GenerateTileset => "generate_tileset",
            TaskType::AddNode => "add_node",
            TaskType::IntegrateAsset => "integrate_asset",
            TaskType::ValidateProject => "validate_project",
            TaskType::Custom => "custom",
        }
    }

    /// Worker id that handles this type unless a plan says otherwise.
    pub fn default_agent(&self) -> &'static str {
        match self {
            TaskType::CreateScene | TaskType::AddNode => "scene_agent",
            TaskType::CreateScript | TaskType::AttachScript => "script_agent",
            TaskType::GenerateCharacter => "character_agent",
            TaskType::GenerateTileset => "tileset_agent",
            TaskType::IntegrateAsset => "integration_agent",
            TaskType::ValidateProject => "validation_agent",
            TaskType::Custom => "general_agent",
        }
    }

    /// Tie-break priority inside a parallel group. Higher runs earlier.
    pub fn default_priority(&self) -> i32 {
        match self {
            TaskType::CreateScene => 10,
            TaskType::CreateScript => 8,
            TaskType::GenerateCharacter | TaskType::GenerateTileset => 7,
            TaskType::AddNode => 6,
            TaskType::AttachScript | TaskType::Custom => 5,
            TaskType::IntegrateAsset => 3,
            TaskType::ValidateProject => 1,
        }
    }

    /// One-line summary used when describing the vocabulary to an LLM.
    pub fn summary(&self) -> &'static str {
        match self {
            TaskType::CreateScene => "create a new scene file with a root node",
            TaskType::CreateScript => "write or fix a GDScript file",
            TaskType::AttachScript => "attach an existing script to a node",
            TaskType::GenerateCharacter => "generate a character sprite with animations",
            TaskType::GenerateTileset => "generate a tileset for level building",
            TaskType::AddNode => "add a node to a scene",
            TaskType::IntegrateAsset => "place generated assets into a scene",
            TaskType::ValidateProject => "run and validate the project",
            TaskType::Custom => "anything that fits no other type",
        }
    }

    /// Tasks that produce new art assets.
    pub fn is_asset_generation(&self) -> bool {
        matches!(self, TaskType::GenerateCharacter | TaskType::GenerateTileset)
    }

    /// Tasks that only touch scripts.
    pub fn is_script(&self) -> bool {
        matches!(self, TaskType::CreateScript | TaskType::AttachScript)
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    /// Accepts snake_case, kebab-case, and any letter case.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(&['-', ' '][..], "_");
        TaskType::ALL
            .iter()
            .find(|t| t.as_str() == normalized)
            .copied()
            .ok_or_else(|| format!("unknown task type: {}", s))
    }
}

/// A single unit of work assigned to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentTask {
    /// Unique identifier for this task within its plan.
    pub id: TaskId,
    /// What kind of work this is.
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Human-readable description of the work.
    pub description: String,
    /// Id of the worker that executes this task.
    pub assigned_agent: String,
    /// Tasks that must finish before this one starts.
    #[serde(default)]
    pub dependencies: BTreeSet<TaskId>,
    /// Tie-break only; never overrides dependency order.
    #[serde(default)]
    pub priority: i32,
    /// Opaque payload for the worker.
    #[serde(default)]
    pub input: Map<String, Value>,
}

impl AgentTask {
    /// Create a task with the type's default agent and priority.
    pub fn new(task_type: TaskType, description: &str) -> Self {
        Self {
            id: TaskId::new(),
            task_type,
            description: description.to_string(),
            assigned_agent: task_type.default_agent().to_string(),
            dependencies: BTreeSet::new(),
            priority: task_type.default_priority(),
            input: Map::new(),
        }
    }

    pub fn with_agent(mut self, agent: &str) -> Self {
        self.assigned_agent = agent.to_string();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_input(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.input.insert(key.to_string(), value.into());
        self
    }

    /// Look up a string field of the input payload.
    pub fn input_str(&self, key: &str) -> Option<&str> {
        self.input.get(key).and_then(Value::as_str)
    }

    /// Check whether this task waits on `id`.
    pub fn depends_on(&self, id: &TaskId) -> bool {
        self.dependencies.contains(id)
    }
}

/// A directed edge: `task_id` cannot start before `depends_on` finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDependency {
    pub task_id: TaskId,
    pub depends_on: TaskId,
}

impl TaskDependency {
    pub fn new(task_id: TaskId, depends_on: TaskId) -> Self {
        Self {
            task_id,
            depends_on,
        }
    }
}
