use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(
        "Cyclic dependency: {} task(s) could not be scheduled ({} on a cycle)",
        unscheduled.len(),
        cycle.len()
    )]
    CyclicDependency {
        /// Tasks that sit on a cycle.
        cycle: Vec<crate::core::TaskId>,
        /// Every task leveling could not place, cycle members included.
        unscheduled: Vec<crate::core::TaskId>,
    },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Orchestrator busy: a request is already {0}")]
    Busy(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Tool bridge error: {0}")]
    Bridge(String),

    #[error("Message bus error: {0}")]
    Bus(String),

    #[error("State store error: {0}")]
    StateStore(String),
}

pub type Result<T> = std::result::Result<T, Error>;
