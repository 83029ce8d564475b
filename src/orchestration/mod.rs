//! Orchestration layer for conductor.
//!
//! This module turns a user request into a leveled plan and drives it
//! through the agent pool, tracking the orchestrator's lifecycle with a
//! validated state machine.

mod classify;
mod events;
mod orchestrator;
mod phase;
mod pool;

pub use classify::is_conversational_query;
pub use events::{OrchestratorEvent, PlanObserver, TaskProgress};
pub use orchestrator::{Orchestrator, Services};
pub use phase::{OrchestratorState, PhaseTracker};
pub use pool::AgentPool;
