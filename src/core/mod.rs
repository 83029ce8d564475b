//! Core domain models for conductor.
//!
//! Tasks, plans, agent results, and the dependency DAG that levels a plan
//! into groups of concurrently runnable tasks.

pub mod dag;
pub mod plan;
pub mod result;
pub mod task;

pub use dag::{Leveling, TaskDAG};
pub use plan::{CheckpointId, PlanId, PlanProjection, PlanStatus, ProjectedTask, TaskPlan};
pub use result::{AgentError, AgentResult, ErrorCode};
pub use task::{AgentTask, TaskDependency, TaskId, TaskType};
