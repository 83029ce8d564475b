//! Task planner: turns a request into tasks, dependency edges, and
//! parallel execution groups.
//!
//! The deterministic path detects task types by keyword, extracts each
//! task's inputs from the request, wires dependencies from a fixed
//! precedence table, and levels the result with [`TaskDAG`]. The
//! LLM-assisted path (see `assisted`) asks a model for the task list and
//! falls back to the deterministic path on anything it cannot use.

mod assisted;
pub mod inputs;
pub mod intent;

use serde_json::{Map, Value};

use crate::config::{CyclePolicy, PlannerSettings};
use crate::core::{AgentTask, TaskDAG, TaskDependency, TaskId, TaskPlan, TaskType};
use crate::error::{Error, Result};
use crate::state::ProjectState;
use crate::{clog, clog_debug, clog_error};

/// Builds task plans for incoming requests.
#[derive(Debug, Clone, Default)]
pub struct TaskPlanner {
    settings: PlannerSettings,
}

impl TaskPlanner {
    pub fn new(settings: PlannerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PlannerSettings {
        &self.settings
    }

    /// Task types the request asks for, in plan order.
    pub fn detect_task_types(&self, request: &str) -> Vec<TaskType> {
        intent::detect_task_types(&intent::normalize(request))
    }

    /// Build a plan without consulting a model.
    ///
    /// The same request against the same project state always yields the
    /// same task types and group structure.
    ///
    /// # Errors
    /// `Error::CyclicDependency` under `CyclePolicy::Reject` when leveling
    /// cannot schedule every task.
    pub fn create_plan(&self, request: &str, state: &ProjectState) -> Result<TaskPlan> {
        let normalized = intent::normalize(request);
        let types = intent::detect_task_types(&normalized);
        clog_debug!("Detected task types: {:?}", types);

        let mut tasks: Vec<AgentTask> = types
            .into_iter()
            .map(|task_type| {
                let input = inputs::extract_inputs(task_type, request, &normalized, state);
                let mut task = AgentTask::new(task_type, &describe(task_type, &input, request));
                task.input = input;
                task
            })
            .collect();

        let dependencies = self.build_dependencies(&mut tasks);
        self.assemble(request, tasks, dependencies)
    }

    /// Wire dependencies from the fixed precedence table.
    ///
    /// Fills each task's `dependencies` set and returns the same edges as a
    /// list, ordered by dependent task and then by prerequisite.
    pub fn build_dependencies(&self, tasks: &mut [AgentTask]) -> Vec<TaskDependency> {
        let scenes = ids_where(tasks, |t| t == TaskType::CreateScene);
        let scripts = ids_where(tasks, |t| t == TaskType::CreateScript);
        let assets = ids_where(tasks, |t| t.is_asset_generation());
        let all: Vec<TaskId> = tasks.iter().map(|t| t.id).collect();

        let mut edges = Vec::new();
        for task in tasks.iter_mut() {
            let prerequisites: Vec<TaskId> = match task.task_type {
                TaskType::AddNode => scenes.clone(),
                TaskType::AttachScript => scenes.iter().chain(&scripts).copied().collect(),
                TaskType::IntegrateAsset => scenes.iter().chain(&assets).copied().collect(),
                TaskType::ValidateProject => all.clone(),
                _ => Vec::new(),
            };

            for prerequisite in prerequisites {
                if prerequisite == task.id || !task.dependencies.insert(prerequisite) {
                    continue;
                }
                edges.push(TaskDependency::new(task.id, prerequisite));
            }
        }
        edges
    }

    /// Level tasks into groups that may run concurrently.
    ///
    /// A cycle stops leveling: the groups found so far are returned and the
    /// leftover tasks are logged, unless the planner rejects cycles.
    pub fn identify_parallel_groups(
        &self,
        tasks: &[AgentTask],
        dependencies: &[TaskDependency],
    ) -> Result<Vec<Vec<TaskId>>> {
        let dag = TaskDAG::from_parts(tasks, dependencies);
        let leveling = dag.levels();

        if !leveling.is_complete() {
            let cycle = dag.cycle_members();
            clog_error!(
                "Cyclic dependency: {} of {} task(s) could not be scheduled, {} on a cycle ({}), {} blocked behind it",
                leveling.unscheduled.len(),
                tasks.len(),
                cycle.len(),
                cycle.iter().map(|id| id.short()).collect::<Vec<_>>().join(", "),
                leveling.unscheduled.len() - cycle.len()
            );
            if self.settings.cycle_policy == CyclePolicy::Reject {
                return Err(Error::CyclicDependency {
                    cycle,
                    unscheduled: leveling.unscheduled,
                });
            }
        }

        Ok(leveling.groups)
    }

    fn assemble(
        &self,
        request: &str,
        tasks: Vec<AgentTask>,
        dependencies: Vec<TaskDependency>,
    ) -> Result<TaskPlan> {
        let parallel_groups = self.identify_parallel_groups(&tasks, &dependencies)?;

        let mut plan = TaskPlan::new(request);
        plan.tasks = tasks;
        plan.dependencies = dependencies;
        plan.parallel_groups = parallel_groups;

        clog!(
            "Plan {} created: {} task(s) in {} group(s)",
            plan.id.short(),
            plan.tasks.len(),
            plan.parallel_groups.len()
        );
        Ok(plan)
    }
}

fn ids_where(tasks: &[AgentTask], pred: impl Fn(TaskType) -> bool) -> Vec<TaskId> {
    tasks
        .iter()
        .filter(|t| pred(t.task_type))
        .map(|t| t.id)
        .collect()
}

fn input_text<'a>(input: &'a Map<String, Value>, key: &str) -> &'a str {
    input.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Human-readable description of a planned task.
fn describe(task_type: TaskType, input: &Map<String, Value>, request: &str) -> String {
    match task_type {
        TaskType::CreateScene => format!(
            "Create scene {} with a {} root",
            input_text(input, "scenePath"),
            input_text(input, "rootType")
        ),
        TaskType::CreateScript => format!("Write script {}", input_text(input, "scriptPath")),
        TaskType::AttachScript => format!(
            "Attach {} to {}",
            input_text(input, "scriptPath"),
            input_text(input, "nodePath")
        ),
        TaskType::GenerateCharacter => {
            let animations: Vec<&str> = input
                .get("animations")
                .and_then(Value::as_array)
                .map(|a| a.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            format!(
                "Generate character sprite with {} animation(s)",
                animations.join(", ")
            )
        }
        TaskType::GenerateTileset => format!(
            "Generate {} tileset with {}px tiles",
            input_text(input, "preset"),
            input.get("tileSize").and_then(Value::as_u64).unwrap_or_default()
        ),
        TaskType::AddNode => format!(
            "Add {} '{}' under {}",
            input_text(input, "nodeType"),
            input_text(input, "nodeName"),
            input_text(input, "parentPath")
        ),
        TaskType::IntegrateAsset => format!(
            "Integrate generated assets into {}",
            input_text(input, "scenePath")
        ),
        TaskType::ValidateProject => "Run and validate the project".to_string(),
        TaskType::Custom => request.trim().to_string(),
    }
}
