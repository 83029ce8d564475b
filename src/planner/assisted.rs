//! LLM-assisted planning with deterministic fallback.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt::Write as _;

use super::{inputs, intent, TaskPlanner};
use crate::core::{AgentTask, TaskDependency, TaskPlan, TaskType};
use crate::error::Result;
use crate::llm::{extract_json_array, LlmClient};
use crate::state::ProjectState;
use crate::{clog, clog_debug, clog_trace, clog_warn};

/// One task as the model describes it.
#[derive(Debug, Deserialize)]
struct ProposedTask {
    #[serde(rename = "type")]
    task_type: String,
    #[serde(default)]
    agent: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, alias = "dependsOn")]
    depends_on: Vec<usize>,
    #[serde(default)]
    input: Map<String, Value>,
}

impl TaskPlanner {
    /// Ask the model for a plan, falling back to [`TaskPlanner::create_plan`]
    /// when the model is disabled, unreachable, or returns nothing usable.
    pub async fn create_plan_with_llm(
        &self,
        request: &str,
        state: &ProjectState,
        llm: &dyn LlmClient,
    ) -> Result<TaskPlan> {
        if !self.settings.use_llm {
            return self.create_plan(request, state);
        }

        let prompt = build_prompt(request, state);
        clog_trace!("Planner prompt:\n{}", prompt);

        let response = match llm.send(&prompt).await {
            Ok(response) => response,
            Err(e) => {
                clog_warn!("LLM planning failed, using keyword planner: {}", e);
                return self.create_plan(request, state);
            }
        };
        clog_trace!("Planner response:\n{}", response);

        match self.plan_from_response(request, state, &response) {
            Ok(Some(plan)) => {
                clog!("Using LLM plan with {} task(s)", plan.tasks.len());
                Ok(plan)
            }
            Ok(None) => {
                clog_warn!("LLM returned no usable tasks, using keyword planner");
                self.create_plan(request, state)
            }
            Err(e) => {
                clog_warn!("LLM plan rejected ({}), using keyword planner", e);
                self.create_plan(request, state)
            }
        }
    }

    fn plan_from_response(
        &self,
        request: &str,
        state: &ProjectState,
        response: &str,
    ) -> Result<Option<TaskPlan>> {
        let Some(items) = extract_json_array(response) else {
            return Ok(None);
        };

        let proposed: Vec<ProposedTask> = match items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<_, _>>()
        {
            Ok(proposed) => proposed,
            Err(e) => {
                clog_debug!("Malformed task in LLM plan: {}", e);
                return Ok(None);
            }
        };
        if proposed.is_empty() {
            return Ok(None);
        }

        let normalized = intent::normalize(request);
        let mut tasks: Vec<AgentTask> = proposed
            .iter()
            .map(|p| {
                let task_type = p.task_type.parse().unwrap_or(TaskType::Custom);
                let mut input = inputs::extract_inputs(task_type, request, &normalized, state);
                input.extend(p.input.clone());

                let description = p
                    .description
                    .as_deref()
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or(request);
                let mut task = AgentTask::new(task_type, description);
                if let Some(agent) = p.agent.as_deref().filter(|a| !a.is_empty()) {
                    task.assigned_agent = agent.to_string();
                }
                task.input = input;
                task
            })
            .collect();

        // Indices refer to positions in the model's list.
        let mut dependencies = Vec::new();
        for (index, p) in proposed.iter().enumerate() {
            for &dep in &p.depends_on {
                if dep == index || dep >= tasks.len() {
                    clog_debug!("Ignoring dependency index {} on task {}", dep, index);
                    continue;
                }
                let (task_id, depends_on) = (tasks[index].id, tasks[dep].id);
                if tasks[index].dependencies.insert(depends_on) {
                    dependencies.push(TaskDependency::new(task_id, depends_on));
                }
            }
        }

        self.assemble(request, tasks, dependencies).map(Some)
    }
}

fn build_prompt(request: &str, state: &ProjectState) -> String {
    let mut prompt = String::from(
        "You are planning work for a team of game-development agents working on a Godot project.\n\
         Break the request into tasks using only these task types:\n",
    );
    for task_type in TaskType::ALL {
        let _ = writeln!(
            prompt,
            "- {} (agent: {}): {}",
            task_type.as_str(),
            task_type.default_agent(),
            task_type.summary()
        );
    }

    prompt.push_str("\nCurrent project state:\n");
    let list = |items: Vec<&String>| {
        if items.is_empty() {
            "none".to_string()
        } else {
            items
                .into_iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        }
    };
    let _ = writeln!(prompt, "- Scenes: {}", list(state.scenes.keys().collect()));
    let _ = writeln!(prompt, "- Assets: {}", list(state.assets.keys().collect()));
    let _ = writeln!(prompt, "- Open scenes: {}", list(state.open_scenes.iter().collect()));

    let _ = write!(
        prompt,
        "\nRequest: {}\n\n\
         Respond with a JSON array only. Each element is an object:\n\
         {{\"type\": \"<task type>\", \"agent\": \"<agent id>\", \"description\": \"<what to do>\", \"depends_on\": [<indices of earlier tasks>]}}\n",
        request
    );
    prompt
}
