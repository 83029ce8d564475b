//! The orchestrator: turns one user request into a plan, runs the plan's
//! groups through the agent pool, and reports a single result.
//!
//! Requests that ask for information instead of changes take a short
//! conversational branch and never touch the planner.

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, RwLock};

use super::classify::is_conversational_query;
use super::events::{OrchestratorEvent, PlanObserver, TaskProgress};
use super::phase::{OrchestratorState, PhaseTracker};
use super::pool::AgentPool;
use crate::agent::{Agent, AgentConfig, AgentStatus};
use crate::bridge::{ProgressMirror, StepStatus, ToolBridge};
use crate::bus::{AgentInfo, BusMessage, MessageBus, MessageKind};
use crate::config::{Config, OrchestratorSettings, VerifyPolicy};
use crate::core::{
    AgentError, AgentResult, AgentTask, CheckpointId, ErrorCode, PlanId, PlanStatus, TaskId,
    TaskPlan, TaskType,
};
use crate::llm::LlmClient;
use crate::planner::TaskPlanner;
use crate::state::StateStore;
use crate::{clog, clog_debug, clog_error, clog_trace, clog_warn, Error, Result};

/// Collaborators the orchestrator talks to. All of them are shared.
#[derive(Clone)]
pub struct Services {
    pub pool: Arc<AgentPool>,
    pub store: Arc<dyn StateStore>,
    pub bus: Arc<dyn MessageBus>,
    pub bridge: Arc<dyn ToolBridge>,
    pub llm: Arc<dyn LlmClient>,
}

/// Coordinates planning and delegation for one request at a time.
///
/// # Example
///
/// ```ignore
/// let orchestrator = Orchestrator::new(&Config::default(), services)
///     .with_events(tx);
/// orchestrator.subscribe().await?;
/// let result = orchestrator.execute_request("create a platformer game").await;
/// ```
pub struct Orchestrator {
    planner: TaskPlanner,
    settings: OrchestratorSettings,
    pool: Arc<AgentPool>,
    store: Arc<dyn StateStore>,
    bus: Arc<dyn MessageBus>,
    bridge: Arc<dyn ToolBridge>,
    llm: Arc<dyn LlmClient>,
    mirror: ProgressMirror,
    phase: RwLock<PhaseTracker>,
    observer: Option<Arc<dyn PlanObserver>>,
    events: Option<mpsc::Sender<OrchestratorEvent>>,
}

impl Orchestrator {
    pub fn new(config: &Config, services: Services) -> Self {
        let mirror = ProgressMirror::new(
            services.bridge.clone(),
            config.orchestrator.mirror_progress,
        );
        Self {
            planner: TaskPlanner::new(config.planner.clone()),
            settings: config.orchestrator.clone(),
            pool: services.pool,
            store: services.store,
            bus: services.bus,
            bridge: services.bridge,
            llm: services.llm,
            mirror,
            phase: RwLock::new(PhaseTracker::new()),
            observer: None,
            events: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PlanObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Send lifecycle and per-task events to `tx`. Delivery is best-effort.
    pub fn with_events(mut self, tx: mpsc::Sender<OrchestratorEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn id(&self) -> &str {
        &self.settings.author_id
    }

    pub fn pool(&self) -> &Arc<AgentPool> {
        &self.pool
    }

    pub fn planner(&self) -> &TaskPlanner {
        &self.planner
    }

    pub async fn state(&self) -> OrchestratorState {
        self.phase.read().await.current()
    }

    /// Register the orchestrator and every pooled worker on the bus, then
    /// listen for messages addressed to the orchestrator.
    pub async fn subscribe(&self) -> Result<()> {
        self.bus.register_agent(self.config().into()).await?;
        for config in self.pool.configs() {
            self.bus.register_agent(AgentInfo::from(config)).await?;
        }

        let events = self.events.clone();
        self.bus
            .on_message(
                self.id(),
                Arc::new(move |message: &BusMessage| route_inbound(message, events.as_ref())),
            )
            .await?;
        clog_debug!("Orchestrator '{}' subscribed to the bus", self.id());
        Ok(())
    }

    /// Route one inbound worker message.
    pub fn handle_message(&self, message: &BusMessage) {
        route_inbound(message, self.events.as_ref());
    }

    /// Convenience wrapper that runs a bare request string.
    pub async fn execute_request(&self, request: &str) -> AgentResult {
        let task = AgentTask::new(TaskType::Custom, request)
            .with_agent(self.id())
            .with_input("userRequest", request);
        self.run(&task).await
    }

    /// Run one request end to end. Never returns `Err`: unexpected errors
    /// become an `EXECUTION_FAILED` result.
    ///
    /// One request runs at a time. A request arriving while another is in
    /// flight is refused with a recoverable `EXECUTION_FAILED` result and the
    /// running request is left untouched.
    pub async fn run(&self, task: &AgentTask) -> AgentResult {
        let started = Instant::now();
        let request = task
            .input_str("userRequest")
            .unwrap_or(&task.description)
            .to_string();
        clog!("Request received: {}", request);

        if let Err(e) = self.begin(&[OrchestratorState::Analyzing]).await {
            clog_warn!("Request refused: {}", e);
            return AgentResult::failure(
                task.id,
                self.id(),
                AgentError::new(ErrorCode::ExecutionFailed, e.to_string()).with_recoverable(true),
            );
        }

        match self.process(task, &request).await {
            Ok(result) => result,
            Err(e) => {
                clog_error!("Request failed: {}", e);
                self.fail().await;
                AgentResult::failure(
                    task.id,
                    self.id(),
                    AgentError::new(ErrorCode::ExecutionFailed, e.to_string())
                        .with_recoverable(true),
                )
                .with_execution_time(elapsed_ms(started))
            }
        }
    }

    async fn process(&self, task: &AgentTask, request: &str) -> Result<AgentResult> {
        if is_conversational_query(request) {
            return self.handle_question(task, request).await;
        }

        let started = Instant::now();
        self.transition(OrchestratorState::Planning).await?;
        let state = self.store.get_state().await?;
        let mut plan = self
            .planner
            .create_plan_with_llm(request, &state, self.llm.as_ref())
            .await?;

        let checkpoint = self
            .store
            .create_checkpoint(&format!("Before: {}", request), &self.settings.author_id)
            .await?;
        clog_debug!("Checkpoint {} created for plan {}", checkpoint, plan.id.short());
        plan.checkpoint_id = Some(checkpoint);
        self.store.set_current_plan(plan.clone()).await?;

        let projection = plan.projection();
        if let Some(observer) = &self.observer {
            observer.on_plan_created(&projection);
        }
        self.emit(OrchestratorEvent::PlanCreated(projection));
        self.mirror.publish_plan(&plan).await;

        let result = self.run_groups(&plan).await?;
        if !result.success {
            self.fail().await;
            return Ok(result);
        }

        self.transition(OrchestratorState::Verifying).await?;
        if !self.verify_result(&plan, &result) {
            match self.settings.verify_policy {
                VerifyPolicy::Log => {
                    clog_warn!("Plan {} did not complete every task", plan.id.short());
                }
                VerifyPolicy::Strict => {
                    clog_error!("Plan {} failed verification", plan.id.short());
                    self.set_plan_status(plan.id, PlanStatus::Failed).await;
                    self.fail().await;
                    return Ok(AgentResult::failure(
                        task.id,
                        self.id(),
                        AgentError::new(
                            ErrorCode::VerificationFailed,
                            format!("{} task(s) never completed", plan.unscheduled().len()),
                        ),
                    )
                    .with_execution_time(elapsed_ms(started)));
                }
            }
        }

        self.transition(OrchestratorState::Complete).await?;
        clog!("Plan {} complete", plan.id.short());
        Ok(AgentResult {
            task_id: task.id,
            execution_time: elapsed_ms(started),
            ..result
        })
    }

    /// Run the plan's groups in order. Tasks within a group run concurrently;
    /// the first failing task (in group order) stops the plan and its result
    /// is returned unchanged.
    ///
    /// The plan is adopted by walking the lifecycle through analyzing and
    /// planning first, and the orchestrator is left resting afterwards:
    /// complete on success (after a logged verification), error otherwise.
    ///
    /// # Errors
    /// `Error::Busy` if another request is in flight. A transition error
    /// mid-plan marks the plan failed.
    pub async fn execute_plan(&self, plan: &TaskPlan) -> Result<AgentResult> {
        self.begin(&[OrchestratorState::Analyzing, OrchestratorState::Planning])
            .await?;
        let outcome = self.run_groups(plan).await;
        match &outcome {
            Ok(result) if result.success => {
                self.transition(OrchestratorState::Verifying).await?;
                if !self.verify_result(plan, result) {
                    clog_warn!("Plan {} did not complete every task", plan.id.short());
                }
                self.transition(OrchestratorState::Complete).await?;
            }
            _ => self.fail().await,
        }
        outcome
    }

    async fn run_groups(&self, plan: &TaskPlan) -> Result<AgentResult> {
        let outcome = self.dispatch_plan(plan).await;
        if outcome.is_err() {
            self.set_plan_status(plan.id, PlanStatus::Failed).await;
        }
        outcome
    }

    async fn dispatch_plan(&self, plan: &TaskPlan) -> Result<AgentResult> {
        self.set_plan_status(plan.id, PlanStatus::Executing).await;

        let total = plan.parallel_groups.len();
        let mut completed: Vec<TaskId> = Vec::new();
        let mut artifacts: Vec<String> = Vec::new();
        let mut tokens_used = 0;

        for (index, group) in plan.parallel_groups.iter().enumerate() {
            self.transition(OrchestratorState::Delegating).await?;
            let tasks = plan.resolve_group(group);
            clog!(
                "Dispatching group {}/{} of plan {}: {} task(s)",
                index + 1,
                total,
                plan.id.short(),
                tasks.len()
            );

            self.transition(OrchestratorState::Monitoring).await?;
            let mut results = self.dispatch_group(&tasks, Some(plan)).await;

            if let Some(position) = results.iter().position(|r| !r.success) {
                let failed = results.swap_remove(position);
                clog_error!(
                    "Task {} failed in group {}: {}",
                    failed.task_id.short(),
                    index + 1,
                    failed
                        .error
                        .as_ref()
                        .map(|e| e.message.as_str())
                        .unwrap_or("unknown error")
                );
                self.set_plan_status(plan.id, PlanStatus::Failed).await;
                return Ok(failed);
            }

            for result in results {
                completed.push(result.task_id);
                artifacts.extend(result.artifacts);
                tokens_used += result.tokens_used;
            }
        }

        self.transition(OrchestratorState::Integrating).await?;
        self.set_plan_status(plan.id, PlanStatus::Completed).await;

        Ok(AgentResult::success(
            TaskId(plan.id.0),
            self.id(),
            json!({ "planId": plan.id, "completedTasks": completed }),
        )
        .with_artifacts(artifacts)
        .with_tokens(tokens_used))
    }

    /// Run `tasks` concurrently and return one result per task, in input order.
    pub async fn execute_parallel_tasks(&self, tasks: &[AgentTask]) -> Vec<AgentResult> {
        self.dispatch_group(tasks, None).await
    }

    async fn dispatch_group(&self, tasks: &[AgentTask], plan: Option<&TaskPlan>) -> Vec<AgentResult> {
        let runs = tasks.iter().map(|task| {
            let step = plan.and_then(|p| p.task_index(&task.id));
            self.execute_task(task, step)
        });
        join_all(runs).await
    }

    async fn execute_task(&self, task: &AgentTask, step: Option<usize>) -> AgentResult {
        let agent_id = task.assigned_agent.as_str();
        let Some(agent) = self.pool.get(agent_id) else {
            clog_warn!("No agent registered as '{}' for task {}", agent_id, task.id.short());
            if let Some(step) = step {
                self.mirror.update_step(step, StepStatus::Failed).await;
            }
            return AgentResult::failure(
                task.id,
                agent_id,
                AgentError::new(
                    ErrorCode::NoAgent,
                    format!("No agent registered with id '{}'", agent_id),
                ),
            );
        };

        self.emit(OrchestratorEvent::AgentStatus {
            agent_id: agent_id.to_string(),
            task_id: task.id,
            progress: TaskProgress::Working,
        });
        let request = json!({ "taskId": task.id, "task": task });
        if let Err(e) = self
            .bus
            .sessions_send(self.id(), agent_id, request, MessageKind::TaskRequest)
            .await
        {
            clog_warn!("Failed to notify '{}' of task {}: {}", agent_id, task.id.short(), e);
        }
        self.set_agent_status(agent_id, AgentStatus::Working { task_id: task.id })
            .await;
        if let Some(step) = step {
            self.mirror.update_step(step, StepStatus::InProgress).await;
        }

        clog_debug!("Agent '{}' started task {}", agent_id, task.id.short());
        let started = Instant::now();
        let mut result = match agent.execute(task).await {
            Ok(result) => result,
            Err(e) => AgentResult::failure(
                task.id,
                agent_id,
                AgentError::new(ErrorCode::AgentFailed, e.to_string()),
            ),
        };
        if result.execution_time == 0 {
            result.execution_time = elapsed_ms(started);
        }

        let (progress, step_status, agent_status) = if result.success {
            (TaskProgress::Completed, StepStatus::Completed, AgentStatus::Idle)
        } else {
            (TaskProgress::Failed, StepStatus::Failed, AgentStatus::Error)
        };
        if let Some(step) = step {
            self.mirror.update_step(step, step_status).await;
        }
        self.emit(OrchestratorEvent::AgentStatus {
            agent_id: agent_id.to_string(),
            task_id: task.id,
            progress,
        });
        self.set_agent_status(agent_id, agent_status).await;
        clog_debug!(
            "Agent '{}' finished task {} in {}ms (success: {})",
            agent_id,
            task.id.short(),
            result.execution_time,
            result.success
        );
        result
    }

    /// Answer an informational request from project context.
    pub async fn handle_question(&self, task: &AgentTask, question: &str) -> Result<AgentResult> {
        self.transition(OrchestratorState::Responding).await?;
        let started = Instant::now();

        let context = self.gather_context().await;
        let prompt = format!(
            "You are assisting with a Godot game project.\n\
             Answer the user's question using the project context below.\n\n\
             Project context:\n{}\n\nQuestion: {}",
            serde_json::to_string_pretty(&context).unwrap_or_default(),
            question
        );
        clog_trace!("Question prompt:\n{}", prompt);

        match self.llm.send(&prompt).await {
            Ok(response) => {
                self.transition(OrchestratorState::Complete).await?;
                Ok(AgentResult::success(
                    task.id,
                    self.id(),
                    json!({
                        "type": "conversational_response",
                        "response": response,
                        "question": question,
                    }),
                )
                .with_execution_time(elapsed_ms(started)))
            }
            Err(e) => {
                clog_error!("Failed to answer question: {}", e);
                self.fail().await;
                Ok(AgentResult::failure(
                    task.id,
                    self.id(),
                    AgentError::new(ErrorCode::QuestionHandlingFailed, e.to_string()),
                )
                .with_execution_time(elapsed_ms(started)))
            }
        }
    }

    /// Best-effort snapshot of the editor and the store. Missing pieces are
    /// left null.
    async fn gather_context(&self) -> Value {
        let scene_tree = self
            .bridge
            .execute_tool("get_scene_tree", json!({ "max_depth": 5 }))
            .await
            .unwrap_or_else(|e| {
                clog_debug!("Scene tree unavailable: {}", e);
                Value::Null
            });
        let files = self
            .bridge
            .execute_tool("list_files", json!({ "path": "res://", "recursive": true }))
            .await
            .unwrap_or_else(|e| {
                clog_debug!("File listing unavailable: {}", e);
                Value::Null
            });
        let project = match self.store.get_state().await {
            Ok(state) => serde_json::to_value(state).unwrap_or(Value::Null),
            Err(e) => {
                clog_debug!("Project state unavailable: {}", e);
                Value::Null
            }
        };
        let current_plan = match self.store.get_current_plan().await {
            Ok(Some(plan)) => json!({
                "id": plan.id,
                "request": plan.user_request,
                "status": plan.status,
                "tasks": plan.tasks.len(),
            }),
            _ => Value::Null,
        };

        json!({
            "sceneTree": scene_tree,
            "files": files,
            "project": project,
            "currentPlan": current_plan,
        })
    }

    /// Whether every task in `plan` shows up in the result's completed list.
    pub fn verify_result(&self, plan: &TaskPlan, result: &AgentResult) -> bool {
        if !result.success {
            return false;
        }
        let completed: HashSet<TaskId> = result
            .output
            .get("completedTasks")
            .and_then(|v| serde_json::from_value::<Vec<TaskId>>(v.clone()).ok())
            .unwrap_or_default()
            .into_iter()
            .collect();
        plan.tasks.iter().all(|t| completed.contains(&t.id))
    }

    /// Restore a checkpoint. With no id, the current plan's checkpoint is
    /// used; returns `false` when there is nothing to roll back to.
    pub async fn rollback(&self, checkpoint: Option<CheckpointId>) -> Result<bool> {
        let id = match checkpoint {
            Some(id) => id,
            None => match self
                .store
                .get_current_plan()
                .await?
                .and_then(|plan| plan.checkpoint_id)
            {
                Some(id) => id,
                None => {
                    clog_debug!("Rollback requested with no checkpoint");
                    return Ok(false);
                }
            },
        };
        let restored = self.store.rollback_to_checkpoint(&id).await?;
        if restored {
            clog!("Rolled back to {}", id);
        }
        Ok(restored)
    }

    /// Claim the orchestrator for a new request and walk `path` under one
    /// lock, so an overlapping caller sees either a resting state or `Busy`.
    async fn begin(&self, path: &[OrchestratorState]) -> Result<()> {
        let mut phase = self.phase.write().await;
        let current = phase.current();
        if !current.is_resting() {
            return Err(Error::Busy(current.to_string()));
        }
        for &target in path {
            let from = phase.transition(target)?;
            clog_debug!("Orchestrator state: {} -> {}", from, target);
            self.emit(OrchestratorEvent::StateChanged { from, to: target });
        }
        Ok(())
    }

    async fn transition(&self, target: OrchestratorState) -> Result<()> {
        let from = self.phase.write().await.transition(target)?;
        clog_debug!("Orchestrator state: {} -> {}", from, target);
        self.emit(OrchestratorEvent::StateChanged { from, to: target });
        Ok(())
    }

    /// Enter the error state. Always allowed.
    async fn fail(&self) {
        let _ = self.transition(OrchestratorState::Error).await;
    }

    async fn set_plan_status(&self, plan_id: PlanId, status: PlanStatus) {
        if let Err(e) = self.store.update_plan_status(plan_id, status).await {
            clog_warn!("Failed to mark plan {} {}: {}", plan_id.short(), status, e);
        }
    }

    async fn set_agent_status(&self, agent_id: &str, status: AgentStatus) {
        if let Err(e) = self.pool.set_status(agent_id, status) {
            clog_warn!("Failed to set status of '{}': {}", agent_id, e);
        }
        if let Err(e) = self.bus.update_agent_info(agent_id, status).await {
            clog_debug!("Bus did not take status of '{}': {}", agent_id, e);
        }
    }

    fn emit(&self, event: OrchestratorEvent) {
        if let Some(tx) = &self.events {
            if let Err(e) = tx.try_send(event) {
                clog_debug!("Dropped orchestrator event: {}", e);
            }
        }
    }
}

fn route_inbound(message: &BusMessage, events: Option<&mpsc::Sender<OrchestratorEvent>>) {
    match message.kind {
        MessageKind::ErrorReport => {
            clog_error!("Error report from '{}': {}", message.from, message.payload);
        }
        MessageKind::StatusUpdate => {
            if let Some(tx) = events {
                let update = OrchestratorEvent::StatusUpdate {
                    from: message.from.clone(),
                    payload: message.payload.clone(),
                };
                if let Err(e) = tx.try_send(update) {
                    clog_debug!("Dropped status update from '{}': {}", message.from, e);
                }
            }
        }
        MessageKind::TaskResult => {
            clog!("Task result from '{}'", message.from);
        }
        MessageKind::TaskRequest => {
            clog_debug!("Ignoring task request from '{}'", message.from);
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[async_trait]
impl Agent for Orchestrator {
    fn config(&self) -> AgentConfig {
        AgentConfig::new(self.id(), "Orchestrator", "coordinator")
    }

    fn can_handle(&self, _task: &AgentTask) -> bool {
        true
    }

    async fn execute(&self, task: &AgentTask) -> Result<AgentResult> {
        Ok(self.run(task).await)
    }
}
